// Copyright 2018-2026 the Deno authors. MIT license.

//! Resolves the cache root directory (SPEC_FULL.md §2 "cache_dir").
//!
//! `FUNEE_CACHE_DIR` always wins when set. Otherwise the default is
//! `~/.funee/cache`, resolved by hand the same way the teacher's own
//! `dirs.rs` avoided pulling in the `dirs` crate for one lookup — here that
//! means reading `$HOME` directly rather than a platform-abstraction crate.

use std::env;
use std::path::PathBuf;

const ENV_OVERRIDE: &str = "FUNEE_CACHE_DIR";

fn home_dir() -> Option<PathBuf> {
  env::var_os("HOME").map(PathBuf::from)
}

/// Returns the cache root, creating nothing on disk — callers create the
/// directory lazily on first write, the same way `HttpCache::ensure_dir_exists`
/// does.
pub fn resolve() -> PathBuf {
  if let Some(over) = env::var_os(ENV_OVERRIDE) {
    return PathBuf::from(over);
  }
  match home_dir() {
    Some(home) => home.join(".funee").join("cache"),
    // No $HOME in the environment (e.g. a stripped-down container) — fall
    // back to a relative directory rather than failing resolution outright.
    None => PathBuf::from(".funee-cache"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn env_override_wins() {
    // SAFETY: tests in this process don't run `resolve` concurrently with
    // other tests that read/write FUNEE_CACHE_DIR or HOME.
    unsafe {
      env::set_var(ENV_OVERRIDE, "/tmp/somewhere-else");
    }
    assert_eq!(resolve(), PathBuf::from("/tmp/somewhere-else"));
    unsafe {
      env::remove_var(ENV_OVERRIDE);
    }
  }

  #[test]
  fn defaults_to_home_dot_funee_cache() {
    unsafe {
      env::remove_var(ENV_OVERRIDE);
      env::set_var("HOME", "/home/example");
    }
    assert_eq!(resolve(), PathBuf::from("/home/example/.funee/cache"));
  }
}
