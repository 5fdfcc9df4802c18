// Copyright 2018-2026 the Deno authors. MIT license.

//! Command-line surface (spec.md §6 "External interfaces" / SPEC_FULL.md
//! additions), grounded on the teacher's `clap`-derive entry points rather
//! than the older `cli/flags.rs` builder-style `App`/`Arg` construction,
//! which predates our pinned `clap = "=4.5.56"`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::bundle::BundleOptions;
use crate::watch::DEFAULT_DEBOUNCE;

#[derive(Parser, Debug)]
#[command(name = "funee", version, about = "A compile-time TypeScript bundler")]
pub struct Cli {
  /// Entry module: a local path, or a `file:`/`http:`/`https:` URL.
  pub entry: String,

  /// Print the bundled program without appending the entry-point call.
  #[arg(long)]
  pub emit: bool,

  /// Bypass the http(s) cache on read; still write on a successful fetch.
  #[arg(long)]
  pub reload: bool,

  /// Re-bundle whenever a module this entry transitively reads changes.
  #[arg(long)]
  pub watch: bool,

  /// Debounce window for `--watch`, in milliseconds.
  #[arg(long, default_value_t = DEFAULT_DEBOUNCE.as_millis() as u64)]
  pub watch_debounce_ms: u64,

  /// Override the on-disk fetch cache directory (default: `$FUNEE_CACHE_DIR`
  /// or `~/.funee/cache`).
  #[arg(long, env = "FUNEE_CACHE_DIR")]
  pub cache_dir: Option<PathBuf>,

  /// Suppress informational diagnostics (`Fetched: ...`, stale-cache
  /// warnings stay on stderr regardless).
  #[arg(short, long)]
  pub quiet: bool,

  /// Maximum compile-time macro expansion passes before giving up
  /// (spec.md §4.5 "Cycle/non-termination guard").
  #[arg(long, default_value_t = 100)]
  pub max_macro_iterations: u32,
}

impl Cli {
  pub fn entry_url(&self) -> anyhow::Result<Url> {
    if let Ok(url) = Url::parse(&self.entry) {
      if matches!(url.scheme(), "file" | "http" | "https") {
        return Ok(url);
      }
    }
    let path = std::fs::canonicalize(&self.entry)
      .map_err(|err| anyhow::anyhow!("couldn't resolve entry path {:?}: {err}", self.entry))?;
    Url::from_file_path(&path).map_err(|()| anyhow::anyhow!("not a valid file path: {:?}", path))
  }

  pub fn bundle_options(&self) -> BundleOptions {
    let mut options = BundleOptions {
      reload: self.reload,
      emit_only: self.emit,
      max_macro_iterations: self.max_macro_iterations,
      ..BundleOptions::default()
    };
    if let Some(dir) = &self.cache_dir {
      options.cache_dir = dir.clone();
    }
    options
  }

  pub fn watch_debounce(&self) -> Duration {
    Duration::from_millis(self.watch_debounce_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_entry_and_flags() {
    let cli = Cli::parse_from(["funee", "--emit", "--reload", "entry.ts"]);
    assert_eq!(cli.entry, "entry.ts");
    assert!(cli.emit);
    assert!(cli.reload);
    assert!(!cli.watch);
  }

  #[test]
  fn absolute_url_entry_passes_through() {
    let cli = Cli::parse_from(["funee", "https://example.com/mod.ts"]);
    let url = cli.entry_url().unwrap();
    assert_eq!(url.as_str(), "https://example.com/mod.ts");
  }

  #[test]
  fn default_watch_debounce_matches_spec_default() {
    let cli = Cli::parse_from(["funee", "entry.ts"]);
    assert_eq!(cli.watch_debounce(), DEFAULT_DEBOUNCE);
  }
}
