// Copyright 2018-2026 the Deno authors. MIT license.

//! Human-readable diagnostic stream: one-shot `Fetched: <url>` lines on first
//! fetch of each URL, and `uri:line:col` prefixed error messages, both
//! written to stderr. Kept as its own module so `fetcher` and `ast` share one
//! formatting surface instead of each rolling their own (spec.md §4.1, §6).

use std::sync::Mutex;

use rustc_hash::FxHashSet;
use url::Url;

use crate::errors::FuneeError;

/// Tracks which URLs have already emitted a `Fetched:` line this run, so a
/// cache hit on a second bundle doesn't repeat it (scenario 5 in spec.md §8).
#[derive(Default)]
pub struct Diagnostics {
  fetched: Mutex<FxHashSet<Url>>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Emits `Fetched: <url>` the first time a URL is freshly retrieved over
  /// the network in this run. No-op on subsequent calls for the same URL.
  pub fn note_fetched(&self, url: &Url) {
    let mut seen = self.fetched.lock().unwrap();
    if seen.insert(url.clone()) {
      eprintln!("Fetched: {url}");
    }
  }

  /// Prints a warning when an HTTP failure degrades to a stale cache entry.
  pub fn warn_stale_cache(&self, url: &Url, reason: &str) {
    log::warn!("{url}: using cached response after fetch failure ({reason})");
  }

  /// Renders a terminal error report for a bundle failure, matching the
  /// `uri:line:col` prefix convention required by spec.md §7.
  pub fn report(err: &FuneeError) {
    eprintln!("error: {err}");
  }
}
