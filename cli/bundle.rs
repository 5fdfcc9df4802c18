// Copyright 2018-2026 the Deno authors. MIT license.

//! Top-level orchestrator tying the pipeline stages together (spec.md §2):
//! fetch the entry, build the declaration graph, expand macros to a fixed
//! point, shake, and emit. One `Bundler` instance is scoped to a single
//! bundle invocation — its `ModuleStore` is never persisted across runs
//! (spec.md §3 "Lifecycles").

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::builder;
use crate::diagnostics::Diagnostics;
use crate::emit;
use crate::emit::EmitOptions;
use crate::errors::Result;
use crate::fetcher::FetchOptions;
use crate::fetcher::Fetcher;
use crate::graph::DeclarationGraph;
use crate::graph::ModuleStore;
use crate::macros;
use crate::shaker;

const DEFAULT_MAX_MACRO_ITERATIONS: u32 = 100;
const DEFAULT_MACRO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BundleOptions {
  pub cache_dir: PathBuf,
  pub reload: bool,
  pub emit_only: bool,
  pub max_macro_iterations: u32,
  pub macro_timeout: Duration,
}

impl Default for BundleOptions {
  fn default() -> Self {
    Self {
      cache_dir: crate::cache_dir::resolve(),
      reload: false,
      emit_only: false,
      max_macro_iterations: DEFAULT_MAX_MACRO_ITERATIONS,
      macro_timeout: DEFAULT_MACRO_TIMEOUT,
    }
  }
}

async fn build_and_shake(entry: &Url, options: &BundleOptions) -> Result<(DeclarationGraph, crate::specifier::CanonicalName)> {
  let diagnostics = Arc::new(Diagnostics::new());
  let fetcher = Fetcher::new(
    options.cache_dir.clone(),
    diagnostics.clone(),
    FetchOptions {
      reload: options.reload,
    },
  );

  let mut store = ModuleStore::new();
  let mut graph = DeclarationGraph::new();

  let entry_default = builder::build_graph(&mut store, &fetcher, &mut graph, entry).await?;

  loop {
    macros::expand_macros(&mut graph, &store, options.max_macro_iterations, options.macro_timeout)?;
    let before = graph.len();
    builder::complete_graph(&mut store, &fetcher, &mut graph).await?;
    if graph.len() == before {
      break;
    }
    // Newly-fetched declarations may themselves contain macro calls; loop
    // until a full macro pass finds nothing and no new declaration arrived.
  }

  let roots = vec![entry_default.clone()];
  let shaken = shaker::shake(graph, &roots);
  Ok((shaken, entry_default))
}

/// Runs the full pipeline for one entry module and returns the emitted
/// program text (spec.md §4, §6 "Bundle output format").
pub async fn bundle(entry: &Url, options: &BundleOptions) -> Result<String> {
  let (mut shaken, entry_default) = build_and_shake(entry, options).await?;
  emit::emit(
    &mut shaken,
    &entry_default,
    &EmitOptions {
      suppress_entry_call: options.emit_only,
    },
  )
}

/// The `file://` paths a bundle of `entry` reads — the watch set `--watch`
/// subscribes to (spec.md §4.8, `watch::file_watch_paths`). Computed without
/// emitting, since `--watch` only needs the set before it starts the
/// debounced re-run loop.
pub async fn discover_watch_paths(entry: &Url, options: &BundleOptions) -> Result<Vec<PathBuf>> {
  let (shaken, _entry_default) = build_and_shake(entry, options).await?;
  Ok(crate::watch::file_watch_paths(&shaken))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn bundles_a_simple_entry_and_calls_it() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
      dir.path().join("entry.ts"),
      "import { used } from \"./utils.ts\";\nexport default function main() { return used(); }",
    )
    .unwrap();
    std::fs::write(
      dir.path().join("utils.ts"),
      "export function used() { return 1; }\nexport function unused() { return 2; }",
    )
    .unwrap();

    let entry = Url::from_file_path(dir.path().join("entry.ts")).unwrap();
    let options = BundleOptions {
      cache_dir: dir.path().join("cache"),
      ..BundleOptions::default()
    };
    let output = bundle(&entry, &options).await.unwrap();

    assert!(output.contains("return 1;"));
    assert!(!output.contains("return 2;"));
    assert!(output.trim_end().ends_with("();"));
  }

  #[tokio::test]
  async fn emit_only_suppresses_the_entry_call() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
      dir.path().join("entry.ts"),
      "export default function main() { return 1; }",
    )
    .unwrap();
    let entry = Url::from_file_path(dir.path().join("entry.ts")).unwrap();
    let options = BundleOptions {
      cache_dir: dir.path().join("cache"),
      emit_only: true,
      ..BundleOptions::default()
    };
    let output = bundle(&entry, &options).await.unwrap();
    assert!(!output.trim_end().ends_with("();"));
  }
}
