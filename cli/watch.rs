// Copyright 2018-2026 the Deno authors. MIT license.

//! Watch driver (spec.md §4.8): subscribes to changes on the union of
//! `file://` URIs touched by a bundle and re-runs on change, debounced.
//! Grounded in the teacher's own `Debounce`-over-a-channel shape
//! (`file_watcher.rs`), rebuilt against `notify` 6's `Sender`-as-`EventHandler`
//! API rather than the 4.x `Watcher::new_immediate` closure form.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use notify::Event;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use url::Url;

use crate::diagnostics::Diagnostics;
use crate::errors::FuneeError;
use crate::errors::Result;
use crate::graph::DeclarationGraph;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Every distinct `file://` URI a declaration in `graph` lives at — the
/// minimal watch set (spec.md §4.8 "collect the union of `uri` fields...to
/// derive the minimal watch set").
pub fn file_watch_paths(graph: &DeclarationGraph) -> Vec<PathBuf> {
  let mut uris: BTreeSet<Url> = BTreeSet::new();
  for id in graph.ids() {
    let uri = &graph.get(id).canonical.uri;
    if uri.scheme() == "file" {
      uris.insert(uri.clone());
    }
  }
  uris.iter().filter_map(|u| u.to_file_path().ok()).collect()
}

fn start_watcher(paths: &[PathBuf]) -> Result<(RecommendedWatcher, Receiver<notify::Result<Event>>)> {
  let (tx, rx) = mpsc::channel();
  let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())
    .map_err(|err| FuneeError::Other(anyhow::anyhow!("failed to start file watcher: {err}")))?;
  for path in paths {
    watcher
      .watch(Path::new(path), RecursiveMode::NonRecursive)
      .map_err(|err| FuneeError::Other(anyhow::anyhow!("failed to watch {path:?}: {err}")))?;
  }
  Ok((watcher, rx))
}

/// Blocks until at least one filesystem event arrives, then drains further
/// events for `debounce` before returning — a thread-based analogue of the
/// teacher's `Debounce` stream, since `std::sync::mpsc::Receiver` has no
/// async `recv`.
async fn wait_for_change(rx: Receiver<notify::Result<Event>>, debounce: Duration) -> Receiver<notify::Result<Event>> {
  tokio::task::spawn_blocking(move || {
    if rx.recv().is_err() {
      return rx;
    }
    loop {
      match rx.recv_timeout(debounce) {
        Ok(_) => continue,
        Err(_) => break,
      }
    }
    rx
  })
  .await
  .expect("watch debounce task never panics")
}

#[cfg(unix)]
async fn shutdown_requested() {
  use tokio::signal::unix::signal;
  use tokio::signal::unix::SignalKind;
  let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler installs");
  let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler installs");
  tokio::select! {
    _ = sigint.recv() => {}
    _ = sigterm.recv() => {}
  }
}

#[cfg(not(unix))]
async fn shutdown_requested() {
  let _ = tokio::signal::ctrl_c().await;
}

/// Runs `run` once, then again every time a watched path changes, debounced
/// by `debounce`. Falls through to a single run with a warning when
/// `watch_paths` is empty (spec.md §4.8 "If empty, warn and fall through to
/// a single run"). Returns when a shutdown signal arrives (spec.md §5
/// "stopping watchers and exiting with success").
pub async fn watch<F, Fut>(watch_paths: &[PathBuf], debounce: Duration, mut run: F) -> Result<()>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<()>>,
{
  if let Err(err) = run().await {
    Diagnostics::report(&err);
  }

  if watch_paths.is_empty() {
    log::warn!("watch mode requested but no local file references were recorded; ran once");
    return Ok(());
  }

  let (_watcher, mut rx) = start_watcher(watch_paths)?;
  loop {
    tokio::select! {
      next_rx = wait_for_change(rx, debounce) => {
        rx = next_rx;
        log::info!("file change detected, re-running");
        if let Err(err) = run().await {
          Diagnostics::report(&err);
        }
      }
      _ = shutdown_requested() => {
        log::info!("shutdown requested, exiting");
        return Ok(());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::DeclKind;
  use crate::specifier::CanonicalName;
  use std::collections::BTreeMap;

  #[test]
  fn collects_distinct_file_uris_only() {
    let mut graph = DeclarationGraph::new();
    let a = Url::parse("file:///a.ts").unwrap();
    let b = Url::parse("file:///b.ts").unwrap();
    let host = Url::parse("host://fs").unwrap();
    graph
      .insert(crate::graph::Declaration {
        canonical: CanonicalName::new(a.clone(), "x"),
        kind: DeclKind::Const,
        snippet: String::new(),
        references: BTreeMap::new(),
        is_macro_marker: false,
        emit_name: None,
      })
      .unwrap();
    graph
      .insert(crate::graph::Declaration {
        canonical: CanonicalName::new(a.clone(), "y"),
        kind: DeclKind::Const,
        snippet: String::new(),
        references: BTreeMap::new(),
        is_macro_marker: false,
        emit_name: None,
      })
      .unwrap();
    graph
      .insert(crate::graph::Declaration {
        canonical: CanonicalName::new(b.clone(), "z"),
        kind: DeclKind::Const,
        snippet: String::new(),
        references: BTreeMap::new(),
        is_macro_marker: false,
        emit_name: None,
      })
      .unwrap();
    graph
      .insert(crate::graph::Declaration {
        canonical: CanonicalName::new(host, "readFile"),
        kind: DeclKind::Const,
        snippet: String::new(),
        references: BTreeMap::new(),
        is_macro_marker: false,
        emit_name: None,
      })
      .unwrap();

    let paths = file_watch_paths(&graph);
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&a.to_file_path().unwrap()));
    assert!(paths.contains(&b.to_file_path().unwrap()));
  }
}
