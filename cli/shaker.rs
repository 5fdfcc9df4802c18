// Copyright 2018-2026 the Deno authors. MIT license.

//! The tree shaker (spec.md §4.6): computes the reachable set from the
//! entry's default export over the declaration graph's reference edges and
//! discards everything else. A declaration referenced only from a removed
//! macro declaration is itself removed, which falls out naturally here
//! because macro declarations are never roots and never survive on their
//! own reference edges once `macros::expand_macros` has stripped them from
//! every caller's `references` map.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::graph::DeclId;
use crate::graph::DeclarationGraph;
use crate::specifier::CanonicalName;

/// Breadth-first reachability walk seeded by `roots`, in discovery order —
/// the same order the emitter consumes to assign `emit_name`s (spec.md §4.7
/// "N assigned in stable order (discovery order from a deterministic
/// worklist seeded by the entry)").
pub fn reachable(graph: &DeclarationGraph, roots: &[CanonicalName]) -> Vec<DeclId> {
  let mut seen = FxHashSet::default();
  let mut order = Vec::new();
  let mut worklist: VecDeque<DeclId> = VecDeque::new();

  for root in roots {
    if let Some(id) = graph.lookup(root) {
      if seen.insert(id) {
        worklist.push_back(id);
      }
    }
  }

  while let Some(id) = worklist.pop_front() {
    order.push(id);
    let decl = graph.get(id);
    for referenced in decl.referenced_names() {
      if let Some(next_id) = graph.lookup(referenced) {
        if seen.insert(next_id) {
          worklist.push_back(next_id);
        }
      }
    }
  }

  order
}

/// Discards every declaration not in the reachable set, rebuilding the graph
/// from only the surviving declarations (preserves relative discovery
/// order, which the emitter depends on for deterministic `emit_name`s).
pub fn shake(graph: DeclarationGraph, roots: &[CanonicalName]) -> DeclarationGraph {
  let keep: FxHashSet<DeclId> = reachable(&graph, roots).into_iter().collect();
  let mut shaken = DeclarationGraph::new();
  for id in graph.ids() {
    if !keep.contains(&id) {
      continue;
    }
    let decl = graph.get(id);
    shaken
      .insert(crate::graph::Declaration {
        canonical: decl.canonical.clone(),
        kind: decl.kind,
        snippet: decl.snippet.clone(),
        references: decl.references.clone(),
        is_macro_marker: decl.is_macro_marker,
        emit_name: decl.emit_name.clone(),
      })
      .expect("shaken graph cannot contain duplicate canonical names the source graph didn't");
  }
  shaken
}
