// Copyright 2018-2026 the Deno authors. MIT license.

//! The declaration graph (spec.md §3, §4.4, §9 "Cyclic references").
//!
//! `ModuleStore` and `DeclarationGraph` are arenas: declarations reference
//! each other by `DeclId`, an index, never by owning pointer, so mutual
//! recursion and macro-introduced cycles are representable without
//! `Rc<RefCell<_>>` bookkeeping.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use url::Url;

use crate::ast::DeclKind;
use crate::ast::ParsedModule;
use crate::errors::FuneeError;
use crate::errors::Result;
use crate::specifier::CanonicalName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub usize);

/// Per-scheme provenance, tracked for diagnostics and cache-fallback
/// reporting (spec.md §3 "Module").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
  Local,
  Http { cached: bool, fetched_this_run: bool },
  Synthetic,
}

pub struct Module {
  pub uri: Url,
  pub provenance: Provenance,
  pub parsed: ParsedModule,
}

#[derive(Default)]
pub struct ModuleStore {
  modules: Vec<Module>,
  index: std::collections::HashMap<Url, ModuleId>,
}

impl ModuleStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, id: ModuleId) -> &Module {
    &self.modules[id.0]
  }

  pub fn get_by_uri(&self, uri: &Url) -> Option<ModuleId> {
    self.index.get(uri).copied()
  }

  pub fn insert(&mut self, module: Module) -> ModuleId {
    let id = ModuleId(self.modules.len());
    self.index.insert(module.uri.clone(), id);
    self.modules.push(module);
    id
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub usize);

/// The atomic unit of tree shaking (spec.md §3 "Declaration").
pub struct Declaration {
  pub canonical: CanonicalName,
  pub kind: DeclKind,
  /// Verbatim source text at graph-build time; rewritten in place during
  /// macro expansion (call-site splicing) and at emission (renaming).
  pub snippet: String,
  /// Every free identifier in `snippet`, mapped to the canonical name it
  /// resolves to. Keyed on identifier-as-written (not canonical name) so a
  /// `Closure`'s `references` can be built by restricting this map to the
  /// names free in one call argument (spec.md §4.5 step 2).
  pub references: BTreeMap<String, CanonicalName>,
  pub is_macro_marker: bool,
  pub emit_name: Option<String>,
}

impl Declaration {
  /// The flattened set of canonical names this declaration depends on,
  /// used by the shaker's reachability walk (spec.md §4.6).
  pub fn referenced_names(&self) -> impl Iterator<Item = &CanonicalName> {
    self.references.values()
  }
}

/// Arena of every declaration discovered while walking the source graph.
/// Declarations are created at graph build, mutated only during macro
/// expansion, and finalized (given an `emit_name`) before emission (spec.md
/// §3 "Lifecycles").
#[derive(Default)]
pub struct DeclarationGraph {
  arena: Vec<Declaration>,
  index: IndexMap<CanonicalName, DeclId>,
}

impl DeclarationGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, id: DeclId) -> &Declaration {
    &self.arena[id.0]
  }

  pub fn get_mut(&mut self, id: DeclId) -> &mut Declaration {
    &mut self.arena[id.0]
  }

  pub fn lookup(&self, name: &CanonicalName) -> Option<DeclId> {
    self.index.get(name).copied()
  }

  /// Inserts a new declaration. Errors if its canonical name already exists
  /// — the spec forbids two declarations sharing identity (spec.md §3).
  pub fn insert(&mut self, decl: Declaration) -> Result<DeclId> {
    if self.index.contains_key(&decl.canonical) {
      return Err(FuneeError::Other(anyhow::anyhow!(
        "duplicate declaration for canonical name {}",
        decl.canonical
      )));
    }
    let id = DeclId(self.arena.len());
    self.index.insert(decl.canonical.clone(), id);
    self.arena.push(decl);
    Ok(id)
  }

  pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
    (0..self.arena.len()).map(DeclId)
  }

  pub fn len(&self) -> usize {
    self.arena.len()
  }

  pub fn is_empty(&self) -> bool {
    self.arena.is_empty()
  }
}
