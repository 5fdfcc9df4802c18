// Copyright 2018-2026 the Deno authors. MIT license.

//! Graph builder (spec.md §4.4): a worklist traversal seeded by the entry
//! module's default export. Every declaration it visits is fetched/parsed
//! on demand, its free identifiers are resolved against its home module's
//! import/export tables, and any not-yet-visited referenced declaration is
//! enqueued — the same lazy-fetch, cache-in-memory-for-the-run lifecycle
//! spec.md §3 describes.

use std::collections::HashSet;
use std::collections::VecDeque;

use deno_ast::swc::ast::Decl;
use deno_ast::swc::ast::ModuleItem;
use deno_ast::swc::ast::Stmt;
use rustc_hash::FxHashSet;
use url::Url;

use crate::ast::parse_module;
use crate::ast::DeclKind;
use crate::ast::RawDeclaration;
use crate::errors::FuneeError;
use crate::errors::Result;
use crate::fetcher::Fetcher;
use crate::graph::Declaration;
use crate::graph::DeclarationGraph;
use crate::graph::Module;
use crate::graph::ModuleStore;
use crate::resolver;
use crate::scope::free_identifiers;
use crate::specifier::CanonicalName;
use crate::specifier::resolve_specifier;

fn scratch_uri() -> Url {
  Url::parse("funee://graph-builder-scratch").unwrap()
}

/// Re-parses one declaration's snippet in isolation to compute its free
/// identifiers (the same wrap-and-reparse trick `emit.rs::render_declaration`
/// uses, kept independent here since this pass only needs names, not
/// rewritable byte ranges).
fn declaration_free_identifiers(raw: &RawDeclaration) -> Result<FxHashSet<String>> {
  let wrapped = match raw.kind {
    DeclKind::Function | DeclKind::Class => raw.snippet.clone(),
    DeclKind::Const => format!("const {};", raw.snippet),
    DeclKind::Let => format!("let {};", raw.snippet),
    DeclKind::DefaultExportExpression => format!("const __funee_default__ = {};", raw.snippet),
    DeclKind::TypeOnly => return Ok(FxHashSet::default()),
    DeclKind::Using(false) => format!("using {};", raw.snippet),
    DeclKind::Using(true) => format!("await using {};", raw.snippet),
  };

  let parsed = parse_module(&scratch_uri(), wrapped)?;
  let module = parsed.parsed_source.module();
  let item = module.body.first().ok_or_else(|| FuneeError::EmitOrderingConflict {
    detail: format!("re-parsed declaration {} produced no statement", raw.name),
  })?;

  match (raw.kind, item) {
    (DeclKind::Function, ModuleItem::Stmt(Stmt::Decl(Decl::Fn(fn_decl)))) => {
      Ok(free_identifiers(fn_decl.function.as_ref()))
    }
    (DeclKind::Class, ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl)))) => {
      Ok(free_identifiers(class_decl.class.as_ref()))
    }
    (
      DeclKind::Const | DeclKind::Let | DeclKind::DefaultExportExpression,
      ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl))),
    ) => {
      let declarator = var_decl.decls.first().ok_or_else(|| FuneeError::EmitOrderingConflict {
        detail: format!("re-parsed declaration {} has no declarator", raw.name),
      })?;
      match &declarator.init {
        Some(init) => Ok(free_identifiers(init.as_ref())),
        None => Ok(FxHashSet::default()),
      }
    }
    (DeclKind::Using(_), ModuleItem::Stmt(Stmt::Decl(Decl::Using(using_decl)))) => {
      let declarator = using_decl.decls.first().ok_or_else(|| FuneeError::EmitOrderingConflict {
        detail: format!("re-parsed declaration {} has no declarator", raw.name),
      })?;
      match &declarator.init {
        Some(init) => Ok(free_identifiers(init.as_ref())),
        None => Ok(FxHashSet::default()),
      }
    }
    _ => Err(FuneeError::EmitOrderingConflict {
      detail: format!(
        "declaration {} of kind {:?} didn't re-parse into the expected shape",
        raw.name, raw.kind
      ),
    }),
  }
}

/// Fetches and parses `uri` into `store` if it isn't already loaded. `host://`
/// modules are never inserted into the store — the resolver consults
/// `host::is_export` directly instead (resolver.rs), so there's nothing to
/// parse or cache for them.
async fn ensure_module(store: &mut ModuleStore, fetcher: &Fetcher, uri: &Url) -> Result<()> {
  if uri.scheme() == "host" || store.get_by_uri(uri).is_some() {
    return Ok(());
  }
  let (provenance, text) = fetcher.fetch(uri).await?;
  let parsed = parse_module(uri, text)?;
  store.insert(Module {
    uri: uri.clone(),
    provenance,
    parsed,
  });
  Ok(())
}

/// Builds the declaration graph reachable from `entry_uri`'s default export
/// (spec.md §4.4). Returns the entry's root canonical name for the shaker
/// and emitter to seed from.
pub async fn build_graph(
  store: &mut ModuleStore,
  fetcher: &Fetcher,
  graph: &mut DeclarationGraph,
  entry_uri: &Url,
) -> Result<CanonicalName> {
  ensure_module(store, fetcher, entry_uri).await?;
  let entry_root = CanonicalName::new(entry_uri.clone(), "default");
  drain_worklist(store, fetcher, graph, vec![entry_root.clone()]).await?;
  Ok(entry_root)
}

/// Resumes the worklist traversal for every canonical name referenced
/// somewhere in `graph` but not yet itself present as a node — the macro
/// engine can introduce references to declarations (via a `Definition` it
/// returns) that the original graph build never visited (spec.md §4.5 step
/// 5, "any new canonical names are enqueued into the graph"). Safe to call
/// repeatedly; a no-op once the graph is closed under its own references.
pub async fn complete_graph(
  store: &mut ModuleStore,
  fetcher: &Fetcher,
  graph: &mut DeclarationGraph,
) -> Result<()> {
  let missing: Vec<CanonicalName> = graph
    .ids()
    .flat_map(|id| graph.get(id).referenced_names().cloned().collect::<Vec<_>>())
    .filter(|cn| cn.uri.scheme() != "host" && graph.lookup(cn).is_none())
    .collect();
  drain_worklist(store, fetcher, graph, missing).await
}

async fn drain_worklist(
  store: &mut ModuleStore,
  fetcher: &Fetcher,
  graph: &mut DeclarationGraph,
  seed: Vec<CanonicalName>,
) -> Result<()> {
  let mut worklist: VecDeque<CanonicalName> = VecDeque::new();
  let mut enqueued: HashSet<CanonicalName> = HashSet::new();
  for cn in seed {
    if enqueued.insert(cn.clone()) {
      worklist.push_back(cn);
    }
  }

  while let Some(canonical) = worklist.pop_front() {
    if canonical.uri.scheme() == "host" || graph.lookup(&canonical).is_some() {
      continue;
    }

    ensure_module(store, fetcher, &canonical.uri).await?;
    let module_id = store.get_by_uri(&canonical.uri).ok_or_else(|| {
      FuneeError::Other(anyhow::anyhow!("module {} failed to load", canonical.uri))
    })?;
    let module = store.get(module_id);

    let raw = module
      .parsed
      .declarations
      .iter()
      .find(|d| d.name == canonical.name)
      .ok_or_else(|| FuneeError::MissingExport {
        module: canonical.uri.clone(),
        name: canonical.name.clone(),
      })?
      .clone();

    let idents = declaration_free_identifiers(&raw)?;
    let references = resolver::resolve_free_identifiers(store, &canonical.uri, &idents)?;

    for referenced in references.values() {
      if enqueued.insert(referenced.clone()) {
        worklist.push_back(referenced.clone());
      }
    }

    // A namespace-import binding is free in the snippet but never appears in
    // `references` (it resolves to a `*` pseudo-name, not a single
    // declaration) — conservatively pull in every locally declared export of
    // the imported module instead (resolver::namespace_members).
    for ident in &idents {
      if let Some(import) = module.parsed.imports.iter().find(|i| &i.local_name == ident) {
        if matches!(import.imported, crate::ast::ImportedName::Namespace) {
          let target_uri = resolve_specifier(&import.source_specifier, &canonical.uri)?;
          ensure_module(store, fetcher, &target_uri).await?;
          for member in resolver::namespace_members(store, &target_uri) {
            if enqueued.insert(member.clone()) {
              worklist.push_back(member);
            }
          }
        }
      }
    }

    graph.insert(Declaration {
      canonical: canonical.clone(),
      kind: raw.kind,
      snippet: raw.snippet.clone(),
      references,
      is_macro_marker: raw.is_macro_marker,
      emit_name: None,
    })?;
  }

  Ok(())
}
