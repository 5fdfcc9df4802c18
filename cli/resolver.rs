// Copyright 2018-2026 the Deno authors. MIT license.

//! Resolver (spec.md §4.3): chases re-export chains, aliases, and star
//! re-exports until it lands on a defining declaration (or a `host://`
//! synthetic export), building the `(module_uri, export_name) ->
//! declaration_id`-shaped mapping the graph builder needs.
//!
//! Kept synchronous and side-effect free: when a chain crosses into a module
//! that hasn't been fetched yet, `resolve_export` returns
//! `ResolveOutcome::NeedsModule` instead of fetching itself. The caller
//! (`bundle.rs`) loads the module and retries — this keeps I/O entirely out
//! of the resolution logic, matching spec.md §5's separation of the
//! (synchronous) graph-building rules from the (suspending) fetcher.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use url::Url;

use crate::ast::ImportedName;
use crate::ast::RawExport;
use crate::errors::FuneeError;
use crate::errors::Result;
use crate::graph::ModuleStore;
use crate::host;
use crate::specifier::resolve_specifier;
use crate::specifier::CanonicalName;

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
  Resolved(CanonicalName),
  NeedsModule(Url),
}

/// Resolves `export_name` as exported by the module at `module_uri` to its
/// defining canonical name (spec.md §4.3).
pub fn resolve_export(
  store: &ModuleStore,
  module_uri: &Url,
  export_name: &str,
) -> Result<ResolveOutcome> {
  resolve_export_inner(store, module_uri, export_name, &mut Vec::new())
}

fn resolve_export_inner(
  store: &ModuleStore,
  module_uri: &Url,
  export_name: &str,
  visiting: &mut Vec<(Url, String)>,
) -> Result<ResolveOutcome> {
  if module_uri.scheme() == "host" {
    return if host::is_export(module_uri.as_str(), export_name) {
      Ok(ResolveOutcome::Resolved(CanonicalName::new(
        module_uri.clone(),
        export_name,
      )))
    } else {
      Err(FuneeError::MissingExport {
        module: module_uri.clone(),
        name: export_name.to_string(),
      })
    };
  }

  let key = (module_uri.clone(), export_name.to_string());
  if visiting.contains(&key) {
    return Err(FuneeError::ReExportCycle {
      module: module_uri.clone(),
      name: export_name.to_string(),
    });
  }

  let Some(module_id) = store.get_by_uri(module_uri) else {
    return Ok(ResolveOutcome::NeedsModule(module_uri.clone()));
  };
  let module = store.get(module_id);

  // 1. A genuine local declaration with this export name.
  let is_local = module
    .parsed
    .exports
    .iter()
    .any(|e| matches!(e, RawExport::Local { name } if name == export_name));
  if is_local {
    return Ok(ResolveOutcome::Resolved(CanonicalName::new(
      module_uri.clone(),
      export_name,
    )));
  }

  // 2. Explicit re-export (`export { a as b } from "./x"` or a local alias
  // of an import, `export { a as b }` with no `from`).
  for export in &module.parsed.exports {
    if let RawExport::ReExport {
      exported_name,
      original_name,
      from_specifier,
    } = export
    {
      if exported_name != export_name {
        continue;
      }
      visiting.push(key.clone());
      let result = resolve_alias(store, module_uri, original_name, from_specifier, visiting);
      visiting.pop();
      return result;
    }
  }

  // 3. Star re-exports: union target namespaces, excluding default, erroring
  // if more than one target provides the same name without an explicit
  // re-export disambiguating it (spec.md §4.3).
  if export_name != "default" {
    let mut hits = Vec::new();
    for export in &module.parsed.exports {
      if let RawExport::Star { from_specifier } = export {
        let target_uri = resolve_specifier(from_specifier, module_uri)?;
        visiting.push(key.clone());
        let outcome = resolve_export_inner(store, &target_uri, export_name, visiting);
        visiting.pop();
        match outcome {
          Ok(resolved) => hits.push(resolved),
          Err(FuneeError::MissingExport { .. }) => {}
          Err(other) => return Err(other),
        }
      }
    }
    match hits.len() {
      0 => {}
      1 => return Ok(hits.into_iter().next().unwrap()),
      _ => {
        return Err(FuneeError::AmbiguousStarExport {
          module: module_uri.clone(),
          name: export_name.to_string(),
        })
      }
    }
  }

  Err(FuneeError::MissingExport {
    module: module_uri.clone(),
    name: export_name.to_string(),
  })
}

fn resolve_alias(
  store: &ModuleStore,
  module_uri: &Url,
  original_name: &str,
  from_specifier: &Option<String>,
  visiting: &mut Vec<(Url, String)>,
) -> Result<ResolveOutcome> {
  if let Some(spec) = from_specifier {
    let target_uri = resolve_specifier(spec, module_uri)?;
    return resolve_export_inner(store, &target_uri, original_name, visiting);
  }

  // No `from`: `original_name` is either an import binding or a local
  // declaration of this same module.
  let Some(module_id) = store.get_by_uri(module_uri) else {
    return Ok(ResolveOutcome::NeedsModule(module_uri.clone()));
  };
  let module = store.get(module_id);
  if let Some(import) = module
    .parsed
    .imports
    .iter()
    .find(|i| i.local_name == original_name)
  {
    let target_uri = resolve_specifier(&import.source_specifier, module_uri)?;
    return match &import.imported {
      ImportedName::Named(name) => resolve_export_inner(store, &target_uri, name, visiting),
      ImportedName::Default => resolve_export_inner(store, &target_uri, "default", visiting),
      ImportedName::Namespace => Ok(ResolveOutcome::Resolved(CanonicalName::new(
        target_uri, "*",
      ))),
    };
  }
  // A direct local declaration (`function helper(){} export { helper };` or
  // `export { helper as aliased };`) resolves straight to itself. This must
  // NOT re-enter `resolve_export_inner` under `module_uri`/`original_name` —
  // when there's no alias, that's the exact `(module, name)` key the caller
  // already pushed onto `visiting`, and re-entering it would report a
  // spurious `ReExportCycle` instead of the local declaration.
  if module.parsed.declarations.iter().any(|d| d.name == original_name) {
    return Ok(ResolveOutcome::Resolved(CanonicalName::new(
      module_uri.clone(),
      original_name,
    )));
  }

  Err(FuneeError::MissingExport {
    module: module_uri.clone(),
    name: original_name.to_string(),
  })
}

/// Resolves the target module and import kind for a local import record,
/// following re-export chains all the way to the defining declaration
/// (used by the graph builder when walking a declaration's free
/// identifiers that turn out to be import bindings).
pub fn resolve_import(
  store: &ModuleStore,
  importer_uri: &Url,
  source_specifier: &str,
  imported: &ImportedName,
) -> Result<ResolveOutcome> {
  let target_uri = resolve_specifier(source_specifier, importer_uri)?;
  match imported {
    ImportedName::Named(name) => resolve_export(store, &target_uri, name),
    ImportedName::Default => resolve_export(store, &target_uri, "default"),
    ImportedName::Namespace => Ok(ResolveOutcome::Resolved(CanonicalName::new(
      target_uri, "*",
    ))),
  }
}

/// Every locally declared (non-re-exported) name a module exports, used to
/// conservatively pull in a whole namespace import's members (spec.md §4.4
/// does not special-case namespace imports; treating the namespace binding
/// as "references everything the module locally exports" is the simplest
/// sound over-approximation).
pub fn namespace_members(store: &ModuleStore, module_uri: &Url) -> Vec<CanonicalName> {
  let Some(module_id) = store.get_by_uri(module_uri) else {
    return Vec::new();
  };
  let module = store.get(module_id);
  module
    .parsed
    .exports
    .iter()
    .filter_map(|e| match e {
      RawExport::Local { name } => Some(CanonicalName::new(module_uri.clone(), name.clone())),
      _ => None,
    })
    .collect()
}

/// Resolves every free identifier in `idents` (as collected by
/// `scope::free_identifiers`) against the module at `module_uri`'s own
/// declarations and imports, producing the identifier-as-written ->
/// canonical-name map a `Declaration.references` field carries (spec.md §3
/// "Declaration.references", §4.4). JS globals and unresolved `host://`
/// bindings are deliberately left out of the map — they're not canonical
/// names, just literal identifiers the emitter passes through untouched.
pub fn resolve_free_identifiers(
  store: &ModuleStore,
  module_uri: &Url,
  idents: &FxHashSet<String>,
) -> Result<BTreeMap<String, CanonicalName>> {
  let Some(module_id) = store.get_by_uri(module_uri) else {
    return Err(FuneeError::Other(anyhow::anyhow!(
      "module {module_uri} not loaded while resolving free identifiers"
    )));
  };
  let module = store.get(module_id);

  let mut out = BTreeMap::new();
  for ident in idents {
    if host::is_js_global(ident) {
      continue;
    }

    if let Some(import) = module.parsed.imports.iter().find(|i| &i.local_name == ident) {
      match resolve_import(store, module_uri, &import.source_specifier, &import.imported)? {
        ResolveOutcome::Resolved(cn) => {
          out.insert(ident.clone(), cn);
        }
        ResolveOutcome::NeedsModule(uri) => {
          return Err(FuneeError::Other(anyhow::anyhow!(
            "module {uri} referenced by {module_uri} was not fetched before reference resolution"
          )));
        }
      }
      continue;
    }

    if module.parsed.declarations.iter().any(|d| &d.name == ident) {
      out.insert(ident.clone(), CanonicalName::new(module_uri.clone(), ident.clone()));
      continue;
    }

    return Err(FuneeError::UnresolvedReference {
      scope: module_uri.clone(),
      name: ident.clone(),
    });
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::parse_module;
  use crate::graph::Module;
  use crate::graph::Provenance;

  fn load(store: &mut ModuleStore, uri: &str, source: &str) {
    let url = Url::parse(uri).unwrap();
    let parsed = parse_module(&url, source.to_string()).unwrap();
    store.insert(Module {
      uri: url,
      provenance: Provenance::Local,
      parsed,
    });
  }

  #[test]
  fn resolves_direct_local_export() {
    let mut store = ModuleStore::new();
    load(&mut store, "file:///a.ts", "export const used = 1;");
    let outcome = resolve_export(&store, &Url::parse("file:///a.ts").unwrap(), "used").unwrap();
    assert!(matches!(outcome, ResolveOutcome::Resolved(cn) if cn.name == "used"));
  }

  #[test]
  fn resolves_aliased_re_export_through_barrel() {
    let mut store = ModuleStore::new();
    load(&mut store, "file:///impl.ts", "export function helper() {}");
    load(
      &mut store,
      "file:///barrel.ts",
      "export { helper as aliased } from \"./impl.ts\";",
    );
    let outcome = resolve_export(
      &store,
      &Url::parse("file:///barrel.ts").unwrap(),
      "aliased",
    )
    .unwrap();
    match outcome {
      ResolveOutcome::Resolved(cn) => {
        assert_eq!(cn.name, "helper");
        assert_eq!(cn.uri.as_str(), "file:///impl.ts");
      }
      other => panic!("expected resolved, got {other:?}"),
    }
  }

  #[test]
  fn resolves_local_alias_re_export_with_no_from_clause() {
    let mut store = ModuleStore::new();
    load(
      &mut store,
      "file:///x.ts",
      "function helper() {}\nexport { helper as aliased };",
    );
    let outcome =
      resolve_export(&store, &Url::parse("file:///x.ts").unwrap(), "aliased").unwrap();
    match outcome {
      ResolveOutcome::Resolved(cn) => {
        assert_eq!(cn.name, "helper");
        assert_eq!(cn.uri.as_str(), "file:///x.ts");
      }
      other => panic!("expected resolved, got {other:?}"),
    }
  }

  #[test]
  fn resolves_unaliased_local_re_export_with_no_from_clause() {
    let mut store = ModuleStore::new();
    load(
      &mut store,
      "file:///x.ts",
      "function helper() {}\nexport { helper };",
    );
    let outcome =
      resolve_export(&store, &Url::parse("file:///x.ts").unwrap(), "helper").unwrap();
    assert!(matches!(outcome, ResolveOutcome::Resolved(cn) if cn.name == "helper"));
  }

  #[test]
  fn missing_export_is_reported() {
    let mut store = ModuleStore::new();
    load(&mut store, "file:///x.ts", "export const present = 1;");
    let err = resolve_export(&store, &Url::parse("file:///x.ts").unwrap(), "doesNotExist")
      .unwrap_err();
    assert!(matches!(err, FuneeError::MissingExport { name, .. } if name == "doesNotExist"));
  }

  #[test]
  fn ambiguous_star_export_errors() {
    let mut store = ModuleStore::new();
    load(&mut store, "file:///x.ts", "export const dup = 1;");
    load(&mut store, "file:///y.ts", "export const dup = 2;");
    load(
      &mut store,
      "file:///entry.ts",
      "export * from \"./x.ts\";\nexport * from \"./y.ts\";",
    );
    let err = resolve_export(&store, &Url::parse("file:///entry.ts").unwrap(), "dup")
      .unwrap_err();
    assert!(matches!(err, FuneeError::AmbiguousStarExport { .. }));
  }

  #[test]
  fn resolves_free_identifiers_to_canonical_names() {
    use crate::scope::free_identifiers;
    let mut store = ModuleStore::new();
    load(&mut store, "file:///helper.ts", "export function add(a, b) { return a + b; }");
    load(
      &mut store,
      "file:///entry.ts",
      "import { add } from \"./helper.ts\";\nconst total = add(1, 2) + sibling;\nconst sibling = 3;",
    );
    let entry_uri = Url::parse("file:///entry.ts").unwrap();
    let module_id = store.get_by_uri(&entry_uri).unwrap();
    let parsed = &store.get(module_id).parsed;
    let idents = free_identifiers(parsed.parsed_source.module());
    let refs = resolve_free_identifiers(&store, &entry_uri, &idents).unwrap();
    assert_eq!(refs.get("add").unwrap().uri.as_str(), "file:///helper.ts");
    assert_eq!(refs.get("sibling").unwrap().name, "sibling");
  }

  #[test]
  fn star_export_over_empty_module_is_not_an_error() {
    let mut store = ModuleStore::new();
    load(&mut store, "file:///empty.ts", "const x = 1;");
    load(&mut store, "file:///entry.ts", "export * from \"./empty.ts\";");
    let err = resolve_export(&store, &Url::parse("file:///entry.ts").unwrap(), "anything")
      .unwrap_err();
    assert!(matches!(err, FuneeError::MissingExport { .. }));
  }
}
