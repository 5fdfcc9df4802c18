// Copyright 2018-2026 the Deno authors. MIT license.

//! Code emission (spec.md §4.7): assigns every surviving declaration a
//! stable `declaration_<N>` name, rewrites every identifier reference in
//! its body to the referent's assigned name, topologically orders the
//! result (breaking unavoidable cycles the way `var` hoisting would), and
//! concatenates a host-bindings preamble, the renamed declarations, and a
//! call to the entry's default export.
//!
//! Renaming is textual, not a `swc_ecma_codegen` re-serialization: each
//! declaration's `snippet` is re-parsed on its own (same trick `macros.rs`
//! uses for call-site splicing), its free-identifier occurrences are
//! collected via `scope::free_identifier_occurrences`, and only the byte
//! ranges that resolve to a canonical name actually get spliced. Anything
//! that isn't a resolved reference — a JS global, a bare property key —
//! passes through untouched.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;

use deno_ast::swc::ast::Decl;
use deno_ast::swc::ast::ModuleItem;
use deno_ast::swc::ast::Stmt;
use deno_ast::swc::visit::VisitWith;
use deno_ast::SourceRange;
use deno_ast::SourceRangedForSpanned;
use url::Url;

use crate::ast::parse_module;
use crate::ast::DeclKind;
use crate::errors::FuneeError;
use crate::errors::Result;
use crate::graph::DeclId;
use crate::graph::DeclarationGraph;
use crate::host;
use crate::scope::free_identifier_occurrences;
use crate::scope::FreeIdentCollector;
use crate::shaker;
use crate::specifier::CanonicalName;

/// The synthetic URI every per-declaration re-parse is attributed to; never
/// surfaces in a diagnostic because these parses can't fail once the
/// original graph build already parsed the same text successfully.
fn scratch_uri() -> Url {
  Url::parse("funee://emit-scratch").unwrap()
}

/// Assigns `declaration_<N>` to every declaration reachable from `roots`, in
/// BFS discovery order (spec.md §4.7 "N assigned in stable order"). `graph`
/// is assumed already shaken, so `shaker::reachable` simply recomputes the
/// same order the shake pass used to decide what survives.
pub fn assign_emit_names(graph: &mut DeclarationGraph, roots: &[CanonicalName]) -> Vec<DeclId> {
  let order = shaker::reachable(graph, roots);
  for (index, id) in order.iter().enumerate() {
    graph.get_mut(*id).emit_name = Some(format!("declaration_{index}"));
  }
  order
}

fn host_binding_name(canonical: &CanonicalName) -> String {
  let prefix = canonical
    .uri
    .as_str()
    .trim_start_matches("host://")
    .replace('/', "_");
  format!("__host_{prefix}_{}", canonical.name)
}

/// Looks up what a reference actually names at emission time: either a
/// surviving declaration's assigned name, or a `host://` binding. Returns
/// `None` for a reference that didn't survive shaking, which can't happen
/// for anything reachable from the declaration doing the referencing,
/// since both were walked by the same reachability pass.
fn emit_target(graph: &DeclarationGraph, canonical: &CanonicalName) -> Option<String> {
  if canonical.uri.scheme() == "host" {
    return Some(host_binding_name(canonical));
  }
  let id = graph.lookup(canonical)?;
  graph.get(id).emit_name.clone()
}

/// Splices `edits` (byte ranges within `text`, produced by re-parsing `text`
/// itself) into a new string, left to right. Overlapping edits never arise
/// here — every edit is either a whole-identifier occurrence or a
/// declaration's own binding name, neither of which ever nests inside
/// another edit.
fn splice(
  text_info: &deno_ast::SourceTextInfo,
  full: SourceRange,
  mut edits: Vec<(SourceRange, String)>,
) -> String {
  edits.sort_by_key(|(range, _)| range.start);
  let mut out = String::new();
  let mut cursor = full.start;
  for (range, replacement) in edits {
    if range.start < cursor {
      continue;
    }
    out.push_str(text_info.range_text(&SourceRange {
      start: cursor,
      end: range.start,
    }));
    out.push_str(&replacement);
    cursor = range.end;
  }
  out.push_str(text_info.range_text(&SourceRange {
    start: cursor,
    end: full.end,
  }));
  out
}

/// Collects the rewrite edits for every free identifier in `node` that
/// resolves to a reference in `references`, mapped through `emit_target`.
fn reference_edits<N>(
  graph: &DeclarationGraph,
  references: &BTreeMap<String, CanonicalName>,
  node: &N,
) -> Vec<(SourceRange, String)>
where
  N: VisitWith<FreeIdentCollector>,
{
  free_identifier_occurrences(node)
    .into_iter()
    .filter_map(|(range, name)| {
      let canonical = references.get(&name)?;
      let target = emit_target(graph, canonical)?;
      Some((range, target))
    })
    .collect()
}

/// Renders one declaration's final text, with its own binding renamed to
/// `emit_name` and every resolved free reference renamed to its target's
/// `emit_name`. Type-only declarations render as `None` — they carry no
/// runtime representation.
fn render_declaration(graph: &DeclarationGraph, id: DeclId) -> Result<Option<String>> {
  let decl = graph.get(id);
  if decl.kind == DeclKind::TypeOnly {
    return Ok(None);
  }
  let emit_name = decl.emit_name.clone().ok_or_else(|| FuneeError::EmitOrderingConflict {
    detail: format!("declaration {} has no assigned emit_name", decl.canonical),
  })?;

  let uri = scratch_uri();
  let wrapped = match decl.kind {
    DeclKind::Function | DeclKind::Class => decl.snippet.clone(),
    DeclKind::Const => format!("const {};", decl.snippet),
    DeclKind::Let => format!("let {};", decl.snippet),
    DeclKind::DefaultExportExpression => format!("const __funee_default__ = {};", decl.snippet),
    DeclKind::TypeOnly => unreachable!("handled above"),
    DeclKind::Using(false) => format!("using {};", decl.snippet),
    DeclKind::Using(true) => format!("await using {};", decl.snippet),
  };

  let parsed = parse_module(&uri, wrapped.clone())?;
  let module = parsed.parsed_source.module();
  let text_info = parsed.parsed_source.text_info();
  let full = module.range();

  let item = module.body.first().ok_or_else(|| FuneeError::EmitOrderingConflict {
    detail: format!("re-parsed declaration {} produced no statement", decl.canonical),
  })?;

  let mut edits: Vec<(SourceRange, String)> = Vec::new();
  match (decl.kind, item) {
    (DeclKind::Function, ModuleItem::Stmt(Stmt::Decl(Decl::Fn(fn_decl)))) => {
      edits.push((fn_decl.ident.range(), emit_name.clone()));
      edits.extend(reference_edits(graph, &decl.references, fn_decl.function.as_ref()));
    }
    (DeclKind::Class, ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl)))) => {
      edits.push((class_decl.ident.range(), emit_name.clone()));
      edits.extend(reference_edits(graph, &decl.references, class_decl.class.as_ref()));
    }
    (DeclKind::Const | DeclKind::Let | DeclKind::DefaultExportExpression, ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl)))) => {
      let declarator = var_decl.decls.first().ok_or_else(|| FuneeError::EmitOrderingConflict {
        detail: format!("re-parsed declaration {} has no declarator", decl.canonical),
      })?;
      edits.push((declarator.name.range(), emit_name.clone()));
      if let Some(init) = &declarator.init {
        edits.extend(reference_edits(graph, &decl.references, init.as_ref()));
      }
    }
    (DeclKind::Using(_), ModuleItem::Stmt(Stmt::Decl(Decl::Using(using_decl)))) => {
      let declarator = using_decl.decls.first().ok_or_else(|| FuneeError::EmitOrderingConflict {
        detail: format!("re-parsed declaration {} has no declarator", decl.canonical),
      })?;
      edits.push((declarator.name.range(), emit_name.clone()));
      if let Some(init) = &declarator.init {
        edits.extend(reference_edits(graph, &decl.references, init.as_ref()));
      }
    }
    _ => {
      return Err(FuneeError::EmitOrderingConflict {
        detail: format!(
          "declaration {} of kind {:?} didn't re-parse into the expected shape",
          decl.canonical, decl.kind
        ),
      });
    }
  }

  Ok(Some(splice(text_info, full, edits)))
}

/// Orders surviving declarations so that, as much as possible, a
/// declaration is emitted after everything it references. Function
/// declarations are exempt as *dependents* (JS hoists them, so they never
/// need their callees to come first) but still participate as targets.
/// A residual cycle among non-function declarations — only reachable via
/// mutual macro-introduced references, since hand-written `const`s can't
/// forward-reference each other — is broken by hoisting every declaration
/// still blocked once no zero-in-degree node remains: each is rewritten
/// from `const name = init;` to a bare assignment, with `var name;`
/// floated to the very front of the whole declarations block. `var` has no
/// temporal-dead-zone, so a forward reference the source could never have
/// type-checked but a macro can introduce still runs.
struct Ordered {
  order: Vec<DeclId>,
  hoisted: BTreeSet<DeclId>,
}

fn topological_order(graph: &DeclarationGraph, discovery_order: &[DeclId]) -> Ordered {
  let mut in_degree: HashMap<DeclId, usize> = HashMap::new();
  let mut dependents: HashMap<DeclId, Vec<DeclId>> = HashMap::new();
  let present: HashSet<DeclId> = discovery_order.iter().copied().collect();

  for &id in discovery_order {
    in_degree.entry(id).or_insert(0);
    let decl = graph.get(id);
    if decl.kind == DeclKind::Function {
      continue;
    }
    for referenced in decl.referenced_names() {
      let Some(dep_id) = graph.lookup(referenced) else {
        continue;
      };
      if dep_id == id || !present.contains(&dep_id) {
        continue;
      }
      dependents.entry(dep_id).or_default().push(id);
      *in_degree.get_mut(&id).unwrap() += 1;
    }
  }

  let mut ready: VecDeque<DeclId> = discovery_order
    .iter()
    .copied()
    .filter(|id| in_degree[id] == 0)
    .collect();
  let mut order = Vec::with_capacity(discovery_order.len());
  let mut placed: HashSet<DeclId> = HashSet::new();
  let mut hoisted = BTreeSet::new();

  loop {
    while let Some(id) = ready.pop_front() {
      if !placed.insert(id) {
        continue;
      }
      order.push(id);
      if let Some(waiting) = dependents.get(&id) {
        for &dep in waiting {
          let slot = in_degree.get_mut(&dep).unwrap();
          *slot = slot.saturating_sub(1);
          if *slot == 0 && !placed.contains(&dep) {
            ready.push_back(dep);
          }
        }
      }
    }
    let Some(&next) = discovery_order.iter().find(|id| !placed.contains(*id)) else {
      break;
    };
    hoisted.insert(next);
    ready.push_back(next);
  }

  Ordered { order, hoisted }
}

/// Options controlling the final `--emit`/entry-call shape (spec.md §4.7,
/// §6 "Bundle output format").
pub struct EmitOptions {
  /// When true, the bundle is emitted without a trailing call to the
  /// entry's default export (the `--emit` flag, spec.md §9).
  pub suppress_entry_call: bool,
}

/// Emits the final flat program (spec.md §4.7). `graph` must already be
/// shaken; `entry_default` is the entry module's `default` canonical name.
pub fn emit(
  graph: &mut DeclarationGraph,
  entry_default: &CanonicalName,
  options: &EmitOptions,
) -> Result<String> {
  let roots = vec![entry_default.clone()];
  let discovery_order = assign_emit_names(graph, &roots);
  let Ordered { order, hoisted } = topological_order(graph, &discovery_order);

  let mut used_hosts: BTreeSet<String> = BTreeSet::new();
  for &id in &order {
    for referenced in graph.get(id).referenced_names() {
      if referenced.uri.scheme() == "host" {
        used_hosts.insert(referenced.uri.to_string());
      }
    }
  }
  let host_uris: Vec<&str> = used_hosts.iter().map(|s| s.as_str()).collect();

  let mut hoisted_vars = Vec::new();
  let mut body = String::new();
  for &id in &order {
    let Some(rendered) = render_declaration(graph, id)? else {
      continue;
    };
    if hoisted.contains(&id) {
      let emit_name = graph.get(id).emit_name.clone().unwrap();
      hoisted_vars.push(emit_name);
      let assignment = rendered.replacen("const ", "", 1).replacen("let ", "", 1);
      body.push_str(&assignment);
      body.push('\n');
    } else {
      body.push_str(&rendered);
      body.push('\n');
    }
  }

  let mut out = String::new();
  out.push_str(&host::emit_preamble(&host_uris));
  if !hoisted_vars.is_empty() {
    out.push_str(&format!("var {};\n", hoisted_vars.join(", ")));
  }
  out.push_str(&body);

  if !options.suppress_entry_call {
    let entry_name = emit_target(graph, entry_default).ok_or_else(|| FuneeError::EmitOrderingConflict {
      detail: "entry module's default export did not survive tree shaking".to_string(),
    })?;
    out.push_str(&format!("{entry_name}();\n"));
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  fn decl(
    module: &Url,
    name: &str,
    kind: DeclKind,
    snippet: &str,
    refs: &[(&str, &Url, &str)],
  ) -> crate::graph::Declaration {
    let mut references = BTreeMap::new();
    for (ident, target_module, target_name) in refs {
      references.insert(
        ident.to_string(),
        CanonicalName::new((*target_module).clone(), *target_name),
      );
    }
    crate::graph::Declaration {
      canonical: CanonicalName::new(module.clone(), name),
      kind,
      snippet: snippet.to_string(),
      references,
      is_macro_marker: false,
      emit_name: None,
    }
  }

  #[test]
  fn assigns_names_in_discovery_order_from_the_entry() {
    let module = url("file:///entry.ts");
    let mut graph = DeclarationGraph::new();
    graph
      .insert(decl(
        &module,
        "default",
        DeclKind::DefaultExportExpression,
        "helper()",
        &[("helper", &module, "helper")],
      ))
      .unwrap();
    graph
      .insert(decl(&module, "helper", DeclKind::Function, "function helper() { return 1; }", &[]))
      .unwrap();

    let roots = vec![CanonicalName::new(module.clone(), "default")];
    let order = assign_emit_names(&mut graph, &roots);
    assert_eq!(order.len(), 2);
    let default_id = graph.lookup(&CanonicalName::new(module.clone(), "default")).unwrap();
    let helper_id = graph.lookup(&CanonicalName::new(module, "helper")).unwrap();
    assert_eq!(graph.get(default_id).emit_name.as_deref(), Some("declaration_0"));
    assert_eq!(graph.get(helper_id).emit_name.as_deref(), Some("declaration_1"));
  }

  #[test]
  fn rewrites_references_to_assigned_names_and_calls_the_entry() {
    let module = url("file:///entry.ts");
    let mut graph = DeclarationGraph::new();
    graph
      .insert(decl(
        &module,
        "default",
        DeclKind::DefaultExportExpression,
        "helper(1) + 2",
        &[("helper", &module, "helper")],
      ))
      .unwrap();
    graph
      .insert(decl(
        &module,
        "helper",
        DeclKind::Function,
        "function helper(x) { return x + base; }",
        &[("base", &module, "base")],
      ))
      .unwrap();
    graph
      .insert(decl(&module, "base", DeclKind::Const, "base = 10", &[]))
      .unwrap();

    let entry = CanonicalName::new(module, "default");
    let output = emit(
      &mut graph,
      &entry,
      &EmitOptions {
        suppress_entry_call: false,
      },
    )
    .unwrap();

    assert!(output.contains("function declaration_1(x) { return x + declaration_2; }"));
    assert!(output.contains("const declaration_2 = 10;"));
    assert!(output.contains("declaration_1(1) + 2"));
    assert!(output.trim_end().ends_with("declaration_0();"));
  }

  #[test]
  fn rewrites_host_references_to_their_binding_name() {
    let module = url("file:///entry.ts");
    let host_uri = url("host://fs");
    let mut graph = DeclarationGraph::new();
    graph
      .insert(decl(
        &module,
        "default",
        DeclKind::DefaultExportExpression,
        "readFile(\"x\")",
        &[("readFile", &host_uri, "readFile")],
      ))
      .unwrap();

    let entry = CanonicalName::new(module, "default");
    let output = emit(
      &mut graph,
      &entry,
      &EmitOptions {
        suppress_entry_call: true,
      },
    )
    .unwrap();

    assert!(output.contains("__host_fs_readFile"));
    assert!(output.contains("__host_fs_readFile(\"x\")"));
    assert!(!output.trim_end().ends_with("();"));
  }

  #[test]
  fn a_residual_cycle_is_broken_with_var_hoisting() {
    let module = url("file:///entry.ts");
    let mut graph = DeclarationGraph::new();
    graph
      .insert(decl(
        &module,
        "default",
        DeclKind::DefaultExportExpression,
        "a",
        &[("a", &module, "a")],
      ))
      .unwrap();
    graph
      .insert(decl(&module, "a", DeclKind::Const, "a = () => b", &[("b", &module, "b")]))
      .unwrap();
    graph
      .insert(decl(&module, "b", DeclKind::Const, "b = () => a", &[("a", &module, "a")]))
      .unwrap();

    let entry = CanonicalName::new(module, "default");
    let output = emit(
      &mut graph,
      &entry,
      &EmitOptions {
        suppress_entry_call: true,
      },
    )
    .unwrap();

    assert!(output.contains("var "));
    assert!(
      output.contains("declaration_1 = () => declaration_2;")
        || output.contains("declaration_2 = () => declaration_1;")
    );
  }

  #[test]
  fn type_only_declarations_are_dropped_from_output() {
    let module = url("file:///entry.ts");
    let mut graph = DeclarationGraph::new();
    graph
      .insert(decl(&module, "default", DeclKind::DefaultExportExpression, "1", &[]))
      .unwrap();
    graph
      .insert(decl(&module, "Shape", DeclKind::TypeOnly, "interface Shape { x: number }", &[]))
      .unwrap();

    let entry = CanonicalName::new(module, "default");
    let output = emit(
      &mut graph,
      &entry,
      &EmitOptions {
        suppress_entry_call: true,
      },
    )
    .unwrap();
    assert!(!output.contains("Shape"));
  }
}
