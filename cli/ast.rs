// Copyright 2018-2026 the Deno authors. MIT license.

//! Parser (spec.md §4.2). Wraps `deno_ast` (itself a thin layer over
//! `swc_ecma_parser`/`swc_ecma_ast`/`swc_common`) to produce an AST annotated
//! with stable spans, plus a raw list of the declarations and import/export
//! statements a module's top level carries. The resolver (`resolver.rs`)
//! turns that raw list into the export/import tables from spec.md §3.

use deno_ast::swc::ast as swc_ast;
use deno_ast::swc::ast::Decl;
use deno_ast::swc::ast::DefaultDecl;
use deno_ast::swc::ast::ExportSpecifier;
use deno_ast::swc::ast::ModuleDecl;
use deno_ast::swc::ast::ModuleExportName;
use deno_ast::swc::ast::ModuleItem;
use deno_ast::swc::ast::Pat;
use deno_ast::swc::ast::VarDeclKind;
use deno_ast::MediaType;
use deno_ast::ParseParams;
use deno_ast::ParsedSource;
use deno_ast::SourceRangedForSpanned;
use url::Url;

use crate::errors::FuneeError;
use crate::errors::Result;

/// A stable, 1-based `line:col` position, used both for diagnostics and as
/// part of `Declaration` identity-adjacent bookkeeping (never identity
/// itself — identity is always `(module_uri, name)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
  pub line: usize,
  pub col: usize,
}

/// The kind of atomic top-level binding the tree shaker considers (spec.md
/// §3 `Declaration.kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
  Function,
  Const,
  Let,
  Class,
  TypeOnly,
  DefaultExportExpression,
  /// `using x = ...` / `await using x = ...` (spec.md §4.2, §9). The `bool`
  /// is `true` for `await using`. Modeled as a declaration in its own right
  /// rather than folded into `Let` — `using` carries dispose-on-scope-exit
  /// semantics `let` doesn't, and the emitter must reproduce the `using`/
  /// `await using` keyword verbatim for that semantics to survive emission.
  Using(bool),
}

/// One top-level binding discovered while walking a module's items, before
/// resolution has turned its free identifiers into canonical names.
#[derive(Debug, Clone)]
pub struct RawDeclaration {
  pub name: String,
  pub kind: DeclKind,
  pub span: Span,
  /// Syntactically `<name> = createMacro(...)` at the binding site —
  /// detected here so the macro engine (spec.md §4.5) doesn't have to
  /// re-walk the whole module to find macro markers.
  pub is_macro_marker: bool,
  /// Source snippet of the declaration body (function/class/const
  /// initializer), verbatim — this is what the emitter ultimately rewrites.
  pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
  Named(String),
  Default,
  Namespace,
}

#[derive(Debug, Clone)]
pub struct RawImport {
  pub local_name: String,
  pub source_specifier: String,
  pub imported: ImportedName,
}

#[derive(Debug, Clone)]
pub enum RawExport {
  /// `export const x = ...` / `export function f` / `export default ...` —
  /// the name is defined in this module.
  Local { name: String },
  /// `export { a as b } from "./x"` or `export { a as b }` (local re-export
  /// of an import). `original_name` is the name as exported by
  /// `from_specifier` (or the local binding if `from_specifier` is `None`).
  ReExport {
    exported_name: String,
    original_name: String,
    from_specifier: Option<String>,
  },
  /// `export * from "./x"` — unioned into the namespace at resolve time,
  /// excluding the target's default export (spec.md §4.3).
  Star { from_specifier: String },
}

/// A module's source, parsed once and retained for the lifetime of the
/// bundler run (spec.md §3 "Lifecycles": modules are lazily fetched, parsed
/// once, and cached in-memory).
pub struct ParsedModule {
  pub specifier: Url,
  pub parsed_source: ParsedSource,
  pub declarations: Vec<RawDeclaration>,
  pub imports: Vec<RawImport>,
  pub exports: Vec<RawExport>,
  /// Whether this module has a `default` export at all (needed by the
  /// resolver's star-export exclusion rule).
  pub has_default_export: bool,
}

fn media_type_for(specifier: &Url) -> MediaType {
  let path = specifier.path();
  MediaType::from_path(std::path::Path::new(path))
}

/// `(line, col)` plus verbatim source text for any spanned node, used to
/// populate `RawDeclaration::{span,snippet}` — the emitter and macro engine
/// both operate on this snippet, never on the whole module's source.
fn span_and_snippet<N: SourceRangedForSpanned>(
  parsed_source: &ParsedSource,
  node: &N,
) -> (Span, String) {
  let range = node.range();
  let text_info = parsed_source.text_info();
  let start = text_info.line_and_column_index(range.start);
  let span = Span {
    line: start.line_index + 1,
    col: start.column_index + 1,
  };
  let snippet = text_info.range_text(&range).to_string();
  (span, snippet)
}

/// Parses `source` as the module at `specifier`, surfacing syntax errors as
/// `FuneeError::ParseError` with a stable span (spec.md §4.2).
pub fn parse_module(specifier: &Url, source: String) -> Result<ParsedModule> {
  let media_type = media_type_for(specifier);
  let parsed_source = deno_ast::parse_module(ParseParams {
    specifier: specifier.clone(),
    text: source.into(),
    media_type,
    capture_tokens: false,
    scope_analysis: false,
    maybe_syntax: None,
  })
  .map_err(|err| FuneeError::ParseError {
    uri: specifier.clone(),
    // deno_ast's diagnostic already carries a human-readable position in its
    // `Display` output; we fold it into `message` rather than re-deriving a
    // `(line, col)` pair from its internal source map, which is not exposed
    // across all parser-error variants.
    span: Span::default(),
    message: format!("{err}"),
  })?;

  let module = parsed_source.module();
  let mut declarations = Vec::new();
  let mut imports = Vec::new();
  let mut exports = Vec::new();
  let mut has_default_export = false;

  for item in module.body.iter() {
    match item {
      ModuleItem::ModuleDecl(decl) => match decl {
        ModuleDecl::Import(import_decl) => {
          let source_specifier = import_decl.src.value.to_string();
          for spec in &import_decl.specifiers {
            use deno_ast::swc::ast::ImportSpecifier as IS;
            match spec {
              IS::Named(named) => {
                let local_name = named.local.sym.to_string();
                let imported_name = named
                  .imported
                  .as_ref()
                  .map(export_name_to_string)
                  .unwrap_or_else(|| local_name.clone());
                imports.push(RawImport {
                  local_name,
                  source_specifier: source_specifier.clone(),
                  imported: ImportedName::Named(imported_name),
                });
              }
              IS::Default(default) => {
                imports.push(RawImport {
                  local_name: default.local.sym.to_string(),
                  source_specifier: source_specifier.clone(),
                  imported: ImportedName::Default,
                });
              }
              IS::Namespace(ns) => {
                imports.push(RawImport {
                  local_name: ns.local.sym.to_string(),
                  source_specifier: source_specifier.clone(),
                  imported: ImportedName::Namespace,
                });
              }
            }
          }
        }
        ModuleDecl::ExportDecl(export_decl) => {
          extract_decl(
            &export_decl.decl,
            &parsed_source,
            &mut declarations,
            &mut exports,
            true,
          );
        }
        ModuleDecl::ExportDefaultDecl(default_decl) => {
          has_default_export = true;
          // The declaration's own identity is always "default", regardless
          // of an inner `function foo()`/`class Foo` name — that inner name
          // only matters for the function/class's own recursive self-
          // references within its body, which stay textually intact in
          // `snippet` and are handled at emission by rewriting the node's
          // own `ident` range, not by looking it up here.
          let kind = match &default_decl.decl {
            DefaultDecl::Fn(_) => DeclKind::Function,
            DefaultDecl::Class(_) => DeclKind::Class,
            DefaultDecl::TsInterfaceDecl(_) => DeclKind::TypeOnly,
          };
          let (span, snippet) = span_and_snippet(&parsed_source, &default_decl.decl);
          declarations.push(RawDeclaration {
            name: "default".to_string(),
            kind,
            span,
            is_macro_marker: false,
            snippet,
          });
          exports.push(RawExport::Local {
            name: "default".to_string(),
          });
        }
        ModuleDecl::ExportDefaultExpr(default_expr) => {
          has_default_export = true;
          let (span, snippet) = span_and_snippet(&parsed_source, &default_expr.expr);
          declarations.push(RawDeclaration {
            name: "default".to_string(),
            kind: DeclKind::DefaultExportExpression,
            span,
            is_macro_marker: false,
            snippet,
          });
          exports.push(RawExport::Local {
            name: "default".to_string(),
          });
        }
        ModuleDecl::ExportNamed(named) => {
          let from_specifier = named.src.as_ref().map(|s| s.value.to_string());
          for spec in &named.specifiers {
            if let ExportSpecifier::Named(named_spec) = spec {
              let original_name = export_name_to_string(&named_spec.orig);
              let exported_name = named_spec
                .exported
                .as_ref()
                .map(export_name_to_string)
                .unwrap_or_else(|| original_name.clone());
              if exported_name == "default" {
                has_default_export = true;
              }
              exports.push(RawExport::ReExport {
                exported_name,
                original_name,
                from_specifier: from_specifier.clone(),
              });
            }
          }
        }
        ModuleDecl::ExportAll(export_all) => {
          exports.push(RawExport::Star {
            from_specifier: export_all.src.value.to_string(),
          });
        }
        _ => {}
      },
      ModuleItem::Stmt(swc_ast::Stmt::Decl(decl)) => {
        // A non-exported top-level declaration still occupies a canonical
        // name (`{uri, name}`) and is kept unless the shaker reaches it
        // transitively; it's just never a root by virtue of being exported.
        extract_decl(decl, &parsed_source, &mut declarations, &mut exports, false);
      }
      ModuleItem::Stmt(_) => {
        // Side-effect-only statements (bare expressions, top-level `if`,
        // etc.) are never declarations and are never tree-shake roots on
        // their own (spec.md §9, "whether a side-effect-only import should
        // pull in any declarations" — resolved as no).
      }
    }
  }

  Ok(ParsedModule {
    specifier: specifier.clone(),
    parsed_source,
    declarations,
    imports,
    exports,
    has_default_export,
  })
}

fn export_name_to_string(name: &ModuleExportName) -> String {
  match name {
    ModuleExportName::Ident(ident) => ident.sym.to_string(),
    ModuleExportName::Str(s) => s.value.to_string(),
  }
}

fn extract_decl(
  decl: &Decl,
  parsed_source: &ParsedSource,
  declarations: &mut Vec<RawDeclaration>,
  exports: &mut Vec<RawExport>,
  exported: bool,
) {
  match decl {
    Decl::Fn(fn_decl) => {
      let name = fn_decl.ident.sym.to_string();
      let (span, snippet) = span_and_snippet(parsed_source, fn_decl);
      declarations.push(RawDeclaration {
        name: name.clone(),
        kind: DeclKind::Function,
        span,
        is_macro_marker: false,
        snippet,
      });
      if exported {
        exports.push(RawExport::Local { name });
      }
    }
    Decl::Class(class_decl) => {
      let name = class_decl.ident.sym.to_string();
      let (span, snippet) = span_and_snippet(parsed_source, class_decl);
      declarations.push(RawDeclaration {
        name: name.clone(),
        kind: DeclKind::Class,
        span,
        is_macro_marker: false,
        snippet,
      });
      if exported {
        exports.push(RawExport::Local { name });
      }
    }
    Decl::Var(var_decl) => {
      let kind = match var_decl.kind {
        VarDeclKind::Const => DeclKind::Const,
        VarDeclKind::Let => DeclKind::Let,
        VarDeclKind::Var => DeclKind::Let,
      };
      for declarator in &var_decl.decls {
        if let Pat::Ident(binding) = &declarator.name {
          let name = binding.id.sym.to_string();
          let is_macro_marker = declarator
            .init
            .as_ref()
            .map(|init| is_create_macro_call(init))
            .unwrap_or(false);
          let (span, snippet) = span_and_snippet(parsed_source, declarator);
          declarations.push(RawDeclaration {
            name: name.clone(),
            kind,
            span,
            is_macro_marker,
            snippet,
          });
          if exported {
            exports.push(RawExport::Local { name });
          }
        }
      }
    }
    Decl::Using(using_decl) => {
      for declarator in &using_decl.decls {
        if let Pat::Ident(binding) = &declarator.name {
          let name = binding.id.sym.to_string();
          let is_macro_marker = declarator
            .init
            .as_ref()
            .map(|init| is_create_macro_call(init))
            .unwrap_or(false);
          let (span, snippet) = span_and_snippet(parsed_source, declarator);
          declarations.push(RawDeclaration {
            name: name.clone(),
            kind: DeclKind::Using(using_decl.is_await),
            span,
            is_macro_marker,
            snippet,
          });
          if exported {
            exports.push(RawExport::Local { name });
          }
        }
      }
    }
    Decl::TsInterface(iface) => {
      let name = iface.id.sym.to_string();
      let (span, snippet) = span_and_snippet(parsed_source, iface);
      declarations.push(RawDeclaration {
        name: name.clone(),
        kind: DeclKind::TypeOnly,
        span,
        is_macro_marker: false,
        snippet,
      });
      if exported {
        exports.push(RawExport::Local { name });
      }
    }
    Decl::TsTypeAlias(alias) => {
      let name = alias.id.sym.to_string();
      let (span, snippet) = span_and_snippet(parsed_source, alias);
      declarations.push(RawDeclaration {
        name: name.clone(),
        kind: DeclKind::TypeOnly,
        span,
        is_macro_marker: false,
        snippet,
      });
      if exported {
        exports.push(RawExport::Local { name });
      }
    }
    _ => {}
  }
}

/// Recognizes `createMacro(fn)` call expressions syntactically, regardless
/// of how many parens wrap them. Resolving whether `createMacro` itself
/// binds to the standard-library symbol happens later in the resolver —
/// this is purely the syntactic shape check spec.md §4.5 calls for.
fn is_create_macro_call(expr: &swc_ast::Expr) -> bool {
  if let swc_ast::Expr::Call(call) = expr {
    if let swc_ast::Callee::Expr(callee) = &call.callee {
      if let swc_ast::Expr::Ident(ident) = callee.as_ref() {
        return ident.sym.as_ref() == "createMacro";
      }
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  #[test]
  fn parses_named_and_default_exports() {
    let source = r#"
      export const used = 1;
      const unused = 2;
      export default function main() {}
    "#
    .to_string();
    let module = parse_module(&url("file:///entry.ts"), source).unwrap();
    assert!(module.has_default_export);
    assert!(module
      .declarations
      .iter()
      .any(|d| d.name == "used" && d.kind == DeclKind::Const));
    assert!(module.declarations.iter().any(|d| d.name == "unused"));
  }

  #[test]
  fn detects_macro_marker() {
    let source = r#"
      export const addOne = createMacro((arg) => {
        return { expression: "(" + arg.expression + ") + 1", references: new Map() };
      });
    "#
    .to_string();
    let module = parse_module(&url("file:///macro.ts"), source).unwrap();
    let decl = module
      .declarations
      .iter()
      .find(|d| d.name == "addOne")
      .unwrap();
    assert!(decl.is_macro_marker);
  }

  #[test]
  fn parses_using_and_await_using_declarations() {
    let source = r#"
      function open() { return 1; }
      using handle = open();
      await using handle2 = open();
    "#
    .to_string();
    let module = parse_module(&url("file:///resource.ts"), source).unwrap();
    let handle = module.declarations.iter().find(|d| d.name == "handle").unwrap();
    assert_eq!(handle.kind, DeclKind::Using(false));
    let handle2 = module.declarations.iter().find(|d| d.name == "handle2").unwrap();
    assert_eq!(handle2.kind, DeclKind::Using(true));
  }

  #[test]
  fn parses_re_export_and_star_export() {
    let source = r#"
      export { a as b } from "./x.ts";
      export * from "./y.ts";
    "#
    .to_string();
    let module = parse_module(&url("file:///barrel.ts"), source).unwrap();
    assert!(module.exports.iter().any(|e| matches!(
      e,
      RawExport::ReExport { exported_name, original_name, from_specifier }
        if exported_name == "b" && original_name == "a" && from_specifier.as_deref() == Some("./x.ts")
    )));
    assert!(module
      .exports
      .iter()
      .any(|e| matches!(e, RawExport::Star { from_specifier } if from_specifier == "./y.ts")));
  }
}
