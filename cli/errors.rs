// Copyright 2018-2026 the Deno authors. MIT license.

//! Error taxonomy for the bundler core (spec.md §7).
//!
//! Every fallible pipeline stage returns `Result<_, FuneeError>`. Variants
//! carry the fields called out in the spec so that `Display` satisfies the
//! "user-visible behavior" bullets by construction (missing symbol named,
//! `parse`/`error`/`expected` substring present, status + URL present).

use std::path::PathBuf;

use url::Url;

use crate::ast::Span;

#[derive(Debug, thiserror::Error)]
pub enum FuneeError {
  // --- Fetch errors ---
  #[error("NotFound: module not found: {uri}")]
  NotFound { uri: Url },

  #[error("HttpError: {status} fetching {url}")]
  HttpError { status: u16, url: Url },

  #[error("NetworkError: {message} while fetching {url}")]
  NetworkError { url: Url, message: String },

  #[error("RedirectLoop: exceeded {max_redirects} redirects resolving {url}")]
  RedirectLoop { url: Url, max_redirects: u8 },

  #[error(
    "HostEscape: module \"{referrer}\" (http(s)://) may not resolve specifier \"{specifier}\" to a non-http(s) URI"
  )]
  HostEscape { referrer: Url, specifier: String },

  #[error("could not read local file {path}: {source}")]
  LocalIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  // --- Parse errors ---
  #[error("parse error at {uri}:{}:{}: {message}", span.line, span.col)]
  ParseError {
    uri: Url,
    span: Span,
    message: String,
  },

  // --- Resolution errors ---
  #[error("MissingExport: module \"{module}\" has no export named \"{name}\"")]
  MissingExport { module: Url, name: String },

  #[error("ReExportCycle: re-export chain for \"{name}\" starting at {module} never terminates in a declaration")]
  ReExportCycle { module: Url, name: String },

  #[error(
    "AmbiguousStarExport: \"{name}\" is provided by more than one `export *` target of {module}"
  )]
  AmbiguousStarExport { module: Url, name: String },

  #[error("UnresolvedReference: \"{name}\" is not defined in the scope of {scope}")]
  UnresolvedReference { scope: Url, name: String },

  // --- Macro errors ---
  #[error("Macro expansion exceeded max iterations ({max_iterations})")]
  MacroRecursion { max_iterations: u32 },

  #[error("MacroTimeout: macro at {uri} exceeded its wall-clock budget ({budget_ms}ms)")]
  MacroTimeout { uri: Url, budget_ms: u64 },

  #[error(
    "MacroReturnShape: macro at {uri} must return {{ expression: string, references: Map }}, got: {detail}"
  )]
  MacroReturnShape { uri: Url, detail: String },

  #[error("CreateMacroUnexpanded: `createMacro` reached emission unexpanded; this is a bundler bug")]
  CreateMacroUnexpanded,

  // --- Emission errors ---
  #[error("EmitOrderingConflict: {detail} (internal assertion failure)")]
  EmitOrderingConflict { detail: String },

  #[error("{0}")]
  Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FuneeError>;
