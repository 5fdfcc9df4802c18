// Copyright 2018-2026 the Deno authors. MIT license.

//! Canonical names and specifier resolution (spec.md §3, §4.1).

use std::fmt;

use url::Url;

use crate::errors::FuneeError;
use crate::errors::Result;

/// `{uri, name}` — the identity used throughout the bundler. Two
/// declarations never share a canonical name (spec.md §3 invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalName {
  pub uri: Url,
  pub name: String,
}

impl CanonicalName {
  pub fn new(uri: Url, name: impl Into<String>) -> Self {
    Self {
      uri,
      name: name.into(),
    }
  }
}

impl fmt::Display for CanonicalName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}", self.uri, self.name)
  }
}

fn is_supported_scheme(scheme: &str) -> bool {
  matches!(scheme, "file" | "http" | "https" | "host")
}

/// Resolves `specifier` (possibly relative) against `referrer` into an
/// absolute URI, enforcing the Fetcher's resolution policy (spec.md §4.1).
pub fn resolve_specifier(specifier: &str, referrer: &Url) -> Result<Url> {
  let resolved = if let Ok(absolute) = Url::parse(specifier) {
    absolute
  } else {
    referrer.join(specifier).map_err(|err| {
      FuneeError::Other(anyhow::anyhow!(
        "could not resolve specifier \"{specifier}\" against {referrer}: {err}"
      ))
    })?
  };

  if !is_supported_scheme(resolved.scheme()) {
    return Err(FuneeError::Other(anyhow::anyhow!(
      "unsupported scheme \"{}\" for module \"{}\"",
      resolved.scheme(),
      resolved
    )));
  }

  let referrer_is_http = matches!(referrer.scheme(), "http" | "https");
  let resolved_is_http = matches!(resolved.scheme(), "http" | "https");
  if referrer_is_http && !resolved_is_http {
    return Err(FuneeError::HostEscape {
      referrer: referrer.clone(),
      specifier: specifier.to_string(),
    });
  }

  Ok(resolved)
}
