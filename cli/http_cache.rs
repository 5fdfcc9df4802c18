// Copyright 2018-2026 the Deno authors. MIT license.

//! On-disk cache for fetched http(s) module bodies (spec.md §4.1 "Caching").
//! A successful fetch's body and response headers are written keyed by a
//! SHA-256 hash of the URL's path + query (fragment excluded — it addresses
//! a part of a page, not a distinct resource, so it plays no part in cache
//! identity). A failed re-fetch may still serve the last good cached body,
//! which is why `get` and `set` are kept independent of one another.

use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use log::error;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::errors::FuneeError;
use crate::errors::Result;
use crate::fs_util;

pub const CACHE_PERM: u32 = 0o644;

pub type HeadersMap = HashMap<String, String>;

/// Turns the scheme/host/port of a url into cache subdirectory components.
/// Ex: $FUNEE_CACHE_DIR/deps/https/deno.land/
fn base_url_to_filename(url: &Url) -> Option<PathBuf> {
  let mut out = PathBuf::new();
  let scheme = url.scheme();
  out.push(scheme);

  match scheme {
    "http" | "https" => {
      let host = url.host_str()?;
      let host_port = match url.port() {
        Some(port) => format!("{}_PORT{}", host, port),
        None => host.to_string(),
      };
      out.push(host_port);
    }
    "data" | "blob" => (),
    scheme => {
      error!("don't know how to create a cache name for scheme: {}", scheme);
      return None;
    }
  };

  Some(out)
}

/// Turns a url into a hashed filename, stable across runs, collision-free in
/// practice (spec.md §9 "Cache identity: the full resolved URL, including
/// query string; fragments are not part of cache identity").
pub fn url_to_filename(url: &Url) -> Option<PathBuf> {
  let mut cache_filename = base_url_to_filename(url)?;

  let mut rest_str = url.path().to_string();
  if let Some(query) = url.query() {
    rest_str.push('?');
    rest_str.push_str(query);
  }
  let hashed_filename = crate::checksum::gen(&[rest_str.as_bytes()]);
  cache_filename.push(hashed_filename);
  Some(cache_filename)
}

#[derive(Debug, Clone, Default)]
pub struct HttpCache {
  pub location: PathBuf,
}

#[derive(Serialize, Deserialize)]
pub struct Metadata {
  pub headers: HeadersMap,
  pub url: String,
}

impl Metadata {
  pub fn write(&self, cache_filename: &Path) -> Result<()> {
    let metadata_filename = Self::filename(cache_filename);
    let json = serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?;
    fs_util::atomic_write_file(&metadata_filename, json, CACHE_PERM).map_err(|source| {
      FuneeError::LocalIo {
        path: metadata_filename.clone(),
        source,
      }
    })?;
    Ok(())
  }

  pub fn read(cache_filename: &Path) -> Result<Metadata> {
    let metadata_filename = Metadata::filename(cache_filename);
    let metadata = fs::read_to_string(&metadata_filename).map_err(|source| FuneeError::LocalIo {
      path: metadata_filename.clone(),
      source,
    })?;
    let metadata: Metadata = serde_json::from_str(&metadata).map_err(anyhow::Error::from)?;
    Ok(metadata)
  }

  pub fn filename(cache_filename: &Path) -> PathBuf {
    cache_filename.with_extension("metadata.json")
  }
}

impl HttpCache {
  /// `location` must be an absolute path.
  pub fn new(location: &Path) -> Self {
    assert!(location.is_absolute());
    Self {
      location: location.to_owned(),
    }
  }

  fn ensure_dir_exists(&self, path: &Path) -> io::Result<()> {
    if path.is_dir() {
      return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| {
      io::Error::new(
        e.kind(),
        format!(
          "could not create module cache directory: {:?} ({})",
          path, e
        ),
      )
    })
  }

  pub fn get_cache_filename(&self, url: &Url) -> Option<PathBuf> {
    Some(self.location.join(url_to_filename(url)?))
  }

  pub fn get(&self, url: &Url) -> Result<(File, HeadersMap)> {
    let cache_filename = self
      .get_cache_filename(url)
      .ok_or_else(|| FuneeError::Other(anyhow::anyhow!("cannot convert url to a cache filename: {url}")))?;
    let metadata = Metadata::read(&cache_filename)?;
    let file = File::open(&cache_filename).map_err(|source| FuneeError::LocalIo {
      path: cache_filename.clone(),
      source,
    })?;
    Ok((file, metadata.headers))
  }

  pub fn set(&self, url: &Url, headers_map: HeadersMap, content: &[u8]) -> Result<()> {
    let cache_filename = self
      .get_cache_filename(url)
      .ok_or_else(|| FuneeError::Other(anyhow::anyhow!("cannot convert url to a cache filename: {url}")))?;
    let parent = cache_filename
      .parent()
      .expect("cache filename always has a parent directory");
    self.ensure_dir_exists(parent).map_err(|source| FuneeError::LocalIo {
      path: parent.to_path_buf(),
      source,
    })?;
    fs_util::atomic_write_file(&cache_filename, content, CACHE_PERM).map_err(|source| {
      FuneeError::LocalIo {
        path: cache_filename.clone(),
        source,
      }
    })?;

    let metadata = Metadata {
      url: url.to_string(),
      headers: headers_map,
    };
    metadata.write(&cache_filename)
  }
}
