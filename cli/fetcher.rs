// Copyright 2018-2026 the Deno authors. MIT license.

//! Resolves a specifier against a referrer and returns source bytes for one
//! of the three supported schemes (spec.md §4.1).
//!
//! Concurrency follows spec.md §5: local reads are unbounded, remote fetches
//! are bounded by a small per-run `Semaphore` so a module graph with many
//! distinct remote origins doesn't open an unbounded number of connections
//! at once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use url::Url;

use crate::diagnostics::Diagnostics;
use crate::errors::FuneeError;
use crate::errors::Result;
use crate::graph::Provenance;
use crate::host;
use crate::http_cache::HeadersMap;
use crate::http_cache::HttpCache;

const MAX_REDIRECTS: u8 = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REMOTE_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
  /// `--reload`: bypass the cache on read, still write on a successful
  /// fetch (spec.md §4.1 "http(s)").
  pub reload: bool,
}

pub struct Fetcher {
  cache: HttpCache,
  client: reqwest::Client,
  diagnostics: Arc<Diagnostics>,
  remote_permits: Semaphore,
  options: FetchOptions,
}

impl Fetcher {
  pub fn new(cache_dir: PathBuf, diagnostics: Arc<Diagnostics>, options: FetchOptions) -> Self {
    let client = reqwest::Client::builder()
      .timeout(DEFAULT_TIMEOUT)
      .redirect(reqwest::redirect::Policy::none())
      .build()
      .expect("reqwest client with a fixed timeout and no automatic redirects always builds");
    Self {
      cache: HttpCache::new(&cache_dir),
      client,
      diagnostics,
      remote_permits: Semaphore::new(DEFAULT_REMOTE_CONCURRENCY),
      options,
    }
  }

  /// Fetches `uri` (already resolved to an absolute URI by
  /// `specifier::resolve_specifier`). Returns the module's provenance and
  /// its source text.
  pub async fn fetch(&self, uri: &Url) -> Result<(Provenance, String)> {
    match uri.scheme() {
      "file" => self.fetch_file(uri).await,
      "http" | "https" => self.fetch_http(uri).await,
      "host" => self.fetch_host(uri),
      other => Err(FuneeError::Other(anyhow::anyhow!(
        "unsupported scheme \"{other}\" for module \"{uri}\""
      ))),
    }
  }

  async fn fetch_file(&self, uri: &Url) -> Result<(Provenance, String)> {
    let path = uri.to_file_path().map_err(|_| {
      FuneeError::Other(anyhow::anyhow!("not a valid file path: {uri}"))
    })?;
    let text = tokio::fs::read_to_string(&path).await.map_err(|source| {
      if source.kind() == std::io::ErrorKind::NotFound {
        FuneeError::NotFound { uri: uri.clone() }
      } else {
        FuneeError::LocalIo { path, source }
      }
    })?;
    Ok((Provenance::Local, text))
  }

  fn fetch_host(&self, uri: &Url) -> Result<(Provenance, String)> {
    if host::lookup(uri.as_str()).is_none() {
      return Err(FuneeError::NotFound { uri: uri.clone() });
    }
    // Host modules are synthesized by the bundler, not parsed from text; the
    // graph builder never actually needs this source, since `resolver`
    // short-circuits `host://` lookups before consulting a parsed module.
    Ok((Provenance::Synthetic, String::new()))
  }

  async fn fetch_http(&self, uri: &Url) -> Result<(Provenance, String)> {
    let _permit = self.remote_permits.acquire().await.expect("semaphore is never closed");

    if !self.options.reload {
      if let Ok((mut file, _headers)) = self.cache.get(uri) {
        use std::io::Read;
        let mut buf = String::new();
        if file.read_to_string(&mut buf).is_ok() {
          // Still attempt a fresh fetch below is unnecessary for a cache
          // hit; a plain cache hit costs zero network round-trips (spec.md
          // §8 "fetch -> fetch without eviction incurs zero network
          // round-trips").
          return Ok((
            Provenance::Http {
              cached: true,
              fetched_this_run: false,
            },
            buf,
          ));
        }
      }
    }

    match self.fetch_http_following_redirects(uri).await {
      Ok((body, headers)) => {
        let bytes = body.as_bytes();
        if self.cache.set(uri, headers, bytes).is_err() {
          log::warn!("{uri}: fetched successfully but failed to write to the on-disk cache");
        }
        self.diagnostics.note_fetched(uri);
        Ok((
          Provenance::Http {
            cached: false,
            fetched_this_run: true,
          },
          body,
        ))
      }
      Err(err) => {
        if let Ok((mut file, _headers)) = self.cache.get(uri) {
          use std::io::Read;
          let mut buf = String::new();
          if file.read_to_string(&mut buf).is_ok() {
            self.diagnostics.warn_stale_cache(uri, &err.to_string());
            return Ok((
              Provenance::Http {
                cached: true,
                fetched_this_run: false,
              },
              buf,
            ));
          }
        }
        Err(err)
      }
    }
  }

  async fn fetch_http_following_redirects(&self, uri: &Url) -> Result<(String, HeadersMap)> {
    let mut current = uri.clone();
    for _ in 0..=MAX_REDIRECTS {
      let response = self.client.get(current.clone()).send().await.map_err(|err| {
        FuneeError::NetworkError {
          url: current.clone(),
          message: err.to_string(),
        }
      })?;
      let status = response.status();

      if status.is_redirection() {
        let location = response
          .headers()
          .get(reqwest::header::LOCATION)
          .and_then(|v| v.to_str().ok())
          .ok_or_else(|| FuneeError::HttpError {
            status: status.as_u16(),
            url: current.clone(),
          })?;
        current = current.join(location).map_err(|err| FuneeError::NetworkError {
          url: current.clone(),
          message: err.to_string(),
        })?;
        continue;
      }

      if status.is_success() {
        let mut headers = HeadersMap::new();
        for (name, value) in response.headers() {
          if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
          }
        }
        let body = response.text().await.map_err(|err| FuneeError::NetworkError {
          url: uri.clone(),
          message: err.to_string(),
        })?;
        return Ok((body, headers));
      }

      return Err(FuneeError::HttpError {
        status: status.as_u16(),
        url: current.clone(),
      });
    }

    Err(FuneeError::RedirectLoop {
      url: uri.clone(),
      max_redirects: MAX_REDIRECTS,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn reads_a_local_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.ts");
    std::fs::write(&path, "export const x = 1;").unwrap();
    let uri = Url::from_file_path(&path).unwrap();

    let fetcher = Fetcher::new(
      dir.path().join("cache"),
      Arc::new(Diagnostics::new()),
      FetchOptions::default(),
    );
    let (provenance, text) = fetcher.fetch(&uri).await.unwrap();
    assert!(matches!(provenance, Provenance::Local));
    assert_eq!(text, "export const x = 1;");
  }

  #[tokio::test]
  async fn missing_local_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let uri = Url::from_file_path(dir.path().join("nope.ts")).unwrap();
    let fetcher = Fetcher::new(
      dir.path().join("cache"),
      Arc::new(Diagnostics::new()),
      FetchOptions::default(),
    );
    let err = fetcher.fetch(&uri).await.unwrap_err();
    assert!(matches!(err, FuneeError::NotFound { .. }));
  }

  #[tokio::test]
  async fn known_host_module_synthesizes_with_no_io() {
    let dir = TempDir::new().unwrap();
    let fetcher = Fetcher::new(
      dir.path().join("cache"),
      Arc::new(Diagnostics::new()),
      FetchOptions::default(),
    );
    let uri = Url::parse("host://fs").unwrap();
    let (provenance, _) = fetcher.fetch(&uri).await.unwrap();
    assert!(matches!(provenance, Provenance::Synthetic));
  }

  #[tokio::test]
  async fn unknown_host_module_is_not_found() {
    let dir = TempDir::new().unwrap();
    let fetcher = Fetcher::new(
      dir.path().join("cache"),
      Arc::new(Diagnostics::new()),
      FetchOptions::default(),
    );
    let uri = Url::parse("host://nope").unwrap();
    let err = fetcher.fetch(&uri).await.unwrap_err();
    assert!(matches!(err, FuneeError::NotFound { .. }));
  }
}
