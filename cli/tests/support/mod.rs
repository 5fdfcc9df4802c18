// Copyright 2018-2026 the Deno authors. MIT license.

//! A single-route `tiny_http` server for exercising `fetcher.rs`'s http(s)
//! path without a real network. Counts requests so tests can assert on
//! cache-hit behavior without parsing stderr diagnostics.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub struct MockServer {
  pub addr: std::net::SocketAddr,
  pub request_count: Arc<AtomicUsize>,
  _thread: std::thread::JoinHandle<()>,
}

impl MockServer {
  /// Serves `routes` (path -> body) on an OS-assigned localhost port until
  /// the process exits; `request_count` increments once per request, hit or
  /// miss.
  pub fn start(routes: HashMap<&'static str, &'static str>) -> Self {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("mock server binds");
    let addr = server.server_addr().to_ip().expect("tcp address");
    let request_count = Arc::new(AtomicUsize::new(0));
    let counter = request_count.clone();

    let thread = std::thread::spawn(move || {
      for request in server.incoming_requests() {
        counter.fetch_add(1, Ordering::SeqCst);
        let body = routes.get(request.url()).copied().unwrap_or("");
        let status = if routes.contains_key(request.url()) { 200 } else { 404 };
        let response = tiny_http::Response::from_string(body).with_status_code(status);
        let _ = request.respond(response);
      }
    });

    Self {
      addr,
      request_count,
      _thread: thread,
    }
  }

  pub fn url(&self, path: &str) -> String {
    format!("http://{}{}", self.addr, path)
  }
}
