// Copyright 2018-2026 the Deno authors. MIT license.

//! The `host://` module registry (spec.md §6) — a fixed table synthesized by
//! the fetcher, with no backing I/O, plus the fixed JS-global allow-list
//! used by the graph builder (spec.md §4.4) to distinguish an unresolved
//! reference from a reference to something the embedded runtime already
//! provides.

pub struct HostModule {
  pub uri: &'static str,
  pub exports: &'static [&'static str],
}

pub const HOST_MODULES: &[HostModule] = &[
  HostModule {
    uri: "host://fs",
    exports: &[
      "readFile",
      "readFileBinary",
      "writeFile",
      "writeFileBinary",
      "isFile",
      "exists",
      "lstat",
      "mkdir",
      "readdir",
      "tmpdir",
    ],
  },
  HostModule {
    uri: "host://http",
    exports: &["fetch"],
  },
  HostModule {
    uri: "host://http/server",
    exports: &["serve", "createResponse", "createJsonResponse"],
  },
  HostModule {
    uri: "host://process",
    exports: &["spawn"],
  },
  HostModule {
    uri: "host://time",
    exports: &["setTimeout", "clearTimeout", "setInterval", "clearInterval"],
  },
  HostModule {
    uri: "host://watch",
    exports: &[
      "watchStart",
      "watchPoll",
      "watchStop",
      "watchFile",
      "watchDirectory",
    ],
  },
  HostModule {
    uri: "host://crypto",
    exports: &["randomBytes"],
  },
  HostModule {
    uri: "host://console",
    exports: &["log", "debug"],
  },
];

pub fn lookup(uri: &str) -> Option<&'static HostModule> {
  HOST_MODULES.iter().find(|m| m.uri == uri)
}

pub fn is_export(uri: &str, name: &str) -> bool {
  lookup(uri).is_some_and(|m| m.exports.contains(&name))
}

/// JS globals the graph builder treats as already resolved (spec.md §4.4).
/// Timers are listed here *and* exposed via `host://time` — the emitter
/// must treat both sites as the same capability (spec.md §9 "Global vs.
/// host-imported timers"), so tree shaking never has to decide between them.
pub const JS_GLOBALS: &[&str] = &[
  "Promise",
  "Object",
  "Array",
  "JSON",
  "Math",
  "Number",
  "String",
  "Boolean",
  "Symbol",
  "Date",
  "Error",
  "Map",
  "Set",
  "RegExp",
  "URL",
  "URLSearchParams",
  "Request",
  "Response",
  "Headers",
  "Uint8Array",
  "ArrayBuffer",
  "AbortController",
  "AbortSignal",
  "console",
  "globalThis",
  "undefined",
  "null",
  "NaN",
  "Infinity",
  "setTimeout",
  "clearTimeout",
  "setInterval",
  "clearInterval",
];

pub fn is_js_global(name: &str) -> bool {
  JS_GLOBALS.contains(&name)
}

/// Renders the preamble that binds every `host://*` name actually referenced
/// by the surviving bundle to the host runtime's operation handles (spec.md
/// §4.7, §6 "Bundle output format"). The emitter only needs the names; bit
/// -exact signatures are the embedded runtime's contract, not ours.
pub fn emit_preamble(used: &[&str]) -> String {
  let mut out = String::new();
  out.push_str("// --- host bindings (provided by the embedded runtime) ---\n");
  for uri in used {
    if let Some(module) = lookup(uri) {
      let binding_prefix = uri.trim_start_matches("host://").replace('/', "_");
      for export in module.exports {
        out.push_str(&format!(
          "const __host_{binding_prefix}_{export} = globalThis.__funeeHost(\"{uri}\", \"{export}\");\n"
        ));
      }
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn looks_up_fixed_exports() {
    assert!(is_export("host://fs", "readFile"));
    assert!(!is_export("host://fs", "deleteFile"));
  }

  #[test]
  fn recognizes_js_globals() {
    assert!(is_js_global("Promise"));
    assert!(!is_js_global("notAGlobal"));
  }
}
