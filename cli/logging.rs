// Copyright 2018-2026 the Deno authors. MIT license.

//! Initializes the `log` facade (spec.md §6 "Diagnostics output"), grounded
//! on the teacher's own `util::logger::init` — an `env_logger::Builder`
//! rather than a hand-rolled `log::Log` impl, with `FUNEE_LOG`/`-q` deciding
//! the level instead of the teacher's OpenTelemetry/LSP-aware formatting,
//! which has no counterpart here.

use std::io::Write;

const ENV_FILTER: &str = "FUNEE_LOG";

/// `quiet` drops the default level to `Warn` (spec.md §6 `-q`/`--quiet`:
/// "suppress `Fetched:` diagnostics and other informational output").
pub fn init(quiet: bool) {
  let default_level = if quiet { log::Level::Warn } else { log::Level::Info };

  env_logger::Builder::from_env(
    env_logger::Env::new()
      .filter_or(ENV_FILTER, default_level.to_level_filter().to_string())
      .write_style(&format!("{ENV_FILTER}_STYLE")),
  )
  .format(|buf, record| {
    if record.level() <= log::Level::Info {
      writeln!(buf, "{}", record.args())
    } else {
      writeln!(buf, "{} {} - {}", record.level(), record.target(), record.args())
    }
  })
  .init();
}
