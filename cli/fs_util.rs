// Copyright 2018-2026 the Deno authors. MIT license.

//! Write-temp-then-rename helper shared by `http_cache` and `cache_dir`
//! consumers, grounded on the teacher's own `atomic_write_file` (minus its
//! `rand`-crate tmp suffix, swapped here for a process-local counter so a
//! single-purpose helper doesn't pull in a whole randomness dependency).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn atomic_write_file<T: AsRef<[u8]>>(
  filename: &Path,
  data: T,
  mode: u32,
) -> std::io::Result<()> {
  let suffix = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
  let tmp_file = filename.with_extension(format!("{:x}.tmp", suffix));
  write_file(&tmp_file, data, mode)?;
  std::fs::rename(&tmp_file, filename)?;
  Ok(())
}

fn write_file<T: AsRef<[u8]>>(
  filename: &Path,
  data: T,
  #[allow(unused_variables)] mode: u32,
) -> std::io::Result<()> {
  if let Some(parent) = filename.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let mut options = OpenOptions::new();
  options.write(true).create(true).truncate(true);
  #[cfg(unix)]
  options.mode(mode);
  let mut file = options.open(filename)?;
  file.write_all(data.as_ref())
}
