// Copyright 2018-2026 the Deno authors. MIT license.

use sha2::Digest;
use sha2::Sha256;

pub fn gen(v: &[impl AsRef<[u8]>]) -> String {
  let mut hasher = Sha256::new();
  for src in v {
    hasher.update(src.as_ref());
  }
  let digest = hasher.finalize();
  let mut out = String::with_capacity(digest.len() * 2);
  for byte in digest {
    out.push_str(&format!("{:02x}", byte));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_gen() {
    let actual = gen(&[b"hello world"]);
    assert_eq!(
      actual,
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
  }

  #[test]
  fn test_gen_multiple_parts() {
    let combined = gen(&[b"hello world".as_slice()]);
    let split = gen(&[b"hello ".as_slice(), b"world".as_slice()]);
    assert_eq!(combined, split);
  }
}
