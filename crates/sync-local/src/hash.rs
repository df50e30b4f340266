//! SHA-256 content hashing.
//!
//! Gives content identity a single bit-exact comparison point shared across
//! local, remote, and indexed records. The wire contract mandates SHA-256
//! specifically, so hashing stays a one-shot `bytes -> hex string` function
//! rather than anything streaming or content-defined.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `content`, returning a lowercase hex string.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{:02x}", b).expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let h1 = content_hash(b"hello world");
        let h2 = content_hash(b"hello world");
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_content_differs() {
        let h1 = content_hash(b"hello world");
        let h2 = content_hash(b"hello world!");
        assert_ne!(h1, h2);
    }

    #[test]
    fn is_lowercase_64_char_hex() {
        let h = content_hash(b"test");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn known_empty_hash() {
        let h = content_hash(b"");
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
