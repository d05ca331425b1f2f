//! SHA-256 checksum helper.
//!
//! spec standardizes on hex-encoded SHA-256 strings end-to-end (the
//! reference stored checksums as raw bytes in some revisions and hex in
//! others); this crate only ever produces and compares the hex form.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `content`.
pub fn hex_sha256(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let digest = hasher.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            hex_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn deterministic_and_sensitive_to_content() {
        let a = hex_sha256(b"aabbbcccc");
        let b = hex_sha256(b"aabbbcccd");
        assert_ne!(a, b);
        assert_eq!(a, hex_sha256(b"aabbbcccc"));
    }
}
