//! Random identifier generation.
//!
//! spec §6 pins exact lengths and alphabets: 8-character lowercase
//! alphanumeric tokens for blob/metadata/user ids and bucket filenames,
//! 16-character tokens for session ids. The reference used a bespoke
//! `ranhash` package to the same effect; this is its Rust equivalent.

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

/// 8-character id for blobs, metadata rows, users, and bucket filenames.
pub fn short_id() -> String {
    random_token(8)
}

/// 16-character session token.
pub fn session_token() -> String {
    random_token(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_match_spec() {
        assert_eq!(short_id().len(), 8);
        assert_eq!(session_token().len(), 16);
    }

    #[test]
    fn alphabet_is_lowercase_alnum() {
        let id = short_id();
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
