//! Login credentials.
//!
//! A key is valid for a username when it equals a fixed hash of that name
//! reduced modulo [`KEY_MODULUS`]. This is proof of knowing the rule, not
//! authentication: anyone can derive the key.

use sha2::{Digest, Sha256};

/// Keys live in `0..KEY_MODULUS`.
pub const KEY_MODULUS: u64 = 100_000;

/// Key the server expects for `username`.
///
/// First eight bytes of SHA-256 over the UTF-8 name, big-endian, modulo
/// [`KEY_MODULUS`].
pub fn expected_key(username: &str) -> i32 {
    let digest = Sha256::digest(username.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let reduced = u64::from_be_bytes(prefix) % KEY_MODULUS;
    // reduced < 100_000 always fits
    i32::try_from(reduced).unwrap_or(i32::MAX)
}

/// Username plus submitted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Submitted key.
    pub key: i32,
}

impl Credentials {
    /// Credentials with an explicit key.
    pub fn new(username: impl Into<String>, key: i32) -> Self {
        Self { username: username.into(), key }
    }

    /// Credentials carrying the correct key for `username`.
    pub fn derive(username: impl Into<String>) -> Self {
        let username = username.into();
        let key = expected_key(&username);
        Self { username, key }
    }

    /// Key the server expects for this username.
    pub fn expected_key(&self) -> i32 {
        expected_key(&self.username)
    }

    /// Whether the submitted key matches.
    pub fn is_valid(&self) -> bool {
        self.key == self.expected_key()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn derived_credentials_are_valid() {
        assert!(Credentials::derive("alice").is_valid());
    }

    #[test]
    fn expected_key_is_stable() {
        assert_eq!(expected_key("alice"), expected_key("alice"));
        assert_eq!(Credentials::new("alice", 0).expected_key(), expected_key("alice"));
    }

    #[test]
    fn wrong_key_is_invalid() {
        let expected = expected_key("alice");
        let wrong = (expected + 1) % 100_000;
        assert!(!Credentials::new("alice", wrong).is_valid());
    }

    proptest! {
        #[test]
        fn expected_key_is_within_modulus(name in ".{0,32}") {
            let key = expected_key(&name);
            prop_assert!((0..100_000).contains(&key));
        }
    }
}
