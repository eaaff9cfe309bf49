use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Length of a content digest in bytes (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Content address of a blob.
///
/// A `ContentDigest` is the SHA-256 hash of a file's complete byte stream.
/// Identical bytes always produce the same digest, so the digest doubles as
/// the blob's storage key (hex-encoded) and as the outer key of registry
/// entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Compute the digest of an in-memory byte slice.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Wrap a pre-computed hash.
    pub fn from_hash(hash: [u8; DIGEST_LEN]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != DIGEST_LEN {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.short_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; DIGEST_LEN]> for ContentDigest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn of_matches_known_vector() {
        assert_eq!(ContentDigest::of(b"hello").to_hex(), HELLO_SHA256);
    }

    #[test]
    fn of_is_deterministic() {
        assert_eq!(ContentDigest::of(b"same"), ContentDigest::of(b"same"));
        assert_ne!(ContentDigest::of(b"same"), ContentDigest::of(b"other"));
    }

    #[test]
    fn hex_roundtrip() {
        let digest = ContentDigest::of(b"test");
        let parsed = ContentDigest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            ContentDigest::from_hex("not-hex"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert_eq!(
            ContentDigest::from_hex("abcd"),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 2
            })
        );
    }

    #[test]
    fn display_is_full_hex() {
        let digest = ContentDigest::of(b"hello");
        assert_eq!(format!("{digest}"), HELLO_SHA256);
        assert_eq!(format!("{digest:?}"), "ContentDigest(2cf24dba)");
    }

    #[test]
    fn from_str_parses() {
        let digest: ContentDigest = HELLO_SHA256.parse().unwrap();
        assert_eq!(digest, ContentDigest::of(b"hello"));
    }
}
