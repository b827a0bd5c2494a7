//! Content digests
//!
//! A digest is the SHA3-512 of the exact uploaded bytes, rendered as 128
//! lowercase hex characters. Distinct contents are assumed never to share a
//! digest; nothing here detects a collision.

use std::fmt;

use serde::Serialize;

use super::error::DigestParseError;
use crate::utils::crypto::sha3_512_hex;

/// Hex length of digests produced by [`compute_digest`]
pub const DIGEST_HEX_LEN: usize = 128;

/// Non-empty lowercase hex string identifying file content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Accept an externally supplied digest
    ///
    /// Any non-empty lowercase hex string is accepted, not only full-length
    /// SHA3-512 output.
    pub fn parse(s: &str) -> Result<Self, DigestParseError> {
        if s.is_empty() {
            return Err(DigestParseError::Empty);
        }
        if let Some((position, found)) = s
            .char_indices()
            .find(|(_, c)| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(DigestParseError::InvalidCharacter { position, found });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters, for `1 <= len <= digest length`
    pub fn prefix(&self, len: usize) -> Option<&str> {
        if len == 0 {
            return None;
        }
        self.0.get(..len)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Digest of a fully materialized byte sequence
pub fn compute_digest(bytes: &[u8]) -> Digest {
    Digest(sha3_512_hex(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_digest_is_deterministic() {
        let a = compute_digest(b"hello weiss");
        let b = compute_digest(b"hello weiss");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_distinct_inputs_distinct_digests() {
        let inputs: [&[u8]; 4] = [b"", b"a", b"b", b"hello weiss"];
        let digests: std::collections::HashSet<_> =
            inputs.iter().map(|i| compute_digest(i)).collect();
        assert_eq!(digests.len(), inputs.len());
    }

    #[test]
    fn test_empty_input_digest() {
        let digest = compute_digest(b"");
        assert!(digest.as_str().starts_with("a69f73cca23a9ac5"));
        assert_eq!(digest.as_str().len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_computed_digest_parses() {
        let digest = compute_digest(b"roundtrip");
        assert_eq!(Digest::parse(digest.as_str()).unwrap(), digest);
    }

    #[test]
    fn test_parse_accepts_short_digests() {
        let digest = Digest::parse("a1").unwrap();
        assert_eq!(digest.to_string(), "a1");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(Digest::parse(""), Err(DigestParseError::Empty));
        assert_eq!(
            Digest::parse("aB"),
            Err(DigestParseError::InvalidCharacter {
                position: 1,
                found: 'B'
            })
        );
        assert!(Digest::parse("a g").is_err());
    }

    #[test]
    fn test_prefix_bounds() {
        let digest = Digest::parse("ff00").unwrap();
        assert_eq!(digest.prefix(0), None);
        assert_eq!(digest.prefix(1), Some("f"));
        assert_eq!(digest.prefix(4), Some("ff00"));
        assert_eq!(digest.prefix(5), None);
    }

    #[test]
    fn test_serializes_as_string() {
        let digest = Digest::parse("abc").unwrap();
        assert_eq!(serde_json::to_string(&digest).unwrap(), r#""abc""#);
    }
}
