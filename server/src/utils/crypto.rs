//! Hashing helpers (SHA-3 family)

use sha3::{Digest, Sha3_256, Sha3_512};

/// SHA3-512 over raw bytes, lowercase hex (128 chars)
pub fn sha3_512_hex(data: &[u8]) -> String {
    hex::encode(Sha3_512::digest(data))
}

/// SHA3-256 over a string, lowercase hex (64 chars). Used for migration checksums.
pub fn sha3_256_hex(data: &str) -> String {
    hex::encode(Sha3_256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_512_empty() {
        assert_eq!(
            sha3_512_hex(b""),
            "a69f73cca23a9ac5c8b567dc185a756e97c982164fe25859e0d1dcc1475c80a6\
             15b2123af1f5f94c11e3e9402c3ac558f500199d95b6d3e301758586281dcd26"
        );
    }

    #[test]
    fn test_sha3_256_abc() {
        assert_eq!(
            sha3_256_hex("abc"),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }

    #[test]
    fn test_output_is_lowercase_hex() {
        let digest = sha3_512_hex(b"weiss");
        assert_eq!(digest.len(), 128);
        assert!(digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
    }
}
