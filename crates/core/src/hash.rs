//! BLAKE3 content hashing used as the sole block identifier

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a digest in bytes
pub const DIGEST_LEN: usize = 32;

/// A BLAKE3 digest (32 bytes)
///
/// Byte ordering matches the lexicographic ordering of the hex form, so
/// digests can be placed on the hash ring without converting to strings.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Create a digest from raw bytes
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the digest as a byte slice
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex encoding (64 characters)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != DIGEST_LEN * 2 {
            anyhow::bail!(
                "Invalid hex length: expected {} characters, got {}",
                DIGEST_LEN * 2,
                s.len()
            );
        }

        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .with_context(|| format!("Invalid hex digest: {}", s))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Digest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Hex string in human-readable formats (JSON, TOML), raw bytes otherwise
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(D::Error::custom)
        } else {
            <[u8; DIGEST_LEN]>::deserialize(deserializer).map(Self)
        }
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> Digest {
    let hash = blake3::hash(data);
    Digest::from_bytes(*hash.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        let data = b"hello world";
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn test_hex_encoding_roundtrip() {
        let original = Digest::from_bytes([42; 32]);
        let decoded = Digest::from_hex(&original.to_hex()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_hex_encoding_lowercase() {
        let pattern = [0xde, 0xad, 0xbe, 0xef];
        let mut bytes = [0u8; 32];
        for (i, &byte) in pattern.iter().cycle().take(32).enumerate() {
            bytes[i] = byte;
        }
        let hex = Digest::from_bytes(bytes).to_hex();
        assert!(hex.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("deadbeef"));
    }

    #[test]
    fn test_hex_decoding_invalid_length() {
        assert!(Digest::from_hex("abc").is_err());
        assert!(Digest::from_hex("").is_err());
        assert!(Digest::from_hex(&"a".repeat(63)).is_err());
        // The tombstone sentinel is never a digest
        assert!(Digest::from_hex("0").is_err());
    }

    #[test]
    fn test_hex_decoding_invalid_chars() {
        assert!(Digest::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn test_byte_order_matches_hex_order() {
        let a = hash_bytes(b"alpha");
        let b = hash_bytes(b"beta");
        assert_eq!(a.cmp(&b), a.to_hex().cmp(&b.to_hex()));
    }

    #[test]
    fn test_json_uses_hex() {
        let digest = hash_bytes(b"block");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));
        assert_eq!(serde_json::from_str::<Digest>(&json).unwrap(), digest);
        assert!(serde_json::from_str::<Digest>("\"0\"").is_err());
    }

    #[test]
    fn test_bincode_stays_raw() {
        let digest = hash_bytes(b"block");
        let encoded = bincode::serialize(&digest).unwrap();
        assert_eq!(encoded.len(), DIGEST_LEN);
        assert_eq!(bincode::deserialize::<Digest>(&encoded).unwrap(), digest);
    }

    #[test]
    fn test_different_data_different_hash() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }
}
