//! Content hashing for prepared media.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowercase hex SHA-256 digest of an asset's bytes.
///
/// Stored next to the asset's remote location as an integrity and dedup
/// token. Identical bytes always produce the identical hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash the full content.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(hex::encode(digest))
    }

    /// Wrap an already-computed hex digest, e.g. one read back from a draft file.
    pub fn from_hex(hex_digest: &str) -> Result<Self, anyhow::Error> {
        let normalized = hex_digest.trim().to_lowercase();
        let bytes = hex::decode(&normalized)
            .map_err(|e| anyhow::anyhow!("Invalid content hash {}: {}", hex_digest, e))?;
        if bytes.len() != 32 {
            return Err(anyhow::anyhow!(
                "Invalid content hash {}: expected 32 bytes, got {}",
                hex_digest,
                bytes.len()
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
