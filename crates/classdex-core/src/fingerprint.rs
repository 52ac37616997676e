//! Content fingerprinting for generated files
//!
//! Generated outputs are only rewritten when their content actually changes, so
//! incremental builds downstream of the analyzer see stable timestamps.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 fingerprint of a generated file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentFingerprint {
    /// Lowercase hex digest
    pub content_hash: String,
    /// Content length in bytes
    pub size: u64,
}

impl ContentFingerprint {
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self {
            content_hash: format!("{:x}", hasher.finalize()),
            size: content.len() as u64,
        }
    }

    /// Check if this fingerprint represents the same content as another
    pub fn content_matches(&self, other: &ContentFingerprint) -> bool {
        self.size == other.size && self.content_hash == other.content_hash
    }

    /// Get a short hash for display purposes
    pub fn short_hash(&self) -> String {
        self.content_hash.chars().take(12).collect()
    }
}
