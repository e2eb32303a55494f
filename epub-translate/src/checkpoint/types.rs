//! Checkpoint entry format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One completed chunk translation, stored as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Chunk identifier, `<document>#<start segment>`
    pub id: String,
    /// SHA-256 of the chunk's source text, lowercase hex
    pub source_sha256: String,
    /// Translated text, segments joined by the chunk separator
    pub text: String,
    /// When the translation was stored
    pub at: DateTime<Utc>,
}

impl CheckpointEntry {
    /// Create an entry stamped with the current time.
    pub fn new(id: &str, source: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            source_sha256: fingerprint(source),
            text: text.to_string(),
            at: Utc::now(),
        }
    }

    /// Whether this entry was made from exactly `source`.
    pub fn matches_source(&self, source: &str) -> bool {
        self.source_sha256 == fingerprint(source)
    }
}

/// SHA-256 of `text` as lowercase hex.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
