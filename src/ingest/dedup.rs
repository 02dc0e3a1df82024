use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Compute the SHA256 hex digest of document text content.
///
/// Hashing targets the text content, not the document record, so two files
/// with identical text dedup to one document regardless of path.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Suppresses repeat ingestion of identical document content.
///
/// Collisions are treated as "same document".
#[derive(Debug, Default)]
pub struct ContentDeduplicator {
    seen: HashSet<String>,
}

impl ContentDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records the digest on first occurrence of `content`,
    /// false on every repeat.
    pub fn admit(&mut self, content: &str) -> bool {
        self.seen.insert(content_digest(content))
    }

    /// Number of distinct contents admitted so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
