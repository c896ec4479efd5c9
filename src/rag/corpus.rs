//! The set of documents currently represented in the vector index.
//!
//! Entries are only ever appended, and only after every chunk of the
//! document has been upserted. The fingerprint covers names *and* content
//! digests, so re-uploading an edited file under the same name still changes
//! every answer-cache key.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One successfully indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub name: String,
    /// SHA-256 hex digest of the document's raw text.
    pub digest: String,
    pub chunks: usize,
}

#[derive(Debug, Default)]
pub struct CorpusState {
    entries: RwLock<Vec<CorpusEntry>>,
}

impl CorpusState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fully indexed document.
    ///
    /// Returns `false` when the exact `(name, digest)` pair is already present,
    /// in which case nothing changes.
    pub fn append(&self, entry: CorpusEntry) -> bool {
        let mut entries = self.entries.write();
        if entries
            .iter()
            .any(|e| e.name == entry.name && e.digest == entry.digest)
        {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Document names in ingestion order.
    pub fn documents(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name.clone()).collect()
    }

    pub fn entries(&self) -> Vec<CorpusEntry> {
        self.entries.read().clone()
    }

    pub fn contains(&self, name: &str, digest: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.name == name && e.digest == digest)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deterministic hash of the ordered `(name, digest)` list.
    pub fn fingerprint(&self) -> String {
        let entries = self.entries.read();
        let mut hasher = Sha256::new();
        for entry in entries.iter() {
            hasher.update(entry.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(entry.digest.as_bytes());
            hasher.update([b'\n']);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// SHA-256 hex digest of a document body.
pub fn content_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
