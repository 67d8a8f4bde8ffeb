//! Snapshot persistence
//!
//! Documents persist as JSON snapshot blobs behind a narrow key-value trait,
//! so hosts can back them with a database row, a file or a test map. Loading
//! is defensive: a blob that does not parse as a snapshot is treated as
//! legacy plain text and imported character by character, which is how
//! pre-CRDT documents migrate forward.

use crate::document::{Document, Snapshot};
use crate::error::{DocError, Result};
use log::warn;
use std::collections::HashMap;

/// Key-value store for snapshot blobs
pub trait SnapshotStore {
    fn put(&mut self, key: &str, blob: Vec<u8>) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// In-memory store for tests and ephemeral hosts
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl SnapshotStore for MemoryStore {
    fn put(&mut self, key: &str, blob: Vec<u8>) -> Result<()> {
        self.blobs.insert(key.to_string(), blob);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).cloned())
    }
}

/// Persist a document's snapshot under a key
pub fn save_document(store: &mut dyn SnapshotStore, key: &str, document: &Document) -> Result<()> {
    let blob = serde_json::to_vec(&document.snapshot())?;
    store.put(key, blob)
}

/// Load a document from a stored snapshot
///
/// Returns Ok(None) when the key holds nothing. A blob that fails to parse
/// as a snapshot (or restores into an invalid document) is imported as
/// legacy plain text instead of failing the load.
pub fn load_document(
    store: &dyn SnapshotStore,
    key: &str,
    author: &str,
) -> Result<Option<Document>> {
    let Some(blob) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_slice::<Snapshot>(&blob) {
        Ok(snapshot) => match Document::from_snapshot(snapshot, author.to_string()) {
            Ok(document) => Ok(Some(document)),
            Err(err) => {
                warn!("snapshot under {key} restores invalid ({err}); importing as plain text");
                import_plain_text(&blob, key, author).map(Some)
            }
        },
        Err(err) => {
            warn!("snapshot under {key} unreadable ({err}); importing as plain text");
            import_plain_text(&blob, key, author).map(Some)
        }
    }
}

fn import_plain_text(blob: &[u8], key: &str, author: &str) -> Result<Document> {
    let text = std::str::from_utf8(blob)
        .map_err(|_| DocError::Storage(format!("blob under {key} is not text")))?;
    Document::from_plain_text(text, author.to_string())
}
