//! In-memory document store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::document::{DocumentKey, DocumentStore};
use coopledger_common::{Error, Result};

/// In-memory document store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<HashMap<DocumentKey, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write`/`remove` fail with a storage error.
    ///
    /// Lets tests exercise the "storage unavailable" path.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of documents currently held.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    /// Check if no document has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self, key: DocumentKey) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!(
                "Memory store is not writable (document '{}')",
                key
            )));
        }
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::Storage("Memory store lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, key: DocumentKey) -> Result<Option<Vec<u8>>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.get(&key).cloned())
    }

    async fn write(&self, key: DocumentKey, data: Vec<u8>) -> Result<()> {
        self.check_writable(key)?;
        self.documents
            .write()
            .map_err(|_| poisoned())?
            .insert(key, data);
        Ok(())
    }

    async fn remove(&self, key: DocumentKey) -> Result<()> {
        self.check_writable(key)?;
        self.documents.write().map_err(|_| poisoned())?.remove(&key);
        Ok(())
    }
}
