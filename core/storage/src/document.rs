//! Document store trait definition.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use coopledger_common::{Error, Result};

/// Name of a persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    /// The production record collection.
    Records,
    /// The user/credential collection.
    Users,
    /// The current-session marker.
    Session,
    /// The remote sync configuration object.
    RemoteConfig,
}

impl DocumentKey {
    /// All documents, in a fixed order.
    pub const ALL: [DocumentKey; 4] = [
        DocumentKey::Records,
        DocumentKey::Users,
        DocumentKey::Session,
        DocumentKey::RemoteConfig,
    ];

    /// Stable name used by backends to address the document.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKey::Records => "records",
            DocumentKey::Users => "users",
            DocumentKey::Session => "session",
            DocumentKey::RemoteConfig => "remote_sync",
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage port for whole-document persistence.
///
/// Implementations must make `write` replace the previous content entirely;
/// a reader never observes a mix of old and new content.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get the backend name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Read a document.
    ///
    /// # Returns
    /// - `Ok(None)` if the document has never been written (or was removed)
    ///
    /// # Errors
    /// - Backend unavailable
    async fn read(&self, key: DocumentKey) -> Result<Option<Vec<u8>>>;

    /// Replace a document with `data`.
    ///
    /// # Postconditions
    /// - A subsequent `read` returns exactly `data`
    ///
    /// # Errors
    /// - Backend unavailable or not writable
    async fn write(&self, key: DocumentKey, data: Vec<u8>) -> Result<()>;

    /// Remove a document. Removing an absent document is not an error.
    async fn remove(&self, key: DocumentKey) -> Result<()>;
}

/// JSON helpers over any document store.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Read and deserialize a document.
    ///
    /// # Errors
    /// - `Serialization` if the stored bytes are not valid JSON for `T`
    async fn read_json<T: DeserializeOwned + Send>(&self, key: DocumentKey) -> Result<Option<T>> {
        match self.read(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                Error::Serialization(format!("Document '{}' is malformed: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    /// Serialize and write a document.
    async fn write_json<T: Serialize + Sync>(&self, key: DocumentKey, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write(key, bytes).await
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_names_are_distinct() {
        let mut names: Vec<&str> = DocumentKey::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DocumentKey::ALL.len());
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(DocumentKey::RemoteConfig.to_string(), "remote_sync");
    }
}
