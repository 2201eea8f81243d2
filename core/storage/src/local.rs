//! Local filesystem document store.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::document::{DocumentKey, DocumentStore};
use coopledger_common::{Error, Result};

/// Local filesystem document store.
///
/// Stores each document as `<name>.json` under a root directory.
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    /// Create a new local store rooted at the given directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Root exists but is not a directory
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Sync for constructor
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        } else if !root.is_dir() {
            return Err(Error::Storage(format!(
                "Data directory is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: DocumentKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn read(&self, key: DocumentKey) -> Result<Option<Vec<u8>>> {
        match fs::read(self.document_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn write(&self, key: DocumentKey, data: Vec<u8>) -> Result<()> {
        let target = self.document_path(key);
        // Write beside the target and rename over it
        let staging = self
            .root
            .join(format!(".{}.{}.tmp", key.as_str(), Uuid::new_v4()));

        if let Err(e) = fs::write(&staging, &data).await {
            let _ = fs::remove_file(&staging).await;
            return Err(Error::Io(e));
        }
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(Error::Io(e));
        }

        debug!("Wrote document {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn remove(&self, key: DocumentKey) -> Result<()> {
        match fs::remove_file(self.document_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_write_read() {
        let temp = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(temp.path()).unwrap();
        let data = b"{\"appId\":\"x\"}".to_vec();

        store.write(DocumentKey::RemoteConfig, data.clone()).await.unwrap();
        let read = store.read(DocumentKey::RemoteConfig).await.unwrap();

        assert_eq!(read, Some(data));
        assert!(temp.path().join("remote_sync.json").exists());
    }

    #[tokio::test]
    async fn test_local_missing_document() {
        let temp = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(temp.path()).unwrap();

        assert!(store.read(DocumentKey::Records).await.unwrap().is_none());
        store.remove(DocumentKey::Records).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("data");
        let store = LocalDocumentStore::new(&root).unwrap();

        store.write(DocumentKey::Users, b"[]".to_vec()).await.unwrap();
        assert!(root.join("users.json").exists());
    }

    #[tokio::test]
    async fn test_local_overwrite_leaves_no_staging_files() {
        let temp = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(temp.path()).unwrap();

        store.write(DocumentKey::Records, b"[1]".to_vec()).await.unwrap();
        store.write(DocumentKey::Records, b"[1,2]".to_vec()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["records.json".to_string()]);
        assert_eq!(
            store.read(DocumentKey::Records).await.unwrap(),
            Some(b"[1,2]".to_vec())
        );
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();

        assert!(LocalDocumentStore::new(&file).is_err());
    }
}
