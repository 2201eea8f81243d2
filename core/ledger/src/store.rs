//! Durable record collection.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use coopledger_common::{RecordId, RemoteRowId, Result};
use coopledger_storage::{DocumentKey, DocumentStore, DocumentStoreExt};

use crate::config::RemoteSyncConfig;
use crate::record::{insert_newest_first, sort_newest_first, Record, RecordInput};
use crate::remote::RemoteTable;

/// What happened to the remote push attempted during creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// No push was attempted (disabled, incomplete credentials or no remote attached).
    Skipped,
    /// The push succeeded and the record is marked synced.
    Synced(RemoteRowId),
    /// The push failed; the record stays unsynced for a later bulk retry.
    Failed(String),
}

/// Result of creating a record: always stored, possibly also synced.
#[derive(Debug, Clone)]
pub struct Created {
    /// The record as persisted locally.
    pub record: Record,
    /// Outcome of the automatic push.
    pub remote: RemoteOutcome,
}

impl Created {
    /// Whether the record reached the remote table.
    pub fn is_synced(&self) -> bool {
        matches!(self.remote, RemoteOutcome::Synced(_))
    }
}

/// Record store over a document backend.
///
/// All mutations of the record collection go through one lock so that
/// read-modify-write cycles never interleave.
pub struct RecordStore {
    documents: Arc<dyn DocumentStore>,
    remote: Option<Arc<dyn RemoteTable>>,
    write_lock: Mutex<()>,
}

impl RecordStore {
    /// Create a store without a remote table; creation never pushes.
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            remote: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Attach the remote table used for automatic pushes on creation.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteTable>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Get the document backend.
    pub fn documents(&self) -> Arc<dyn DocumentStore> {
        self.documents.clone()
    }

    /// All records, most recent date first.
    ///
    /// Records sharing a date keep their stored order.
    pub async fn list_records(&self) -> Result<Vec<Record>> {
        let mut records = self.load().await?;
        sort_newest_first(&mut records);
        Ok(records)
    }

    /// Look up a single record.
    pub async fn get_record(&self, id: &RecordId) -> Result<Option<Record>> {
        let records = self.load().await?;
        Ok(records.into_iter().find(|r| r.id() == id))
    }

    /// Records whose push has never succeeded, most recent first.
    pub async fn unsynced_records(&self) -> Result<Vec<Record>> {
        let records = self.list_records().await?;
        Ok(records.into_iter().filter(|r| !r.is_synced()).collect())
    }

    /// Number of records waiting for a push.
    pub async fn pending_count(&self) -> Result<usize> {
        let records = self.load().await?;
        Ok(records.iter().filter(|r| !r.is_synced()).count())
    }

    /// Create a record, persist it, then attempt one remote push.
    ///
    /// # Postconditions
    /// - The record is persisted before any remote call is made
    /// - A remote failure never fails this call; it is reported as
    ///   `RemoteOutcome::Failed` and the record stays unsynced
    ///
    /// # Errors
    /// - `InvalidInput` if the input is rejected (nothing is persisted)
    /// - Storage errors from the local backend
    pub async fn create_record(&self, input: RecordInput) -> Result<Created> {
        let mut record = Record::from_input(RecordId::generate(), input)?;
        let config = self.remote_config().await?;

        {
            let _guard = self.write_lock.lock().await;
            let mut records = self.load().await?;
            sort_newest_first(&mut records);
            insert_newest_first(&mut records, record.clone());
            self.save(&records).await?;
        }
        info!("Stored record {} for {}", record.id(), record.date());

        if !config.should_auto_push() {
            return Ok(Created {
                record,
                remote: RemoteOutcome::Skipped,
            });
        }
        let Some(remote) = self.remote.as_ref() else {
            debug!("Auto-push enabled but no remote table attached");
            return Ok(Created {
                record,
                remote: RemoteOutcome::Skipped,
            });
        };

        let outcome = match remote.append_row(&record, &config).await {
            Ok(row_id) => {
                self.mark_synced(record.id()).await?;
                record.mark_synced();
                debug!("Record {} pushed as remote row {}", record.id(), row_id);
                RemoteOutcome::Synced(row_id)
            }
            Err(e) => {
                warn!("Push of record {} to {} failed: {}", record.id(), remote.name(), e);
                RemoteOutcome::Failed(e.to_string())
            }
        };

        Ok(Created {
            record,
            remote: outcome,
        })
    }

    /// Remove a record by id.
    ///
    /// # Returns
    /// - `true` if a record was removed, `false` if the id was absent
    pub async fn delete_record(&self, id: &RecordId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.id() != id);

        if records.len() == before {
            return Ok(false);
        }
        self.save(&records).await?;
        info!("Deleted record {}", id);
        Ok(true)
    }

    /// Set the sync flag of a record. Idempotent; unknown ids are ignored.
    pub async fn mark_synced(&self, id: &RecordId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;

        let Some(record) = records.iter_mut().find(|r| r.id() == id) else {
            debug!("mark_synced: record {} not found", id);
            return Ok(());
        };
        if record.is_synced() {
            return Ok(());
        }
        record.mark_synced();
        self.save(&records).await
    }

    /// Read the remote sync configuration, or the defaults if none is stored.
    pub async fn remote_config(&self) -> Result<RemoteSyncConfig> {
        Ok(self
            .documents
            .read_json::<RemoteSyncConfig>(DocumentKey::RemoteConfig)
            .await?
            .unwrap_or_default())
    }

    /// Replace the remote sync configuration.
    pub async fn set_remote_config(&self, config: &RemoteSyncConfig) -> Result<()> {
        self.documents
            .write_json(DocumentKey::RemoteConfig, config)
            .await?;
        info!(
            "Remote sync config saved (table '{}', enabled: {})",
            config.table_name, config.enabled
        );
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Record>> {
        Ok(self
            .documents
            .read_json::<Vec<Record>>(DocumentKey::Records)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, records: &[Record]) -> Result<()> {
        self.documents.write_json(DocumentKey::Records, &records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_input;
    use async_trait::async_trait;
    use coopledger_common::{AccessKey, Error};
    use coopledger_storage::MemoryDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Remote that succeeds or fails on demand and counts calls.
    struct ScriptedRemote {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedRemote {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RemoteTable for ScriptedRemote {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn append_row(&self, record: &Record, _config: &RemoteSyncConfig) -> Result<RemoteRowId> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Sync("HTTP 500".to_string()))
            } else {
                Ok(RemoteRowId::new(format!("row-{}", record.id())))
            }
        }
    }

    fn complete_config() -> RemoteSyncConfig {
        RemoteSyncConfig::new("app-1", AccessKey::new("secret"), "Records")
    }

    #[tokio::test]
    async fn test_create_without_config() {
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new()));

        let created = store.create_record(sample_input("2024-05-01")).await.unwrap();

        assert_eq!(created.remote, RemoteOutcome::Skipped);
        assert!((created.record.total_feed() - 3.5).abs() < 1e-9);
        assert!((created.record.posture_rate() - 90.0).abs() < 1e-9);
        assert!(!created.record.is_synced());
        assert_eq!(store.list_records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_persists_nothing() {
        let docs = MemoryDocumentStore::new();
        let store = RecordStore::new(Arc::new(docs.clone()));
        let mut input = sample_input("2024-05-01");
        input.bird_count = 0;

        let result = store.create_record(input).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.list_records().await.unwrap().is_empty());
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_create_pushes_once_and_marks_synced() {
        let remote = ScriptedRemote::new(false);
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new())).with_remote(remote.clone());
        store.set_remote_config(&complete_config()).await.unwrap();

        let created = store.create_record(sample_input("2024-05-01")).await.unwrap();

        assert!(created.is_synced());
        assert!(created.record.is_synced());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        let stored = store.get_record(created.record.id()).await.unwrap().unwrap();
        assert!(stored.is_synced());
        assert_eq!(stored.derived(), created.record.derived());
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_record() {
        let remote = ScriptedRemote::new(true);
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new())).with_remote(remote.clone());
        store.set_remote_config(&complete_config()).await.unwrap();

        let created = store.create_record(sample_input("2024-05-01")).await.unwrap();

        assert!(matches!(created.remote, RemoteOutcome::Failed(_)));
        assert!(!created.record.is_synced());
        assert_eq!(store.pending_count().await.unwrap(), 1);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_config_skips_push() {
        let remote = ScriptedRemote::new(false);
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new())).with_remote(remote.clone());
        let mut config = complete_config();
        config.enabled = false;
        store.set_remote_config(&config).await.unwrap();

        let created = store.create_record(sample_input("2024-05-01")).await.unwrap();

        assert_eq!(created.remote, RemoteOutcome::Skipped);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_incomplete_credentials_skip_push() {
        let remote = ScriptedRemote::new(false);
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new())).with_remote(remote.clone());
        store
            .set_remote_config(&RemoteSyncConfig::new("app-1", AccessKey::default(), "Records"))
            .await
            .unwrap();

        let created = store.create_record(sample_input("2024-05-01")).await.unwrap();

        assert_eq!(created.remote, RemoteOutcome::Skipped);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let docs = MemoryDocumentStore::new();
        let store = RecordStore::new(Arc::new(docs.clone()));
        docs.set_fail_writes(true);

        let result = store.create_record(sample_input("2024-05-01")).await;
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new()));
        for date in ["2024-03-02", "2024-03-05", "2023-12-31", "2024-03-03"] {
            store.create_record(sample_input(date)).await.unwrap();
        }

        let dates: Vec<String> = store
            .list_records()
            .await
            .unwrap()
            .iter()
            .map(|r| r.date().to_string())
            .collect();
        assert_eq!(dates, vec!["2024-03-05", "2024-03-03", "2024-03-02", "2023-12-31"]);
    }

    #[tokio::test]
    async fn test_list_sorts_unsorted_documents() {
        let docs = MemoryDocumentStore::new();
        let store = RecordStore::new(Arc::new(docs.clone()));
        store.create_record(sample_input("2024-01-01")).await.unwrap();
        store.create_record(sample_input("2024-01-09")).await.unwrap();

        // Reverse the stored order behind the store's back
        let mut raw: Vec<Record> = docs.read_json(DocumentKey::Records).await.unwrap().unwrap();
        raw.reverse();
        docs.write_json(DocumentKey::Records, &raw).await.unwrap();

        let listed = store.list_records().await.unwrap();
        assert_eq!(listed[0].date().to_string(), "2024-01-09");
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new()));
        let kept = store.create_record(sample_input("2024-01-01")).await.unwrap().record;
        let gone = store.create_record(sample_input("2024-01-02")).await.unwrap().record;

        assert!(store.delete_record(gone.id()).await.unwrap());
        assert!(!store.delete_record(gone.id()).await.unwrap());

        let remaining = store.list_records().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), kept.id());
    }

    #[tokio::test]
    async fn test_mark_synced_is_idempotent() {
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new()));
        let record = store.create_record(sample_input("2024-01-01")).await.unwrap().record;

        store.mark_synced(record.id()).await.unwrap();
        let once = store.list_records().await.unwrap();
        store.mark_synced(record.id()).await.unwrap();
        let twice = store.list_records().await.unwrap();

        assert_eq!(once, twice);
        assert!(twice[0].is_synced());
    }

    #[tokio::test]
    async fn test_mark_synced_unknown_id_is_noop() {
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new()));
        store.create_record(sample_input("2024-01-01")).await.unwrap();

        store
            .mark_synced(&RecordId::new("missing").unwrap())
            .await
            .unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remote_config_round_trip() {
        let store = RecordStore::new(Arc::new(MemoryDocumentStore::new()));
        assert_eq!(store.remote_config().await.unwrap(), RemoteSyncConfig::default());

        store.set_remote_config(&complete_config()).await.unwrap();
        assert_eq!(store.remote_config().await.unwrap(), complete_config());
    }
}
