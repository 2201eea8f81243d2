//! Pushes unsynced records to the remote table.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use coopledger_common::{RecordId, RemoteRowId, Result};
use coopledger_ledger::{Record, RecordStore, RemoteSyncConfig, RemoteTable};

/// Outcome of a bulk push.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Records found unsynced when the push started.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed records with the reason reported by the remote.
    pub failures: Vec<(RecordId, String)>,
    pub duration: Duration,
}

impl SyncReport {
    /// Whether every attempted record was pushed.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Drives pushes from the record store to a remote table.
pub struct SyncCoordinator {
    store: Arc<RecordStore>,
    remote: Arc<dyn RemoteTable>,
}

impl SyncCoordinator {
    /// Create a new coordinator.
    pub fn new(store: Arc<RecordStore>, remote: Arc<dyn RemoteTable>) -> Self {
        Self { store, remote }
    }

    /// Push a single record. Local state is not touched.
    ///
    /// # Errors
    /// - `ConfigMissing` before any remote call if credentials are absent
    /// - `Sync` for every remote failure
    pub async fn push_one(&self, record: &Record, config: &RemoteSyncConfig) -> Result<RemoteRowId> {
        config.ensure_complete()?;
        self.remote.append_row(record, config).await
    }

    /// Push every record that is unsynced right now, one at a time.
    ///
    /// Records created while the push runs are left for the next call.
    /// Successful records are marked synced; failed ones stay eligible.
    /// Each record is attempted at most once per call.
    ///
    /// # Errors
    /// - `ConfigMissing` before any remote call if credentials are absent
    /// - Storage errors while reading the snapshot or marking a record synced
    pub async fn push_all(&self, config: &RemoteSyncConfig) -> Result<SyncReport> {
        config.ensure_complete()?;

        let start = Instant::now();
        let snapshot = self.store.unsynced_records().await?;
        let mut report = SyncReport {
            attempted: snapshot.len(),
            ..SyncReport::default()
        };

        if snapshot.is_empty() {
            info!("No unsynced records");
            return Ok(report);
        }
        info!(
            "Pushing {} unsynced records to {}",
            snapshot.len(),
            self.remote.name()
        );

        for record in &snapshot {
            match self.remote.append_row(record, config).await {
                Ok(_) => {
                    self.store.mark_synced(record.id()).await?;
                    report.succeeded += 1;
                }
                Err(e) => {
                    error!("Failed to push record {} ({}): {}", record.id(), record.date(), e);
                    report.failed += 1;
                    report.failures.push((record.id().clone(), e.to_string()));
                }
            }
        }

        report.duration = start.elapsed();
        info!(
            "Sync finished: {} succeeded, {} failed in {:?}",
            report.succeeded, report.failed, report.duration
        );
        Ok(report)
    }

    /// Push every unsynced record using the stored configuration.
    pub async fn push_pending(&self) -> Result<SyncReport> {
        let config = self.store.remote_config().await?;
        self.push_all(&config).await
    }
}
