//! Seam between the record store and the remote tabular store.

use async_trait::async_trait;

use coopledger_common::{RemoteRowId, Result};

use crate::config::RemoteSyncConfig;
use crate::record::Record;

/// A remote table that records can be appended to.
///
/// Implementations perform exactly one remote write per call and never touch
/// local state; the caller decides what to do with the outcome.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Get the remote name (e.g., "appsheet").
    fn name(&self) -> &str;

    /// Append `record` as a single row of the configured table.
    ///
    /// # Preconditions
    /// - `config` has an application id and an access key
    ///
    /// # Errors
    /// - `ConfigMissing` if the precondition does not hold
    /// - `Sync` for any transport, HTTP or payload-level failure
    async fn append_row(&self, record: &Record, config: &RemoteSyncConfig) -> Result<RemoteRowId>;
}
