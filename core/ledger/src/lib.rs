//! coopledger record store.
//!
//! Owns the durable collection of daily egg-production records together with
//! the user directory, the session marker and the remote sync configuration.
//! Derived metrics are computed in exactly one place, at record creation, so
//! no caller can persist a record whose derived fields disagree with its
//! inputs.

pub mod config;
pub mod record;
pub mod remote;
pub mod report;
pub mod stats;
pub mod store;
pub mod users;

pub use config::RemoteSyncConfig;
pub use record::{DerivedMetrics, Record, RecordInput};
pub use remote::RemoteTable;
pub use report::{PeriodReport, RecordFilter, ReportSummary};
pub use stats::{DashboardStats, TrendPoint};
pub use store::{Created, RecordStore, RemoteOutcome};
pub use users::{NewUser, User, UserDirectory, UserRole};
