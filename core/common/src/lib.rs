//! Common utilities and types shared across coopledger crates.
//!
//! This module provides the error taxonomy and the identifier newtypes that
//! the record store, the storage backends and the sync coordinator agree on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AccessKey, RecordDate, RecordId, RemoteRowId};
