//! Common error types for coopledger.

use thiserror::Error;

/// Top-level error type for coopledger operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed record or user input, rejected before anything is persisted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A sync was requested without a complete remote configuration.
    #[error("Remote sync is not configured: {0}")]
    ConfigMissing(String),

    /// Pushing to the remote table failed (network, HTTP or payload level).
    #[error("Sync error: {0}")]
    Sync(String),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
