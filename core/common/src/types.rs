//! Common types used throughout coopledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Wire and storage format of a record date.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Unique identifier for a production record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new RecordId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "RecordId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a fresh client-side identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calendar day a record describes.
///
/// Always rendered as `YYYY-MM-DD`; ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordDate(NaiveDate);

impl RecordDate {
    /// Parse a `YYYY-MM-DD` string.
    ///
    /// # Errors
    /// - Returns error if the string is not a valid calendar date in that form
    pub fn parse(value: &str) -> crate::Result<Self> {
        NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
            .map(Self)
            .map_err(|e| {
                crate::Error::InvalidInput(format!(
                    "Date must be YYYY-MM-DD, got '{}': {}",
                    value, e
                ))
            })
    }

    /// Wrap an already-valid date.
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Get the underlying date.
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for RecordDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl TryFrom<String> for RecordDate {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<RecordDate> for String {
    fn from(date: RecordDate) -> Self {
        date.to_string()
    }
}

/// Identifier the remote table assigned to a pushed row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRowId(String);

impl RemoteRowId {
    /// Wrap a remote identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote API access credential that zeroizes on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessKey(String);

impl AccessKey {
    /// Create a new access key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the secret value, for placing it in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty (or whitespace only).
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "AccessKey(<empty>)")
        } else {
            write!(f, "AccessKey([REDACTED])")
        }
    }
}
