//! Storage port for coopledger.
//!
//! Every piece of persisted local state (the record collection, the user
//! directory, the session marker and the remote sync configuration) is a
//! single named document that is read and written whole. This module
//! provides the trait the ledger talks to and two backends for it.
//!
//! # Design Principles
//! - Whole-document semantics: no partial updates, callers read-modify-write
//! - Backend isolation: no backend-specific logic in the ledger or sync crates
//! - Async operations: all I/O operations are async

pub mod document;
pub mod local;
pub mod memory;

pub use document::{DocumentKey, DocumentStore, DocumentStoreExt};
pub use local::LocalDocumentStore;
pub use memory::MemoryDocumentStore;
