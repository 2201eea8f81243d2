//! coopledger Sync Coordinator
//!
//! This module pushes production records to the remote spreadsheet-backed
//! table, including:
//! - The AppSheet-style HTTP client and its wire format
//! - Conservative response interpretation (ambiguous replies are failures)
//! - Bulk retry over every record that has never been pushed successfully

pub mod client;
pub mod coordinator;
pub mod settings;
pub mod wire;

// Re-export main types
pub use client::AppSheetClient;
pub use coordinator::{SyncCoordinator, SyncReport};
pub use settings::AppSheetSettings;
pub use wire::{interpret_response, ActionRequest, RowPayload};
