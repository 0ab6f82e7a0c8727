//! External record store: where requests come from and statuses go back to.
//!
//! The store is the only persistent state; a record's status cell is what
//! decides whether a later poll picks it up again.

mod memory;
mod sheets;

use async_trait::async_trait;
use thiserror::Error;

use crate::job::{ChangeRecord, RecordLocator, StatusUpdate};

pub use memory::MemoryRecordStore;
pub use sheets::{column_letter, SheetsRecordStore};

/// Errors from a record store backend.
#[derive(Debug, Clone, Error)]
pub enum RecordStoreError {
    /// Request never got a response.
    #[error("Request failed: {0}")]
    Request(String),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Backend answered with an error status.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Response body could not be understood.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// No record behind this locator.
    #[error("No record at {0}")]
    NotFound(RecordLocator),

    /// Backend is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not obtain a credential for the backend.
    #[error("Authorization failed: {0}")]
    Auth(String),
}

/// Source of change requests and sink for their statuses.
///
/// Shared by every worker; implementations must tolerate concurrent
/// `write_status` calls for different locators.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// All records, in store order. Fully blank rows may be included.
    async fn fetch_all(&self) -> Result<Vec<ChangeRecord>, RecordStoreError>;

    /// Overwrite the status, timestamp and summary of one record.
    async fn write_status(
        &self,
        locator: &RecordLocator,
        update: &StatusUpdate,
    ) -> Result<(), RecordStoreError>;
}
