//! Persistence seams for the form definition and the submission ledger.
//!
//! Both stores hand out whole snapshots and mutate through a single call, so readers
//! never observe a half-applied write.

mod file;
mod memory;

pub use file::{JsonFileStore, LEDGER_FILE, LOCK_FILE, SCHEMA_FILE};
pub use memory::InMemoryStore;

use std::fs::File;
use std::sync::Arc;

use super::domain::{LedgerEntry, LedgerSnapshot, Schema};

/// Holds the current form definition.
pub trait SchemaStore: Send + Sync {
    /// `None` until the first save.
    fn read(&self) -> Result<Option<Schema>, StoreError>;
    fn write(&self, schema: Schema) -> Result<(), StoreError>;

    /// File to lock exclusively around each commit when other processes may share the
    /// storage. `None` for process-local stores.
    fn commit_lock(&self) -> Option<Arc<File>> {
        None
    }
}

/// Append-only record of accepted submissions.
pub trait SubmissionLedger: Send + Sync {
    fn read(&self) -> Result<LedgerSnapshot, StoreError>;
    /// Record one entry in full or not at all.
    fn append(&self, entry: LedgerEntry) -> Result<(), StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored data at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether trying the same call again may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
