use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::config::StorageConfig;
use crate::registration::domain::{
    LedgerEntry, LedgerSnapshot, OptionDraft, OptionId, QuestionDraft, Schema,
};
use crate::registration::store::{InMemoryStore, SchemaStore, StoreError, SubmissionLedger};
use crate::registration::{registration_router, RegistrationService};

pub(super) fn option(text: &str, quota: i64) -> OptionDraft {
    OptionDraft {
        text: text.to_string(),
        quota,
        retain_id: None,
    }
}

pub(super) fn question(prompt: &str, options: Vec<OptionDraft>) -> QuestionDraft {
    QuestionDraft {
        prompt: prompt.to_string(),
        options,
    }
}

/// One question, one option, one seat.
pub(super) fn single_seat() -> Vec<QuestionDraft> {
    vec![question("Which city?", vec![option("Beijing", 1)])]
}

/// Two questions: city (Beijing 10, Shanghai 5) then session (Morning 2, Evening 3).
pub(super) fn city_and_session() -> Vec<QuestionDraft> {
    vec![
        question(
            "Which city?",
            vec![option("Beijing", 10), option("Shanghai", 5)],
        ),
        question(
            "Which session?",
            vec![option("Morning", 2), option("Evening", 3)],
        ),
    ]
}

pub(super) fn ids(raw: &[u64]) -> Vec<OptionId> {
    raw.iter().copied().map(OptionId).collect()
}

pub(super) type MemoryService = RegistrationService<InMemoryStore, InMemoryStore>;

pub(super) fn build_service() -> (MemoryService, InMemoryStore) {
    let store = InMemoryStore::new();
    let service = RegistrationService::new(Arc::new(store.clone()), Arc::new(store.clone()));
    (service, store)
}

pub(super) fn ledger_of(store: &InMemoryStore) -> LedgerSnapshot {
    SubmissionLedger::read(store).expect("ledger readable")
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    registration_router(Arc::new(service))
}

pub(super) fn storage_config(retries: u32) -> StorageConfig {
    StorageConfig {
        storage_retries: retries,
        ..StorageConfig::default()
    }
}

/// Schema store whose reads and writes always fail.
pub(super) struct UnavailableStore;

impl SchemaStore for UnavailableStore {
    fn read(&self) -> Result<Option<Schema>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn write(&self, _schema: Schema) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

impl SubmissionLedger for UnavailableStore {
    fn read(&self) -> Result<LedgerSnapshot, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn append(&self, _entry: LedgerEntry) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Ledger that fails the first `failures` appends, then records normally.
#[derive(Default)]
pub(super) struct FlakyLedger {
    failures: AtomicU32,
    pub(super) attempts: AtomicU32,
    entries: Mutex<Vec<LedgerEntry>>,
}

impl FlakyLedger {
    pub(super) fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub(super) fn len(&self) -> usize {
        self.entries.lock().expect("ledger mutex poisoned").len()
    }
}

impl SubmissionLedger for FlakyLedger {
    fn read(&self) -> Result<LedgerSnapshot, StoreError> {
        let entries = self.entries.lock().expect("ledger mutex poisoned").clone();
        Ok(LedgerSnapshot { entries })
    }

    fn append(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("write timed out".to_string()));
        }
        self.entries
            .lock()
            .expect("ledger mutex poisoned")
            .push(entry);
        Ok(())
    }
}

/// Ledger that records each append but reports the first `failures` of them as failed,
/// like a store whose post-commit sync errors out.
#[derive(Default)]
pub(super) struct CommitThenFailLedger {
    inner: InMemoryStore,
    failures: AtomicU32,
}

impl CommitThenFailLedger {
    pub(super) fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }
}

impl SubmissionLedger for CommitThenFailLedger {
    fn read(&self) -> Result<LedgerSnapshot, StoreError> {
        SubmissionLedger::read(&self.inner)
    }

    fn append(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.inner.append(entry)?;
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("sync failed after write".to_string()));
        }
        Ok(())
    }
}

/// Ledger whose appends stall long enough to hold the commit gate.
pub(super) struct StallingLedger {
    inner: InMemoryStore,
    stall: Duration,
    pub(super) entered: AtomicBool,
}

impl StallingLedger {
    pub(super) fn new(stall: Duration) -> Self {
        Self {
            inner: InMemoryStore::new(),
            stall,
            entered: AtomicBool::new(false),
        }
    }
}

impl SubmissionLedger for StallingLedger {
    fn read(&self) -> Result<LedgerSnapshot, StoreError> {
        SubmissionLedger::read(&self.inner)
    }

    fn append(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.entered.store(true, Ordering::SeqCst);
        thread::sleep(self.stall);
        self.inner.append(entry)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
