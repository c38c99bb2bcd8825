use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::availability::AvailabilityView;
use super::domain::{Confirmation, LedgerEntry, OptionId, QuestionDraft, Schema};
use super::engine::{self, RejectionReason};
use super::gate::{CommitGate, ContentionPolicy, GateTimeout};
use super::schema::{prepare_schema, SchemaValidationError};
use super::store::{SchemaStore, StoreError, SubmissionLedger};
use crate::config::StorageConfig;

/// Service composing the schema store, submission ledger, and allocation rules behind one
/// commit gate.
pub struct RegistrationService<S, L> {
    schemas: Arc<S>,
    ledger: Arc<L>,
    gate: CommitGate,
    storage_retries: u32,
}

impl<S, L> RegistrationService<S, L>
where
    S: SchemaStore + 'static,
    L: SubmissionLedger + 'static,
{
    pub fn new(schemas: Arc<S>, ledger: Arc<L>) -> Self {
        Self::with_settings(schemas, ledger, &StorageConfig::default())
    }

    /// When the schema store exposes a commit lock file, the gate holds that lock too.
    pub fn with_settings(schemas: Arc<S>, ledger: Arc<L>, settings: &StorageConfig) -> Self {
        let policy = ContentionPolicy::with_timeout(settings.lock_timeout);
        let gate = match schemas.commit_lock() {
            Some(file) => CommitGate::with_lock_file(policy, file),
            None => CommitGate::new(policy),
        };

        Self {
            schemas,
            ledger,
            gate,
            storage_retries: settings.storage_retries,
        }
    }

    /// Current form definition, or the empty default before the first save.
    pub fn get_schema(&self) -> Result<Schema, RegistrationError> {
        Ok(self.current_schema()?)
    }

    /// Validate `drafts`, assign option ids and replace the stored form in full.
    pub fn save_schema(&self, drafts: Vec<QuestionDraft>) -> Result<Schema, RegistrationError> {
        let _gate = self.gate.acquire()?;

        let current = self.current_schema()?;
        let schema = prepare_schema(&current, drafts).map_err(|err| {
            warn!(error = %err, "rejected form definition");
            err
        })?;

        self.with_retries("schema.write", || self.schemas.write(schema.clone()))?;

        info!(
            version = schema.version,
            questions = schema.questions.len(),
            options = schema.options().count(),
            "form definition saved"
        );
        Ok(schema)
    }

    /// Availability of every option, read from one consistent schema/ledger pair.
    pub fn availability(&self) -> Result<AvailabilityView, RegistrationError> {
        let (schema, ledger) = {
            let _gate = self.gate.acquire()?;
            let schema = self.current_schema()?;
            let ledger = self.with_retries("ledger.read", || self.ledger.read())?;
            (schema, ledger)
        };

        Ok(AvailabilityView::build(&schema, &ledger))
    }

    /// Admit all of `choices` or none of them.
    pub fn submit(&self, choices: Vec<OptionId>) -> Result<Confirmation, RegistrationError> {
        let _gate = self.gate.acquire()?;

        let schema = self.current_schema()?;
        let ledger = self.with_retries("ledger.read", || self.ledger.read())?;

        let entry = match engine::admit(&schema, &ledger, choices, Utc::now()) {
            Ok(entry) => entry,
            Err(reason) => {
                info!(reason = reason.code(), detail = %reason, "submission rejected");
                return Err(reason.into());
            }
        };

        self.append_entry(&entry)?;

        info!(
            schema_version = entry.schema_version,
            choices = ?entry.choices,
            "submission admitted"
        );
        Ok(entry.into())
    }

    fn current_schema(&self) -> Result<Schema, StoreError> {
        Ok(self
            .with_retries("schema.read", || self.schemas.read())?
            .unwrap_or_default())
    }

    /// Append `entry` at most once. A retry first checks whether the failed attempt had
    /// already landed, since a store may report an error after committing.
    fn append_entry(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let mut retrying = false;
        self.with_retries("ledger.append", || {
            if retrying && self.ledger.read()?.entries.contains(entry) {
                debug!("ledger append had already landed");
                return Ok(());
            }
            retrying = true;
            self.ledger.append(entry.clone())
        })
    }

    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut call: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 0;
        loop {
            match call() {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "storage call recovered");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.storage_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "retrying storage call");
                }
                Err(err) => {
                    warn!(operation, error = %err, "storage call failed");
                    return Err(err);
                }
            }
        }
    }
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Rejected(#[from] RejectionReason),
    #[error("invalid form definition: {0}")]
    SchemaValidation(#[from] SchemaValidationError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Busy(#[from] GateTimeout),
}

impl RegistrationError {
    /// Whether the same request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            RegistrationError::Storage(err) => err.is_transient(),
            RegistrationError::Busy(_) => true,
            RegistrationError::Rejected(_) | RegistrationError::SchemaValidation(_) => false,
        }
    }
}
