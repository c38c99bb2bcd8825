use std::sync::{Arc, Mutex, MutexGuard};

use super::{SchemaStore, StoreError, SubmissionLedger};
use crate::registration::domain::{LedgerEntry, LedgerSnapshot, Schema};

/// Process-local stores. Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    schema: Arc<Mutex<Option<Schema>>>,
    ledger: Arc<Mutex<Vec<LedgerEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable(format!("{what} mutex poisoned")))
}

impl SchemaStore for InMemoryStore {
    fn read(&self) -> Result<Option<Schema>, StoreError> {
        Ok(lock(&self.schema, "schema")?.clone())
    }

    fn write(&self, schema: Schema) -> Result<(), StoreError> {
        *lock(&self.schema, "schema")? = Some(schema);
        Ok(())
    }
}

impl SubmissionLedger for InMemoryStore {
    fn read(&self) -> Result<LedgerSnapshot, StoreError> {
        let entries = lock(&self.ledger, "ledger")?.clone();
        Ok(LedgerSnapshot { entries })
    }

    fn append(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        lock(&self.ledger, "ledger")?.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::domain::OptionId;
    use chrono::Utc;

    #[test]
    fn clones_share_state() {
        let store = InMemoryStore::new();
        let other = store.clone();

        SchemaStore::write(
            &store,
            Schema {
                version: 1,
                ..Schema::default()
            },
        )
        .expect("write succeeds");
        other
            .append(LedgerEntry {
                schema_version: 1,
                choices: vec![OptionId(0)],
                accepted_at: Utc::now(),
            })
            .expect("append succeeds");

        let schema = SchemaStore::read(&other).expect("read succeeds");
        assert_eq!(schema.map(|schema| schema.version), Some(1));
        assert_eq!(SubmissionLedger::read(&store).expect("read").len(), 1);
    }

    #[test]
    fn starts_empty() {
        let store = InMemoryStore::new();
        assert!(SchemaStore::read(&store).expect("read").is_none());
        assert!(SubmissionLedger::read(&store).expect("read").is_empty());
    }
}
