use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{SchemaStore, StoreError, SubmissionLedger};
use crate::registration::domain::{LedgerEntry, LedgerSnapshot, Schema};

pub const SCHEMA_FILE: &str = "form_definition.json";
pub const LEDGER_FILE: &str = "submissions.json";
pub const LOCK_FILE: &str = ".quota-form.lock";

/// Schema and ledger as two pretty-printed JSON files in one directory.
///
/// Every write goes to a sibling temp file that is synced and then renamed over the
/// target, so a reader sees either the previous or the new document.
///
/// The directory also holds [`LOCK_FILE`]. A service built on this store takes an
/// exclusive advisory lock on it for each commit, so separate processes sharing the
/// directory are serialized as well.
///
/// `append` rewrites the whole ledger, so total write cost grows quadratically with the
/// number of submissions. Suited to events with at most a few thousand registrations.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Arc<File>,
}

impl JsonFileStore {
    /// Use `dir`, creating it and its lock file if needed. Missing documents read as empty.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| io_unavailable(&dir, err))?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| io_unavailable(&lock_path, err))?;

        Ok(Self {
            dir,
            lock: Arc::new(lock),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn schema_path(&self) -> PathBuf {
        self.dir.join(SCHEMA_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }
}

fn io_unavailable(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_unavailable(path, err)),
    };

    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let encoded = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Corrupt {
        path: path.display().to_string(),
        source,
    })?;

    let tmp_path = temp_path(path);
    let mut tmp = File::create(&tmp_path).map_err(|err| io_unavailable(&tmp_path, err))?;
    tmp.write_all(&encoded)
        .and_then(|_| tmp.sync_all())
        .map_err(|err| io_unavailable(&tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| io_unavailable(path, err))?;

    // The rename has landed; the new document is what readers see from here on.
    if let Some(parent) = path.parent() {
        if let Err(err) = sync_directory(parent) {
            warn!(path = %parent.display(), error = %err, "directory sync failed after rename");
        }
    }

    debug!(path = %path.display(), bytes = encoded.len(), "wrote json document");
    Ok(())
}

/// Per-process temp name, so two writers never share one.
fn temp_path(path: &Path) -> PathBuf {
    path.with_extension(format!("json.{}.tmp", std::process::id()))
}

#[cfg(unix)]
fn sync_directory(path: &Path) -> std::io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl SchemaStore for JsonFileStore {
    fn read(&self) -> Result<Option<Schema>, StoreError> {
        read_json(&self.schema_path())
    }

    fn write(&self, schema: Schema) -> Result<(), StoreError> {
        write_json(&self.schema_path(), &schema)
    }

    fn commit_lock(&self) -> Option<Arc<File>> {
        Some(Arc::clone(&self.lock))
    }
}

impl SubmissionLedger for JsonFileStore {
    fn read(&self) -> Result<LedgerSnapshot, StoreError> {
        Ok(read_json(&self.ledger_path())?.unwrap_or_default())
    }

    fn append(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let mut snapshot: LedgerSnapshot = read_json(&self.ledger_path())?.unwrap_or_default();
        snapshot.entries.push(entry);
        write_json(&self.ledger_path(), &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::domain::{FormOption, OptionId, Question};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn schema() -> Schema {
        Schema {
            version: 2,
            next_option_id: 7,
            questions: vec![Question {
                prompt: "你想报名哪个城市？".to_string(),
                options: vec![
                    FormOption {
                        id: OptionId(5),
                        text: "北京".to_string(),
                        quota: 10,
                    },
                    FormOption {
                        id: OptionId(6),
                        text: "上海".to_string(),
                        quota: 5,
                    },
                ],
            }],
        }
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path().join("nested")).expect("store opens");

        assert!(SchemaStore::read(&store).expect("read").is_none());
        assert!(SubmissionLedger::read(&store).expect("read").is_empty());
        assert!(store.dir().is_dir());
    }

    #[test]
    fn schema_round_trips_unicode_text() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path()).expect("store opens");

        SchemaStore::write(&store, schema()).expect("write succeeds");

        let loaded = SchemaStore::read(&store).expect("read").expect("present");
        assert_eq!(loaded, schema());
        let raw = fs::read_to_string(store.schema_path()).expect("file exists");
        assert!(raw.contains("北京"));
        assert!(!temp_path(&store.schema_path()).exists());
    }

    #[test]
    fn ledger_appends_accumulate_in_order() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path()).expect("store opens");
        let accepted_at = Utc.with_ymd_and_hms(2025, 7, 9, 20, 0, 0).unwrap();

        for id in [5, 6, 5] {
            store
                .append(LedgerEntry {
                    schema_version: 2,
                    choices: vec![OptionId(id)],
                    accepted_at,
                })
                .expect("append succeeds");
        }

        let reopened = JsonFileStore::open(dir.path()).expect("store opens");
        let snapshot = SubmissionLedger::read(&reopened).expect("read");
        let ids: Vec<u64> = snapshot
            .entries
            .iter()
            .map(|entry| entry.choices[0].0)
            .collect();
        assert_eq!(ids, vec![5, 6, 5]);
        assert_eq!(snapshot.entries[0].accepted_at, accepted_at);
        assert_eq!(snapshot.consumed(OptionId(5)), 2);
    }

    #[test]
    fn corrupt_files_are_reported() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path()).expect("store opens");
        fs::write(store.ledger_path(), b"[{\"schema_version\": ").expect("write garbage");

        match SubmissionLedger::read(&store) {
            Err(err @ StoreError::Corrupt { .. }) => assert!(!err.is_transient()),
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }

    #[test]
    fn failed_write_leaves_the_previous_document() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path()).expect("store opens");
        SchemaStore::write(&store, schema()).expect("first write");

        // A directory squatting on the temp name makes the next write fail before rename.
        fs::create_dir(temp_path(&store.schema_path())).expect("block temp path");
        let mut next = schema();
        next.version = 3;
        match SchemaStore::write(&store, next) {
            Err(err @ StoreError::Unavailable(_)) => assert!(err.is_transient()),
            other => panic!("expected unavailable, got {other:?}"),
        }

        let loaded = SchemaStore::read(&store).expect("read").expect("present");
        assert_eq!(loaded, schema());
    }

    #[test]
    fn interrupted_write_leftovers_are_ignored() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path()).expect("store opens");
        let entry = LedgerEntry {
            schema_version: 2,
            choices: vec![OptionId(5)],
            accepted_at: Utc.with_ymd_and_hms(2025, 7, 9, 20, 0, 0).unwrap(),
        };
        store.append(entry.clone()).expect("append succeeds");

        fs::write(temp_path(&store.ledger_path()), b"[{\"schema_ver")
            .expect("half-written temp");

        assert_eq!(
            SubmissionLedger::read(&store).expect("read").entries,
            vec![entry.clone()]
        );
        store.append(entry).expect("append succeeds");
        assert_eq!(SubmissionLedger::read(&store).expect("read").len(), 2);
        assert!(!temp_path(&store.ledger_path()).exists());
    }

    #[test]
    fn clones_share_one_commit_lock() {
        let dir = TempDir::new().expect("temp dir");
        let store = JsonFileStore::open(dir.path()).expect("store opens");
        let clone = store.clone();

        let first = store.commit_lock().expect("file store has a lock");
        let second = clone.commit_lock().expect("file store has a lock");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(dir.path().join(LOCK_FILE).exists());
    }
}
