//! YAML file-backed audit store.
//!
//! The whole trail is one YAML sequence so that reviewers can diff it in a
//! pull request. Every append loads the sequence, pushes the new entry and
//! atomically replaces the file (temp file in the same directory, then
//! rename). Appends from one process are serialised by an async mutex; an
//! OS file lock on `<store>.lock` keeps separate processes from interleaving.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_yaml::Value;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::lock::StoreLock;
use crate::record::AuditRecord;
use crate::store::AuditStore;

/// Default time a writer waits for another process to release the store.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);

/// Audit store persisted as a single YAML document.
#[derive(Debug)]
pub struct YamlAuditLedger {
    path: PathBuf,
    lock_wait: Duration,
    writer: Mutex<()>,
}

impl YamlAuditLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_wait: DEFAULT_LOCK_WAIT,
            writer: Mutex::new(()),
        }
    }

    /// Override how long an append waits on the cross-process lock.
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Load the raw entries of the store.
///
/// Absent, empty or whitespace-only files are an empty trail. A document
/// that does not parse, or parses to anything but a sequence, is treated as
/// corrupt and reset to empty with a warning.
fn load_entries(path: &Path) -> LedgerResult<Vec<Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(LedgerError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_yaml::from_str::<Value>(&raw) {
        Ok(Value::Sequence(entries)) => Ok(entries),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other) => {
            warn!(
                path = %path.display(),
                found = yaml_kind(&other),
                "audit store is not a sequence; resetting to empty"
            );
            Ok(Vec::new())
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "audit store could not be parsed; resetting to empty"
            );
            Ok(Vec::new())
        }
    }
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

fn rewrite(path: &Path, entries: &[Value]) -> LedgerResult<()> {
    let write_err = |source: std::io::Error| LedgerError::Write {
        path: path.to_path_buf(),
        source,
    };

    let document = serde_yaml::to_string(entries)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(document.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn append_locked(path: &Path, lock_wait: Duration, entry: Value) -> LedgerResult<usize> {
    let _lock = StoreLock::acquire(&StoreLock::path_for(path), lock_wait)?;
    let mut entries = load_entries(path)?;
    entries.push(entry);
    rewrite(path, &entries)?;
    Ok(entries.len())
}

#[async_trait]
impl AuditStore for YamlAuditLedger {
    async fn append(&self, record: &AuditRecord) -> LedgerResult<()> {
        let entry = serde_yaml::to_value(record)?;

        let _guard = self.writer.lock().await;
        let path = self.path.clone();
        let lock_wait = self.lock_wait;
        let total = tokio::task::spawn_blocking(move || append_locked(&path, lock_wait, entry))
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))??;

        debug!(
            path = %self.path.display(),
            log_id = %record.log_id,
            total_entries = total,
            "audit record appended"
        );
        Ok(())
    }

    async fn records(&self) -> LedgerResult<Vec<AuditRecord>> {
        let path = self.path.clone();
        let entries = tokio::task::spawn_blocking(move || load_entries(&path))
            .await
            .map_err(|e| LedgerError::Task(e.to_string()))??;

        let records = entries
            .into_iter()
            .enumerate()
            .filter_map(
                |(index, entry)| match serde_yaml::from_value::<AuditRecord>(entry) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(index, error = %e, "skipping malformed audit entry");
                        None
                    }
                },
            )
            .collect();
        Ok(records)
    }
}
