//! File-backed audit log.
//!
//! One canonical JSON line (sorted keys) per ingest call, appended to
//! `audit/ingest_audit.jsonl` under the storage root.  A process-local mutex
//! plus a single append-mode write per record keeps concurrent ingest calls
//! from interleaving partial lines.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use relay_config::{
    files::{append_line, read_lines},
    StorageContext,
};
use relay_contracts::{
    audit::AuditRecord,
    error::{RelayError, RelayResult},
};
use relay_core::{canonicalize_serialize, traits::AuditSink};

/// Append-only audit log stored as newline-delimited JSON.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    /// Audit log at the standard location under `storage`.
    pub fn new(storage: &StorageContext) -> Self {
        Self::at_path(storage.audit_path())
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every complete record, oldest first.
    pub fn read_all(&self) -> RelayResult<Vec<AuditRecord>> {
        let read = read_lines(&self.path)?;
        if read.torn_tail.is_some() {
            warn!(path = %self.path.display(), "skipping unterminated audit tail");
        }
        read.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| {
                    RelayError::storage(&self.path, format!("corrupt audit line {}: {e}", i + 1))
                })
            })
            .collect()
    }

    /// The `limit` most recent records, oldest first.
    pub fn read_recent(&self, limit: usize) -> RelayResult<Vec<AuditRecord>> {
        let mut records = self.read_all()?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}

impl AuditSink for FileAuditLog {
    fn record(&self, record: &AuditRecord) -> RelayResult<()> {
        let line = canonicalize_serialize(record)?;
        let _guard = self.write_lock.lock().map_err(|e| RelayError::LockPoisoned {
            reason: format!("audit log: {e}"),
        })?;
        append_line(&self.path, &line)?;
        debug!(request_id = %record.request_id, "audit record written");
        Ok(())
    }
}
