//! In-memory implementation of `AuditSink`.
//!
//! `MemoryAuditLog` keeps records in a `Vec` behind an `Arc<Mutex<_>>`.
//! Clones share the same records, so a caller can hand one clone to an
//! `IngestService` and inspect the other.

use std::sync::{Arc, Mutex};

use relay_contracts::{
    audit::AuditRecord,
    error::{RelayError, RelayResult},
};
use relay_core::traits::AuditSink;

#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every record written so far, in append order.
    pub fn records(&self) -> RelayResult<Vec<AuditRecord>> {
        let records = self.records.lock().map_err(|e| RelayError::LockPoisoned {
            reason: format!("audit records: {e}"),
        })?;
        Ok(records.clone())
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, record: &AuditRecord) -> RelayResult<()> {
        let mut records = self.records.lock().map_err(|e| RelayError::LockPoisoned {
            reason: format!("audit records: {e}"),
        })?;
        records.push(record.clone());
        Ok(())
    }
}
