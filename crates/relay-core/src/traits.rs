//! Seams to the collaborators outside the relay core.
//!
//! - `EventSource`: where the exporter reads local generic events from
//! - `AuditSink`: where the ingest entry point records each attempt
//!
//! Both are implemented by sibling crates (`relay-export`, `relay-audit`)
//! and injected as trait objects, so tests can substitute in-memory versions.

use relay_contracts::{audit::AuditRecord, error::RelayResult, event::LocalEvent};

/// A store of local generic events produced by agents outside the relay.
pub trait EventSource: Send + Sync {
    /// Return up to `limit` of the most recent events, oldest first.
    fn recent_events(&self, limit: usize) -> RelayResult<Vec<LocalEvent>>;
}

/// Append-only sink for ingest audit records.
pub trait AuditSink: Send + Sync {
    /// Persist one record.  Must write it as a single complete unit so
    /// concurrent callers never interleave.
    fn record(&self, record: &AuditRecord) -> RelayResult<()>;
}
