//! # relay-audit
//!
//! Append-only record of ingest attempts for operational and security
//! review.
//!
//! ## Overview
//!
//! Every ingest call, batch or single, produces exactly one
//! [`AuditRecord`](relay_contracts::audit::AuditRecord): who sent it, how it
//! authenticated, how many envelopes were received, accepted and rejected,
//! and a small sample of rejection reasons.  The audit log is independent of
//! the ledger; nothing in validation ever reads it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_audit::FileAuditLog;
//! use relay_ledger::IngestService;
//!
//! let audit = FileAuditLog::new(&storage);
//! let service = IngestService::new(store, Box::new(audit));
//! ```

pub mod file;
pub mod memory;

pub use file::FileAuditLog;
pub use memory::MemoryAuditLog;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tempfile::TempDir;
    use uuid::Uuid;

    use relay_config::StorageContext;
    use relay_contracts::{audit::AuditRecord, ingest::AuthOutcome};
    use relay_core::traits::AuditSink;

    use super::{FileAuditLog, MemoryAuditLog};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_record(accepted: usize, reasons: &[&str]) -> AuditRecord {
        AuditRecord {
            request_id: Uuid::new_v4(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            source_addr: "192.168.1.20:40112".to_string(),
            node_id: Some("laptop-001".to_string()),
            auth: AuthOutcome::Authenticated,
            received: accepted + reasons.len(),
            accepted,
            rejected: reasons.len(),
            rejection_sample: reasons.iter().map(|r| r.to_string()).collect(),
            payload_size: 2048,
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Records come back in the order they were written, field for field.
    #[test]
    fn test_file_log_round_trip() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(&StorageContext::new(dir.path()));

        let first = make_record(5, &[]);
        let second = make_record(0, &["replay", "skipped"]);
        log.record(&first).unwrap();
        log.record(&second).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records, vec![first, second]);
    }

    /// Each line is a single JSON object with sorted keys.
    #[test]
    fn test_lines_have_sorted_keys() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(&StorageContext::new(dir.path()));
        log.record(&make_record(1, &["bad hash"])).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert!(text.ends_with('\n'));
        let line = text.lines().next().unwrap();
        assert!(line.starts_with("{\"accepted\":1,\"auth\":\"authenticated\""));
        assert!(line.ends_with("\"timestamp\":\"2024-05-01T12:00:00.000000Z\"}"));

        let value: Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["rejection_sample"][0], "bad hash");
    }

    /// `read_recent` returns only the newest records, oldest first.
    #[test]
    fn test_read_recent() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(&StorageContext::new(dir.path()));
        for accepted in 0..6 {
            log.record(&make_record(accepted, &[])).unwrap();
        }

        let recent: Vec<usize> = log.read_recent(3).unwrap().iter().map(|r| r.accepted).collect();
        assert_eq!(recent, vec![3, 4, 5]);
        assert_eq!(log.read_recent(100).unwrap().len(), 6);
    }

    /// An absent log file reads as empty rather than failing.
    #[test]
    fn test_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = FileAuditLog::new(&StorageContext::new(dir.path()));
        assert!(log.read_all().unwrap().is_empty());
    }

    /// Concurrent writers never interleave partial lines.
    #[test]
    fn test_concurrent_appends_stay_line_atomic() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(FileAuditLog::new(&StorageContext::new(dir.path())));

        std::thread::scope(|scope| {
            for t in 0..8 {
                let log = Arc::clone(&log);
                scope.spawn(move || {
                    for i in 0..25 {
                        let reason = format!("thread {t} record {i}");
                        log.record(&make_record(i, &[reason.as_str()])).unwrap();
                    }
                });
            }
        });

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 200, "every record must parse as a whole line");
    }

    /// The in-memory log shares records between clones.
    #[test]
    fn test_memory_log_shares_records() {
        let log = MemoryAuditLog::new();
        let handle = log.clone();
        log.record(&make_record(2, &[])).unwrap();
        log.record(&make_record(0, &["chain broken"])).unwrap();

        let records = handle.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].rejection_sample, vec!["chain broken".to_string()]);
    }
}
