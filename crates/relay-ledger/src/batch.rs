//! Ordered batch ingest with per-node halting.
//!
//! Envelopes are processed in the order given.  The first rejection for a
//! node halts that node for the rest of the batch: later envelopes for it
//! are counted as rejected without being validated, since they chain onto a
//! link that was just refused.  Other nodes carry on unaffected.
//!
//! An input with no usable `node_id` is a parse error.  It belongs to no
//! node, so it halts nothing.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{error, info};

use relay_contracts::{
    envelope::Envelope,
    ingest::{AppendOutcome, IngestReport, Rejection},
};

use crate::store::LedgerStore;

impl LedgerStore {
    /// Ingest raw envelope objects in order.
    ///
    /// Never fails as a whole: storage failures are recorded in
    /// `IngestReport::storage_failures` and halt only the affected node.
    pub fn ingest_batch(&self, raw_envelopes: &[Value]) -> IngestReport {
        let cap = self.max_rejection_reasons;
        let mut report = IngestReport::default();
        let mut halted: HashSet<String> = HashSet::new();

        for (index, raw) in raw_envelopes.iter().enumerate() {
            let node_id = match raw.get("node_id").and_then(Value::as_str) {
                Some(id) if !id.trim().is_empty() => id.to_string(),
                _ => {
                    let reason = if raw.is_object() {
                        "missing or empty node_id".to_string()
                    } else {
                        "envelope is not a JSON object".to_string()
                    };
                    report.reject(Rejection::Parse { index, reason }, cap);
                    continue;
                }
            };
            let seq_hint = raw.get("seq").and_then(Value::as_i64).unwrap_or(-1);

            if halted.contains(&node_id) {
                report.reject(
                    Rejection::SkippedAfterNodeFailure {
                        node_id,
                        seq: seq_hint,
                    },
                    cap,
                );
                continue;
            }

            let envelope = match Envelope::from_value(raw.clone()) {
                Ok(envelope) => envelope,
                Err(e) => {
                    halted.insert(node_id.clone());
                    report.reject(
                        Rejection::SchemaInvalid {
                            node_id,
                            seq: seq_hint,
                            errors: vec![format!("malformed envelope: {e}")],
                        },
                        cap,
                    );
                    continue;
                }
            };

            match self.append_envelope(&envelope) {
                Ok(AppendOutcome::Accepted { seq, .. }) => report.accept(seq),
                Ok(AppendOutcome::Rejected(rejection)) => {
                    halted.insert(node_id);
                    report.reject(rejection, cap);
                }
                Err(e) => {
                    error!(node_id = %node_id, seq = envelope.seq, error = %e, "storage failure during ingest");
                    halted.insert(node_id.clone());
                    report.storage_failures.push(e.to_string());
                    report.reject(
                        Rejection::Storage {
                            node_id,
                            seq: envelope.seq,
                            reason: e.to_string(),
                        },
                        cap,
                    );
                }
            }
        }

        info!(
            received = raw_envelopes.len(),
            accepted = report.accepted_count,
            rejected = report.rejected_count,
            storage_failures = report.storage_failures.len(),
            "batch ingested"
        );
        report
    }
}
