//! The ingest entry point consumed by an external API layer.
//!
//! `IngestService` wires a `LedgerStore` to an `AuditSink`: every call is
//! ingested (unless authentication was denied) and then recorded as exactly
//! one audit record, whatever the outcome.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use relay_contracts::{
    audit::{AuditRecord, AUDIT_REASON_SAMPLE},
    ingest::{AuthOutcome, IngestReport, IngestRequest, IngestResponse, Rejection},
};
use relay_core::traits::AuditSink;

use crate::store::LedgerStore;

pub struct IngestService {
    store: Arc<LedgerStore>,
    audit: Box<dyn AuditSink>,
    audit_reason_sample: usize,
}

impl IngestService {
    pub fn new(store: Arc<LedgerStore>, audit: Box<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            audit_reason_sample: AUDIT_REASON_SAMPLE,
        }
    }

    /// Lower how many rejection reasons each audit record keeps.  Values
    /// above `AUDIT_REASON_SAMPLE` are clamped to it.
    pub fn with_audit_reason_sample(mut self, sample: usize) -> Self {
        self.audit_reason_sample = sample.min(AUDIT_REASON_SAMPLE);
        self
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Ingest one request and audit it.
    ///
    /// A failed audit write does not undo the ingest; it is reported in
    /// `storage_failures` alongside any ledger failures.
    pub fn ingest(&self, request: &IngestRequest) -> IngestResponse {
        let request_id = Uuid::new_v4();

        let mut report = match request.auth {
            AuthOutcome::Denied => self.deny_all(request),
            AuthOutcome::Authenticated | AuthOutcome::Anonymous => {
                self.store.ingest_batch(&request.envelopes)
            }
        };

        let record = AuditRecord {
            request_id,
            timestamp: Utc::now(),
            source_addr: request.source_addr.clone(),
            node_id: first_node_id(&request.envelopes),
            auth: request.auth,
            received: request.envelopes.len(),
            accepted: report.accepted_count,
            rejected: report.rejected_count,
            rejection_sample: report
                .rejection_reasons
                .iter()
                .take(self.audit_reason_sample)
                .cloned()
                .collect(),
            payload_size: request.payload_size,
        };
        if let Err(e) = self.audit.record(&record) {
            error!(request_id = %request_id, error = %e, "audit write failed");
            report.storage_failures.push(format!("audit: {e}"));
        }

        info!(
            request_id = %request_id,
            source = %request.source_addr,
            accepted = report.accepted_count,
            rejected = report.rejected_count,
            "ingest request handled"
        );

        IngestResponse {
            request_id: request_id.to_string(),
            accepted_count: report.accepted_count,
            rejected_count: report.rejected_count,
            rejection_reasons: report.rejection_reasons,
            storage_failures: report.storage_failures,
        }
    }

    fn deny_all(&self, request: &IngestRequest) -> IngestReport {
        let mut report = IngestReport::default();
        for index in 0..request.envelopes.len() {
            report.reject(
                Rejection::Unauthorized { index },
                self.store.max_rejection_reasons,
            );
        }
        report
    }
}

/// Best-effort node id for the audit record: the first one in the request.
fn first_node_id(envelopes: &[Value]) -> Option<String> {
    envelopes
        .iter()
        .find_map(|e| e.get("node_id").and_then(Value::as_str))
        .map(str::to_string)
}
