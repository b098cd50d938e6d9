//! Audit record of one ingest call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ingest::AuthOutcome, timestamp};

/// Upper bound on rejection reasons sampled into an audit record.
pub const AUDIT_REASON_SAMPLE: usize = 5;

/// One line of the audit log.
///
/// Independent of the ledger: validation never reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Correlates the record with the tracing output of the same call.
    pub request_id: Uuid,

    #[serde(with = "timestamp::canonical")]
    pub timestamp: DateTime<Utc>,

    pub source_addr: String,

    /// First node id found in the request, if any.
    pub node_id: Option<String>,

    pub auth: AuthOutcome,

    pub received: usize,
    pub accepted: usize,
    pub rejected: usize,

    /// At most [`AUDIT_REASON_SAMPLE`] rejection reasons.
    pub rejection_sample: Vec<String>,

    /// Request body size in bytes.
    pub payload_size: usize,
}
