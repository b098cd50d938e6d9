//! Ingest requests, per-envelope outcomes, and batch reports.
//!
//! A `Rejection` is a normal outcome, not an error: it explains why one
//! envelope was not appended, and the batch continues with other nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Upper bound on rejection reasons returned to an ingest caller.
pub const MAX_REJECTION_REASONS: usize = 10;

/// Coarse classification of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Parse,
    SchemaInvalid,
    ReplayOrOutOfOrder,
    ChainBroken,
    SkippedAfterNodeFailure,
    Storage,
    Unauthorized,
}

/// Why a single envelope was not appended to its node's ledger.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    /// Malformed input; no node id could be identified.
    #[error("parse error at index {index}: {reason}")]
    Parse { index: usize, reason: String },

    /// Well-formed but failed field, hash, or timestamp checks.
    #[error("node '{node_id}' seq {seq}: schema invalid: {}", .errors.join("; "))]
    SchemaInvalid {
        node_id: String,
        seq: i64,
        errors: Vec<String>,
    },

    /// `seq` is not beyond the node's last accepted sequence number.
    #[error("node '{node_id}' seq {seq}: replay or out of order (last accepted seq {last_seq})")]
    ReplayOrOutOfOrder {
        node_id: String,
        seq: i64,
        last_seq: i64,
    },

    /// `prev_hash` does not match the chain hash recorded for the node.
    #[error(
        "node '{node_id}' seq {seq}: chain broken (expected prev_hash {}, got {})",
        .expected.as_deref().unwrap_or("null"),
        .got.as_deref().unwrap_or("null")
    )]
    ChainBroken {
        node_id: String,
        seq: i64,
        expected: Option<String>,
        got: Option<String>,
    },

    /// An earlier envelope for the same node was rejected in this batch.
    #[error("node '{node_id}' seq {seq}: skipped after an earlier rejection for this node")]
    SkippedAfterNodeFailure { node_id: String, seq: i64 },

    /// The ledger or state file could not be written.
    #[error("node '{node_id}' seq {seq}: storage failure: {reason}")]
    Storage {
        node_id: String,
        seq: i64,
        reason: String,
    },

    /// The ingest call failed authentication; nothing was examined.
    #[error("unauthorized: envelope at index {index} not examined")]
    Unauthorized { index: usize },
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::Parse { .. } => RejectionKind::Parse,
            Rejection::SchemaInvalid { .. } => RejectionKind::SchemaInvalid,
            Rejection::ReplayOrOutOfOrder { .. } => RejectionKind::ReplayOrOutOfOrder,
            Rejection::ChainBroken { .. } => RejectionKind::ChainBroken,
            Rejection::SkippedAfterNodeFailure { .. } => RejectionKind::SkippedAfterNodeFailure,
            Rejection::Storage { .. } => RejectionKind::Storage,
            Rejection::Unauthorized { .. } => RejectionKind::Unauthorized,
        }
    }

    /// The node the rejected envelope targeted, when one could be identified.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Rejection::Parse { .. } | Rejection::Unauthorized { .. } => None,
            Rejection::SchemaInvalid { node_id, .. }
            | Rejection::ReplayOrOutOfOrder { node_id, .. }
            | Rejection::ChainBroken { node_id, .. }
            | Rejection::SkippedAfterNodeFailure { node_id, .. }
            | Rejection::Storage { node_id, .. } => Some(node_id),
        }
    }
}

/// Result of appending one envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Appended; `envelope_hash` is the chain hash now recorded for the node.
    Accepted { seq: i64, envelope_hash: String },
    Rejected(Rejection),
}

/// Aggregate outcome of one `ingest_batch` call.
///
/// `rejection_reasons` is capped at `max_rejection_reasons`; `rejections`
/// holds every rejection for in-process callers and is not serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub rejection_reasons: Vec<String>,
    pub last_accepted_seq: Option<i64>,

    /// Hard storage failures hit during the batch.  Non-empty means the
    /// affected nodes may need operator attention.
    #[serde(default)]
    pub storage_failures: Vec<String>,

    #[serde(skip)]
    pub rejections: Vec<Rejection>,
}

impl IngestReport {
    /// Record a rejection, keeping at most `cap` human-readable reasons.
    pub fn reject(&mut self, rejection: Rejection, cap: usize) {
        self.rejected_count += 1;
        if self.rejection_reasons.len() < cap {
            self.rejection_reasons.push(rejection.to_string());
        }
        self.rejections.push(rejection);
    }

    /// Record an accepted envelope.
    pub fn accept(&mut self, seq: i64) {
        self.accepted_count += 1;
        self.last_accepted_seq = Some(seq);
    }

    /// True when at least one hard storage failure occurred.
    pub fn has_storage_failure(&self) -> bool {
        !self.storage_failures.is_empty()
    }
}

/// Authentication outcome decided by the external API layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    Authenticated,
    Anonymous,
    Denied,
}

/// One ingest call as handed over by the external API layer.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Remote address of the caller, as seen by the API layer.
    pub source_addr: String,
    pub auth: AuthOutcome,
    /// Raw envelope objects in delivery order.
    pub envelopes: Vec<Value>,
    /// Size of the request body in bytes.
    pub payload_size: usize,
}

/// What the ingest entry point returns to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub request_id: String,
    pub accepted_count: usize,
    pub rejected_count: usize,
    /// At most [`MAX_REJECTION_REASONS`] entries.
    pub rejection_reasons: Vec<String>,
    #[serde(default)]
    pub storage_failures: Vec<String>,
}
