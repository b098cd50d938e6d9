//! Per-node bookkeeping persisted next to the ledger and the exporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp;

/// Receiver-side state for one node: where its chain currently ends.
///
/// Created lazily on the first accepted envelope for a node, mutated only by
/// a successful append, never rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestState {
    pub node_id: String,

    /// Sequence number of the last accepted envelope, `-1` before any.
    pub last_seq: i64,

    /// Chain hash of the last accepted envelope, `None` before any.
    pub last_hash: Option<String>,

    #[serde(default, with = "timestamp::canonical::option")]
    pub last_ingested_at: Option<DateTime<Utc>>,

    pub total_envelopes: u64,
}

impl IngestState {
    /// The state of a node that has never been ingested.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            last_seq: -1,
            last_hash: None,
            last_ingested_at: None,
            total_envelopes: 0,
        }
    }
}

/// Exporter-side state for the local node.
///
/// Mutated only after a bundle has been written successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportState {
    pub node_id: String,

    /// `seq` of the last envelope written to a bundle, `-1` before any.
    pub last_exported_seq: i64,

    /// Position in the event source: how many exportable events (oldest
    /// first) have been passed over by exports.  Distinct from
    /// `last_exported_seq`: it counts filtered source events, not envelopes.
    pub last_exported_event_count: u64,

    /// `envelope_hash` of the last envelope written to a bundle.
    #[serde(default)]
    pub last_exported_hash: Option<String>,

    #[serde(default, with = "timestamp::canonical::option")]
    pub last_export_at: Option<DateTime<Utc>>,

    pub total_exports: u64,
}

impl ExportState {
    /// The state of a node that has never exported.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            last_exported_seq: -1,
            last_exported_event_count: 0,
            last_exported_hash: None,
            last_export_at: None,
            total_exports: 0,
        }
    }
}

/// Where a node's chain ends, as reported by a receiver.
///
/// This is the handshake an exporter needs before building an incremental
/// bundle: the bundle's first envelope must chain onto exactly this point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAnchor {
    pub node_id: String,
    pub last_seq: i64,
    pub last_hash: Option<String>,
}

impl From<&IngestState> for ChainAnchor {
    fn from(state: &IngestState) -> Self {
        Self {
            node_id: state.node_id.clone(),
            last_seq: state.last_seq,
            last_hash: state.last_hash.clone(),
        }
    }
}

/// Operator view of the local exporter.  Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStatus {
    pub node_id: String,
    pub node_name: Option<String>,
    pub collector_version: String,
    pub last_exported_seq: i64,
    pub last_exported_event_count: u64,
    pub last_exported_hash: Option<String>,
    #[serde(default, with = "timestamp::canonical::option")]
    pub last_export_at: Option<DateTime<Utc>>,
    pub total_exports: u64,
}
