//! The envelope: one hashed, chain-linked unit of evidence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version written by this collector.
pub const SCHEMA_VERSION: &str = "1.0";

/// Every schema version the validator accepts.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1.0"];

/// A single unit of evidence exchanged between nodes.
///
/// `payload_hash` commits to `payload`; `envelope_hash` commits to the
/// chain-field projection of the envelope (see `relay_core::hash`), which
/// includes `prev_hash` and therefore the whole history of the node.
///
/// Optional fields always serialize (as `null` when unset) so the canonical
/// line form of an envelope has a fixed key set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope schema version, e.g. `"1.0"`.
    pub schema_version: String,

    /// Stable identifier of the node that produced this evidence.
    pub node_id: String,

    /// Optional human-readable node name.
    #[serde(default)]
    pub node_name: Option<String>,

    /// Capture time as an ISO-8601 string.  Kept as text so hashing covers
    /// exactly what the producer wrote.
    pub captured_at: String,

    /// Per-node sequence number, strictly increasing from 0.
    pub seq: i64,

    /// Event type tag carried over from the source event.
    pub event_type: String,

    /// Arbitrary JSON evidence body.  Never interpreted by the relay.
    pub payload: Value,

    /// Lowercase hex SHA-256 of the canonical payload.
    pub payload_hash: String,

    /// `envelope_hash` of the previous envelope for this node, `None` for the first.
    #[serde(default)]
    pub prev_hash: Option<String>,

    /// Lowercase hex SHA-256 of the chain-field projection.
    #[serde(default)]
    pub envelope_hash: Option<String>,

    /// Reserved.  Never populated or checked by this version.
    #[serde(default)]
    pub signature: Option<String>,

    /// Version string of the collector that built the envelope.
    pub collector_version: String,
}

impl Envelope {
    /// Convert to the structured JSON form.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parse from the structured JSON form.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
