//! Payload and envelope hashing.
//!
//! Both hashes are SHA-256 over canonical JSON, rendered as lowercase hex.
//!
//! Hash input layout:
//!   - payload hash: `canonicalize(payload)`
//!   - envelope hash: `canonicalize({field: value})` for every field in the
//!     chain-field set of the envelope's schema version, with absent
//!     optional fields present as `null`
//!
//! The chain-field set never contains `envelope_hash` (it would be
//! self-referential) or `signature` (populated after hashing, if ever).
//! The payload is committed through `payload_hash`.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use relay_contracts::envelope::Envelope;

use crate::canonical::canonicalize;

/// Chain-field set for schema version 1.0.  Frozen: changing it changes
/// every envelope hash ever produced.
pub const CHAIN_FIELDS_V1: &[&str] = &[
    "schema_version",
    "node_id",
    "node_name",
    "captured_at",
    "seq",
    "event_type",
    "payload_hash",
    "prev_hash",
    "collector_version",
];

/// The chain-field set for `schema_version`.
///
/// Only one version exists; unknown versions are rejected by validation
/// before hashing matters, and hash with the v1 set meanwhile.
pub fn chain_fields(_schema_version: &str) -> &'static [&'static str] {
    CHAIN_FIELDS_V1
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of the canonical form of `payload`.
pub fn compute_payload_hash(payload: &Value) -> String {
    sha256_hex(&canonicalize(payload))
}

/// SHA-256 of the chain-field projection of `fields`.
///
/// `fields` is a JSON object holding at least the chain fields; anything
/// else in it (payload, envelope_hash, signature) is ignored.  Chain fields
/// missing from `fields` hash as `null`.
pub fn compute_envelope_hash(fields: &Value) -> String {
    let version = fields
        .get("schema_version")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut projection = Map::new();
    for name in chain_fields(version) {
        let value = fields.get(*name).cloned().unwrap_or(Value::Null);
        projection.insert((*name).to_string(), value);
    }
    sha256_hex(&canonicalize(&Value::Object(projection)))
}

/// Envelope hash recomputed from an envelope's own fields.
pub fn envelope_hash_of(envelope: &Envelope) -> String {
    let mut projection = Map::new();
    for name in chain_fields(&envelope.schema_version) {
        projection.insert((*name).to_string(), chain_field(envelope, name));
    }
    sha256_hex(&canonicalize(&Value::Object(projection)))
}

/// The hash that links the next envelope to this one: the stored
/// `envelope_hash` when present, the recomputed value otherwise.
pub fn effective_chain_hash(envelope: &Envelope) -> String {
    envelope
        .envelope_hash
        .clone()
        .unwrap_or_else(|| envelope_hash_of(envelope))
}

fn chain_field(envelope: &Envelope, name: &str) -> Value {
    let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
    match name {
        "schema_version" => Value::String(envelope.schema_version.clone()),
        "node_id" => Value::String(envelope.node_id.clone()),
        "node_name" => opt(&envelope.node_name),
        "captured_at" => Value::String(envelope.captured_at.clone()),
        "seq" => Value::from(envelope.seq),
        "event_type" => Value::String(envelope.event_type.clone()),
        "payload_hash" => Value::String(envelope.payload_hash.clone()),
        "prev_hash" => opt(&envelope.prev_hash),
        "collector_version" => Value::String(envelope.collector_version.clone()),
        _ => Value::Null,
    }
}
