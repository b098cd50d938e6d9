//! Envelope construction and validation.
//!
//! `create_envelope` is the only way the relay builds envelopes; it fills in
//! both hashes.  `validate_envelope` checks a single envelope in isolation
//! and `validate_chain` checks an ordered run of envelopes from one node.
//!
//! A present `envelope_hash` must match its recomputed value exactly.  There
//! is no silent correction here or at ingest: an absent hash is computed, a
//! wrong one is rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use relay_contracts::{
    envelope::{Envelope, SCHEMA_VERSION, SUPPORTED_SCHEMA_VERSIONS},
    timestamp::{format_timestamp, parse_timestamp},
};

use crate::hash::{compute_payload_hash, effective_chain_hash, envelope_hash_of};

/// Optional inputs to [`create_envelope`].
#[derive(Debug, Clone, Default)]
pub struct EnvelopeOptions {
    pub node_name: Option<String>,
    /// `envelope_hash` of the previous envelope for this node.
    pub prev_hash: Option<String>,
    /// Capture time; defaults to now.
    pub captured_at: Option<DateTime<Utc>>,
}

/// Build a fully populated envelope with both hashes computed and no signature.
pub fn create_envelope(
    node_id: &str,
    seq: i64,
    event_type: &str,
    payload: Value,
    collector_version: &str,
    options: EnvelopeOptions,
) -> Envelope {
    let captured_at = options.captured_at.unwrap_or_else(Utc::now);
    let payload_hash = compute_payload_hash(&payload);

    let mut envelope = Envelope {
        schema_version: SCHEMA_VERSION.to_string(),
        node_id: node_id.to_string(),
        node_name: options.node_name,
        captured_at: format_timestamp(&captured_at),
        seq,
        event_type: event_type.to_string(),
        payload,
        payload_hash,
        prev_hash: options.prev_hash,
        envelope_hash: None,
        signature: None,
        collector_version: collector_version.to_string(),
    };
    envelope.envelope_hash = Some(envelope_hash_of(&envelope));
    envelope
}

/// Outcome of validating one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Outcome of validating an ordered chain of envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub valid: bool,
    /// Each entry is prefixed with the index of the offending envelope.
    pub errors: Vec<String>,
    /// Index of the first envelope with any error.
    pub break_index: Option<usize>,
}

/// Check one envelope's fields, hashes, and timestamp.
///
/// All failures are collected; the report is valid only if there are none.
pub fn validate_envelope(envelope: &Envelope) -> EnvelopeReport {
    let mut errors = Vec::new();

    let required = [
        ("schema_version", &envelope.schema_version),
        ("node_id", &envelope.node_id),
        ("captured_at", &envelope.captured_at),
        ("event_type", &envelope.event_type),
        ("payload_hash", &envelope.payload_hash),
        ("collector_version", &envelope.collector_version),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("missing required field '{name}'"));
        }
    }

    if !envelope.schema_version.is_empty()
        && !SUPPORTED_SCHEMA_VERSIONS.contains(&envelope.schema_version.as_str())
    {
        errors.push(format!(
            "unsupported schema_version '{}'",
            envelope.schema_version
        ));
    }

    if envelope.seq < 0 {
        errors.push(format!("seq must be >= 0, got {}", envelope.seq));
    }

    let payload_hash = compute_payload_hash(&envelope.payload);
    if !envelope.payload_hash.is_empty() && payload_hash != envelope.payload_hash {
        errors.push(format!(
            "payload_hash mismatch: stored {}, computed {}",
            envelope.payload_hash, payload_hash
        ));
    }

    if let Some(stored) = &envelope.envelope_hash {
        let computed = envelope_hash_of(envelope);
        if *stored != computed {
            errors.push(format!(
                "envelope_hash mismatch: stored {stored}, computed {computed}"
            ));
        }
    }

    if !envelope.captured_at.is_empty() && parse_timestamp(&envelope.captured_at).is_none() {
        errors.push(format!(
            "captured_at '{}' is not a valid timestamp",
            envelope.captured_at
        ));
    }

    EnvelopeReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Check an ordered run of envelopes that all belong to one node.
///
/// On top of [`validate_envelope`] for each entry: every `node_id` equals
/// the first one, `seq` strictly increases, and each `prev_hash` equals the
/// effective chain hash of its predecessor.  The first envelope's
/// `prev_hash` is not checked; it links to history outside the slice.
/// An empty slice is valid.
pub fn validate_chain(envelopes: &[Envelope]) -> ChainReport {
    let mut errors = Vec::new();
    let mut break_index = None;

    for (index, envelope) in envelopes.iter().enumerate() {
        let mut local: Vec<String> = validate_envelope(envelope).errors;

        if index > 0 {
            let first = &envelopes[0];
            let prev = &envelopes[index - 1];

            if envelope.node_id != first.node_id {
                local.push(format!(
                    "node_id '{}' differs from chain node_id '{}'",
                    envelope.node_id, first.node_id
                ));
            }
            if envelope.seq <= prev.seq {
                local.push(format!(
                    "seq {} does not increase past previous seq {}",
                    envelope.seq, prev.seq
                ));
            }
            let expected = effective_chain_hash(prev);
            if envelope.prev_hash.as_deref() != Some(expected.as_str()) {
                local.push(format!(
                    "prev_hash {} does not match previous envelope hash {}",
                    envelope.prev_hash.as_deref().unwrap_or("null"),
                    expected
                ));
            }
        }

        if !local.is_empty() {
            debug!(index, seq = envelope.seq, node_id = %envelope.node_id, "chain check failed");
            break_index.get_or_insert(index);
            errors.extend(local.into_iter().map(|e| format!("index {index}: {e}")));
        }
    }

    ChainReport {
        valid: errors.is_empty(),
        errors,
        break_index,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::{canonical::canonical_string, hash::compute_envelope_hash};

    fn chain(node_id: &str, n: i64) -> Vec<Envelope> {
        let mut out: Vec<Envelope> = Vec::new();
        for seq in 0..n {
            let prev_hash = out.last().and_then(|e| e.envelope_hash.clone());
            out.push(create_envelope(
                node_id,
                seq,
                "observation",
                json!({ "summary": format!("event {seq}"), "tags": ["t"] }),
                "relay/test",
                EnvelopeOptions {
                    prev_hash,
                    ..Default::default()
                },
            ));
        }
        out
    }

    // ── create_envelope ──────────────────────────────────────────────────────

    #[test]
    fn created_envelope_is_valid() {
        let env = create_envelope(
            "laptop-001",
            0,
            "observation",
            json!({ "k": "v" }),
            "relay/test",
            EnvelopeOptions {
                node_name: Some("Laptop".to_string()),
                captured_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
                ..Default::default()
            },
        );
        assert_eq!(env.captured_at, "2024-05-01T12:00:00.000000Z");
        assert!(env.prev_hash.is_none());
        assert!(env.signature.is_none());
        assert!(env.envelope_hash.is_some());

        let report = validate_envelope(&env);
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn struct_and_value_projections_hash_identically() {
        let env = &chain("laptop-001", 2)[1];
        let as_value = env.to_value().unwrap();
        assert_eq!(envelope_hash_of(env), compute_envelope_hash(&as_value));
    }

    #[test]
    fn canonical_text_round_trip_preserves_envelope() {
        let env = &chain("laptop-001", 3)[2];
        let text = canonical_string(&env.to_value().unwrap());
        let parsed: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(&parsed, env);
        assert!(validate_envelope(&parsed).valid);
    }

    // ── validate_envelope ────────────────────────────────────────────────────

    #[test]
    fn tampered_payload_fails_payload_hash_check() {
        let mut env = chain("laptop-001", 1).remove(0);
        env.payload["summary"] = json!("TAMPERED");

        let report = validate_envelope(&env);
        assert!(!report.valid);
        assert!(
            report.errors.iter().any(|e| e.contains("payload_hash mismatch")),
            "errors: {:?}",
            report.errors
        );
    }

    #[test]
    fn mismatched_envelope_hash_is_rejected_not_corrected() {
        let mut env = chain("laptop-001", 1).remove(0);
        env.envelope_hash = Some("00".repeat(32));

        let report = validate_envelope(&env);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("envelope_hash mismatch")));
        assert_eq!(env.envelope_hash.as_deref(), Some("00".repeat(32).as_str()));
    }

    #[test]
    fn absent_envelope_hash_is_acceptable() {
        let mut env = chain("laptop-001", 1).remove(0);
        env.envelope_hash = None;
        assert!(validate_envelope(&env).valid);
    }

    #[test]
    fn field_checks_collect_every_failure() {
        let mut env = chain("laptop-001", 1).remove(0);
        env.envelope_hash = None;
        env.node_id = String::new();
        env.schema_version = "9.9".to_string();
        env.seq = -1;
        env.captured_at = "not a time".to_string();

        let report = validate_envelope(&env);
        assert!(!report.valid);
        let joined = report.errors.join("\n");
        assert!(joined.contains("'node_id'"));
        assert!(joined.contains("unsupported schema_version"));
        assert!(joined.contains("seq must be >= 0"));
        assert!(joined.contains("captured_at"));
    }

    // ── validate_chain ───────────────────────────────────────────────────────

    #[test]
    fn linked_chain_validates() {
        let report = validate_chain(&chain("laptop-001", 6));
        assert!(report.valid, "errors: {:?}", report.errors);
        assert_eq!(report.break_index, None);
    }

    #[test]
    fn empty_chain_is_valid() {
        assert!(validate_chain(&[]).valid);
    }

    #[test]
    fn altered_prev_hash_reports_exact_break_index() {
        for target in 1..5 {
            let mut envs = chain("laptop-001", 5);
            envs[target].prev_hash = Some("ff".repeat(32));

            let report = validate_chain(&envs);
            assert!(!report.valid);
            assert_eq!(report.break_index, Some(target), "altered index {target}");
        }
    }

    #[test]
    fn mixed_nodes_and_non_increasing_seq_are_reported() {
        let mut envs = chain("laptop-001", 3);
        let other = chain("desktop-002", 3);
        envs[2] = other[2].clone();

        let report = validate_chain(&envs);
        assert_eq!(report.break_index, Some(2));
        assert!(report.errors.iter().any(|e| e.contains("differs from chain node_id")));

        let mut envs = chain("laptop-001", 3);
        envs.swap(1, 2);
        let report = validate_chain(&envs);
        assert_eq!(report.break_index, Some(1));
        assert!(report.errors.iter().any(|e| e.contains("does not increase")));
    }

    #[test]
    fn chain_without_stored_hashes_links_through_recomputed_hashes() {
        let mut envs = chain("laptop-001", 4);
        for env in &mut envs {
            env.envelope_hash = None;
        }
        assert!(validate_chain(&envs).valid);
    }
}
