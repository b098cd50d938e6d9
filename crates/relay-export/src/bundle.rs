//! Bundle files: newline-delimited canonical envelopes for offline transfer.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;

use relay_config::{
    files::{read_lines, write_bytes_atomic},
    sanitize_node_id,
};
use relay_contracts::{
    envelope::Envelope,
    error::{RelayError, RelayResult},
};
use relay_core::{canonicalize, validate_chain, ChainReport};

/// `evidence_bundle_<node>_<YYYYMMDDTHHMMSSZ>.jsonl`
pub fn bundle_file_name(node_id: &str, at: &DateTime<Utc>) -> String {
    format!(
        "evidence_bundle_{}_{}.jsonl",
        sanitize_node_id(node_id),
        at.format("%Y%m%dT%H%M%SZ")
    )
}

/// A bundle path in `dir` that does not exist yet.
///
/// Two exports in the same second get `_1`, `_2`, ... suffixes.
pub fn unique_bundle_path(dir: &Path, node_id: &str, at: &DateTime<Utc>) -> PathBuf {
    let base = bundle_file_name(node_id, at);
    let mut path = dir.join(&base);
    let stem = base.trim_end_matches(".jsonl").to_string();
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.jsonl"));
        n += 1;
    }
    path
}

/// Write `envelopes` to `path`, one canonical line each.
///
/// The whole file is written through a temp file and renamed into place, so
/// a reader never sees a partial bundle.
pub fn write_bundle(path: &Path, envelopes: &[Envelope]) -> RelayResult<()> {
    let mut bytes = Vec::new();
    for envelope in envelopes {
        let value = envelope.to_value().map_err(RelayError::serialization)?;
        bytes.extend_from_slice(&canonicalize(&value));
        bytes.push(b'\n');
    }
    write_bytes_atomic(path, &bytes)
}

/// Read a bundle as raw envelope objects, ready for `ingest_batch`.
///
/// Every non-empty line must be JSON; an unterminated last line is accepted
/// as long as it parses, since bundles are complete files.
pub fn read_bundle(path: &Path) -> RelayResult<Vec<Value>> {
    if !path.exists() {
        return Err(RelayError::storage(path, "bundle file not found"));
    }
    let read = read_lines(path)?;

    read.lines
        .iter()
        .chain(read.torn_tail.iter())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str::<Value>(line).map_err(|e| RelayError::InvalidBundle {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse a bundle into envelopes and validate it as one chain.
pub fn verify_bundle(path: &Path) -> RelayResult<ChainReport> {
    let envelopes = read_bundle(path)?
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            Envelope::from_value(value).map_err(|e| RelayError::InvalidBundle {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect::<RelayResult<Vec<_>>>()?;
    Ok(validate_chain(&envelopes))
}
