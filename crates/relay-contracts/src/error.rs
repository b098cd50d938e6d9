//! Hard error types for the evidence relay.
//!
//! Per-envelope validation outcomes are not errors: they are reported as
//! [`Rejection`](crate::ingest::Rejection) values so a batch can keep going.
//! Everything in this module aborts the operation that produced it.

use std::fmt::Display;
use std::path::Path;

use thiserror::Error;

/// The unified error type for the evidence relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A ledger, state, bundle, or audit file could not be read or written.
    ///
    /// Never swallowed: a storage failure can leave the ledger and the
    /// ingest state out of step, so callers must see it.
    #[error("storage failure at '{path}': {reason}")]
    Storage { path: String, reason: String },

    /// A value could not be converted to or from its JSON form.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A bundle file contains a line that is not a JSON object.
    #[error("invalid bundle at line {line}: {reason}")]
    InvalidBundle { line: usize, reason: String },

    /// An incremental export was requested without the receiver's chain anchor.
    #[error("incremental export for node '{node_id}' requires the receiver's chain anchor")]
    ExportAnchorRequired { node_id: String },

    /// The receiver's reported chain position differs from the exporter's.
    #[error(
        "receiver anchor for node '{node_id}' (seq {receiver_seq}, hash {receiver_hash}) \
         does not match the last export (seq {exported_seq}, hash {exported_hash})"
    )]
    ExportAnchorMismatch {
        node_id: String,
        receiver_seq: i64,
        receiver_hash: String,
        exported_seq: i64,
        exported_hash: String,
    },

    /// A per-node lock or the lock table was poisoned by a panicking writer.
    #[error("lock poisoned: {reason}")]
    LockPoisoned { reason: String },
}

impl RelayError {
    /// Build a `Storage` error for `path`.
    pub fn storage(path: &Path, err: impl Display) -> Self {
        RelayError::Storage {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Build a `Serialization` error from any displayable cause.
    pub fn serialization(err: impl Display) -> Self {
        RelayError::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the relay crates.
pub type RelayResult<T> = Result<T, RelayError>;
