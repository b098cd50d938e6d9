//! # relay-core
//!
//! Deterministic hashing and chain validation for the node evidence relay.
//!
//! This crate provides:
//! - the canonical JSON serializer every hash is computed over
//! - payload and envelope hashing over a frozen chain-field set
//! - envelope creation, single-envelope validation, and chain validation
//! - the `EventSource` and `AuditSink` traits implemented elsewhere
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_core::{create_envelope, validate_chain, EnvelopeOptions};
//!
//! let first = create_envelope("laptop-001", 0, "observation", payload, "relay/0.1.0",
//!     EnvelopeOptions::default());
//! let report = validate_chain(&[first]);
//! assert!(report.valid);
//! ```

pub mod canonical;
pub mod hash;
pub mod schema;
pub mod traits;

pub use canonical::{canonical_string, canonicalize, canonicalize_serialize};
pub use hash::{compute_envelope_hash, compute_payload_hash, effective_chain_hash, envelope_hash_of};
pub use schema::{
    create_envelope, validate_chain, validate_envelope, ChainReport, EnvelopeOptions,
    EnvelopeReport,
};
