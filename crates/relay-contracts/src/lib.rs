//! # relay-contracts
//!
//! Shared types, error taxonomy, and the canonical timestamp form for the
//! node evidence relay.
//!
//! All crates in the workspace import from here. No ledger or hashing logic
//! lives in this crate, only data definitions and their serde shape.

pub mod audit;
pub mod envelope;
pub mod error;
pub mod event;
pub mod ingest;
pub mod state;
pub mod timestamp;
