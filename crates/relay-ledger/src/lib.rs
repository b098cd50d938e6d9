//! # relay-ledger
//!
//! Append-only, per-node evidence ledger for the node evidence relay.
//!
//! ## Overview
//!
//! [`LedgerStore`] owns one ledger file and one ingest state file per node.
//! Appends are validated against the stored state (strictly increasing
//! `seq`, matching `prev_hash`) and serialized per node, so concurrent
//! ingest calls can never both build on the same stale state.
//!
//! [`LedgerStore::ingest_batch`] runs many envelopes in order with per-node
//! halting, and [`IngestService`] is the entry point an API layer calls: it
//! ingests and then writes one audit record per call.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_config::StorageContext;
//! use relay_ledger::LedgerStore;
//!
//! let store = LedgerStore::new(StorageContext::new("/var/lib/relay"));
//! let report = store.ingest_batch(&raw_envelopes);
//! println!("accepted {} rejected {}", report.accepted_count, report.rejected_count);
//! ```

pub mod batch;
pub mod lock;
pub mod service;
pub mod store;

pub use service::IngestService;
pub use store::{LedgerStore, LedgerVerification};

// ── Tests ─────────────────────────────────────────────────────────────────────
