//! # relay-export
//!
//! Builds chained evidence bundles from the local node's generic events for
//! manual transfer to another node.
//!
//! ## Overview
//!
//! [`ExportBuilder`] pulls recent events from an
//! [`EventSource`](relay_core::traits::EventSource), keeps only the
//! exportable event types, wraps each one in an envelope chained to the one
//! before it, and writes the sequence to a bundle file.  [`read_bundle`] and
//! [`verify_bundle`] are the receiving side's view of the same file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_export::{ExportBuilder, JsonlEventSource};
//!
//! let builder = ExportBuilder::new(storage, config.node.clone(), &config.export,
//!     Box::new(JsonlEventSource::new(&config.export.events_path)));
//! let outcome = builder.export(500, false, Some(&receiver_anchor))?;
//! ```

pub mod builder;
pub mod bundle;
pub mod source;

pub use builder::{ExportBuilder, ExportOutcome};
pub use bundle::{bundle_file_name, read_bundle, verify_bundle, write_bundle};
pub use source::JsonlEventSource;

// ── Tests ─────────────────────────────────────────────────────────────────────
