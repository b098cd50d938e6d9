//! Local generic events, as produced by the agents and schedulers that sit
//! outside the relay.

use serde::{Deserialize, Serialize};

/// A locally produced event eligible for export.
///
/// The relay never interprets these beyond filtering on `event_type`; the
/// exporter copies them verbatim into envelope payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEvent {
    pub event_type: String,

    /// ISO-8601 time the event occurred.
    pub timestamp: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub tags: Vec<String>,
}
