//! The export/bundle builder.
//!
//! Turns the local node's generic events into a chained envelope sequence
//! and writes it to a bundle file.  Export state is persisted only after
//! the bundle is on disk.
//!
//! Incremental exports continue the chain from the last exported envelope.
//! Because the exporter cannot see the receiver, an incremental export after
//! a previous one requires the receiver's [`ChainAnchor`] and refuses to
//! build unless the receiver ends exactly where the last export ended.  This
//! turns a receiver that missed or partially ingested a bundle into an
//! export-time error instead of an ingest-time `ChainBroken`.
//!
//! Export progress is a position in the source: the number of exportable
//! events (after type filtering, oldest first) already passed over.  It does
//! not depend on `recent_n`, which only caps how many of the pending events
//! one bundle carries.  Pending events beyond that cap, the oldest ones, are
//! skipped and counted as passed.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use relay_config::{
    files::{read_json, write_json_atomic},
    ExportConfig, NodeConfig, StorageContext,
};
use relay_contracts::{
    envelope::Envelope,
    error::{RelayError, RelayResult},
    event::LocalEvent,
    state::{ChainAnchor, ExportState, ExportStatus},
    timestamp::parse_timestamp,
};
use relay_core::{create_envelope, traits::EventSource, EnvelopeOptions};

use crate::bundle::{unique_bundle_path, write_bundle};

/// What one `export` call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub node_id: String,
    /// `None` when there was nothing new to export.
    pub bundle_path: Option<PathBuf>,
    pub envelope_count: usize,
    pub first_seq: Option<i64>,
    pub last_seq: Option<i64>,
    /// `envelope_hash` of the last envelope in the bundle.
    pub last_hash: Option<String>,
    pub include_all: bool,
}

/// Builds evidence bundles for the local node.
pub struct ExportBuilder {
    storage: StorageContext,
    node: NodeConfig,
    bundle_dir: PathBuf,
    allowed_event_types: BTreeSet<String>,
    source: Box<dyn EventSource>,
}

impl ExportBuilder {
    pub fn new(
        storage: StorageContext,
        node: NodeConfig,
        export: &ExportConfig,
        source: Box<dyn EventSource>,
    ) -> Self {
        Self {
            storage,
            node,
            bundle_dir: export.bundle_dir.clone(),
            allowed_event_types: export.allowed_event_types.iter().cloned().collect(),
            source,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node.node_id
    }

    fn load_state(&self) -> RelayResult<ExportState> {
        Ok(read_json(&self.storage.export_state_path(&self.node.node_id))?
            .unwrap_or_else(|| ExportState::new(self.node.node_id.clone())))
    }

    /// Export up to `recent_n` recent events as one chained bundle.
    ///
    /// With `include_all` the `recent_n` newest exportable events are
    /// exported from seq 0, which only a receiver that has never seen this
    /// node will accept.  Otherwise only events past the recorded position
    /// are wrapped, the chain continues from the last export, and `anchor`
    /// must be supplied once any previous export exists.
    pub fn export(
        &self,
        recent_n: usize,
        include_all: bool,
        anchor: Option<&ChainAnchor>,
    ) -> RelayResult<ExportOutcome> {
        let mut state = self.load_state()?;

        let filtered: Vec<LocalEvent> = self
            .source
            .recent_events(usize::MAX)?
            .into_iter()
            .filter(|e| self.allowed_event_types.contains(&e.event_type))
            .collect();
        let total = filtered.len();

        let (selected, start_seq, mut prev_hash) = if include_all {
            if let Some(anchor) = anchor {
                self.check_anchor(anchor, -1, None)?;
            }
            (newest(&filtered, recent_n), 0, None)
        } else {
            match anchor {
                Some(anchor) => self.check_anchor(
                    anchor,
                    state.last_exported_seq,
                    state.last_exported_hash.as_deref(),
                )?,
                None if state.total_exports > 0 => {
                    return Err(RelayError::ExportAnchorRequired {
                        node_id: self.node.node_id.clone(),
                    })
                }
                None => {}
            }
            let position = state.last_exported_event_count as usize;
            if position > total {
                warn!(
                    node_id = %self.node.node_id,
                    position,
                    available = total,
                    "event source holds fewer events than already exported"
                );
            }
            (
                newest(&filtered[position.min(total)..], recent_n),
                state.last_exported_seq + 1,
                state.last_exported_hash.clone(),
            )
        };

        if selected.is_empty() {
            info!(node_id = %self.node.node_id, include_all, "nothing new to export");
            return Ok(ExportOutcome {
                node_id: self.node.node_id.clone(),
                bundle_path: None,
                envelope_count: 0,
                first_seq: None,
                last_seq: None,
                last_hash: None,
                include_all,
            });
        }

        let mut envelopes: Vec<Envelope> = Vec::with_capacity(selected.len());
        for (offset, event) in selected.iter().enumerate() {
            let envelope = self.wrap(event, start_seq + offset as i64, prev_hash.take());
            prev_hash = envelope.envelope_hash.clone();
            envelopes.push(envelope);
        }

        let now = Utc::now();
        let path = unique_bundle_path(&self.bundle_dir, &self.node.node_id, &now);
        write_bundle(&path, &envelopes)?;

        let last_seq = start_seq + envelopes.len() as i64 - 1;
        state.last_exported_seq = last_seq;
        state.last_exported_hash = prev_hash.clone();
        state.last_exported_event_count = total as u64;
        state.last_export_at = Some(now);
        state.total_exports += 1;
        write_json_atomic(&self.storage.export_state_path(&self.node.node_id), &state)?;

        info!(
            node_id = %self.node.node_id,
            bundle = %path.display(),
            envelopes = envelopes.len(),
            first_seq = start_seq,
            last_seq,
            "bundle exported"
        );

        Ok(ExportOutcome {
            node_id: self.node.node_id.clone(),
            bundle_path: Some(path),
            envelope_count: envelopes.len(),
            first_seq: Some(start_seq),
            last_seq: Some(last_seq),
            last_hash: prev_hash,
            include_all,
        })
    }

    fn check_anchor(
        &self,
        anchor: &ChainAnchor,
        expected_seq: i64,
        expected_hash: Option<&str>,
    ) -> RelayResult<()> {
        if anchor.node_id != self.node.node_id {
            return Err(RelayError::Config {
                reason: format!(
                    "anchor is for node '{}', exporter is '{}'",
                    anchor.node_id, self.node.node_id
                ),
            });
        }
        if anchor.last_seq != expected_seq || anchor.last_hash.as_deref() != expected_hash {
            warn!(
                node_id = %self.node.node_id,
                receiver_seq = anchor.last_seq,
                exported_seq = expected_seq,
                "receiver anchor does not match export state"
            );
            return Err(RelayError::ExportAnchorMismatch {
                node_id: self.node.node_id.clone(),
                receiver_seq: anchor.last_seq,
                receiver_hash: anchor.last_hash.clone().unwrap_or_else(|| "null".to_string()),
                exported_seq: expected_seq,
                exported_hash: expected_hash.unwrap_or("null").to_string(),
            });
        }
        Ok(())
    }

    fn wrap(&self, event: &LocalEvent, seq: i64, prev_hash: Option<String>) -> Envelope {
        let payload = json!({
            "event_type": event.event_type,
            "timestamp": event.timestamp,
            "summary": event.summary,
            "tags": event.tags,
        });
        let captured_at = parse_timestamp(&event.timestamp);
        if captured_at.is_none() {
            warn!(seq, timestamp = %event.timestamp, "event timestamp unreadable; capturing at export time");
        }

        create_envelope(
            &self.node.node_id,
            seq,
            &event.event_type,
            payload,
            &self.node.collector_version,
            EnvelopeOptions {
                node_name: self.node.node_name.clone(),
                prev_hash,
                captured_at,
            },
        )
    }

    /// Node identity and export counters.  Reads only.
    pub fn get_export_status(&self) -> RelayResult<ExportStatus> {
        let state = self.load_state()?;
        Ok(ExportStatus {
            node_id: self.node.node_id.clone(),
            node_name: self.node.node_name.clone(),
            collector_version: self.node.collector_version.clone(),
            last_exported_seq: state.last_exported_seq,
            last_exported_event_count: state.last_exported_event_count,
            last_exported_hash: state.last_exported_hash,
            last_export_at: state.last_export_at,
            total_exports: state.total_exports,
        })
    }
}

/// The last `n` of `events`.
fn newest(events: &[LocalEvent], n: usize) -> &[LocalEvent] {
    &events[events.len().saturating_sub(n)..]
}
