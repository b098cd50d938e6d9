//! File-backed per-node ledger store.
//!
//! Each node gets its own directory holding an append-only `ledger.jsonl`
//! (one canonical envelope per line, acceptance order) and an
//! `ingest_state.json`.  Append order for one envelope:
//!
//! 1. take the node's lock
//! 2. load or default the ingest state
//! 3. validate the envelope, its sequence number, and its `prev_hash`
//! 4. append the ledger line
//! 5. persist the updated state
//!
//! A rejection at step 3 touches nothing.  A failure at step 4 or 5 is a
//! hard `RelayError::Storage` returned to the caller.
//!
//! When step 4 succeeded but step 5 failed, the ledger holds one line the
//! state does not record.  The next append for that node finds it at step 2
//! and rolls the state forward before validating, so a retry is seen as the
//! replay it is.  A fragment left by a crash during step 4 is closed off by
//! the next append and skipped by readers; `verify_node_ledger` lists it.

use std::cmp::Reverse;
use std::fs;
use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use relay_config::{
    files::{append_line, read_json, read_last_line, read_lines, write_json_atomic},
    StorageContext,
};
use relay_contracts::{
    envelope::Envelope,
    error::{RelayError, RelayResult},
    ingest::{AppendOutcome, Rejection, MAX_REJECTION_REASONS},
    state::IngestState,
    timestamp::parse_timestamp,
};
use relay_core::{canonicalize, effective_chain_hash, validate_chain, validate_envelope, ChainReport};

use crate::lock::NodeLocks;

/// Result of re-reading and checking one node's stored ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub node_id: String,
    pub entries: usize,
    /// 1-based line numbers that hold no readable envelope.
    pub unreadable_lines: Vec<usize>,
    pub chain: ChainReport,
    /// Disagreements between the ingest state and the ledger tail.
    pub state_issues: Vec<String>,
}

impl LedgerVerification {
    pub fn is_consistent(&self) -> bool {
        self.chain.valid && self.state_issues.is_empty()
    }
}

/// The append-only evidence store for every node this relay has heard from.
///
/// Safe to share across threads behind an `Arc`: appends for the same node
/// are serialized by a per-node lock, appends for different nodes proceed
/// independently.
#[derive(Debug)]
pub struct LedgerStore {
    storage: StorageContext,
    locks: NodeLocks,
    pub(crate) max_rejection_reasons: usize,
}

impl LedgerStore {
    pub fn new(storage: StorageContext) -> Self {
        Self {
            storage,
            locks: NodeLocks::new(),
            max_rejection_reasons: MAX_REJECTION_REASONS,
        }
    }

    /// Lower the cap on reasons carried in batch reports.  Values above
    /// `MAX_REJECTION_REASONS` are clamped to it.
    pub fn with_max_rejection_reasons(mut self, cap: usize) -> Self {
        self.max_rejection_reasons = cap.min(MAX_REJECTION_REASONS);
        self
    }

    pub fn storage(&self) -> &StorageContext {
        &self.storage
    }

    /// Validate `envelope` against the node's stored state and append it.
    ///
    /// The first envelope ever seen for a node may carry any `prev_hash`;
    /// after that `prev_hash` must equal the recorded chain hash.  An absent
    /// `envelope_hash` is computed and written into the stored line.
    pub fn append_envelope(&self, envelope: &Envelope) -> RelayResult<AppendOutcome> {
        let lock = self.locks.for_node(&envelope.node_id)?;
        let _guard = lock.lock().map_err(|e| RelayError::LockPoisoned {
            reason: format!("node '{}': {e}", envelope.node_id),
        })?;

        let node_id = envelope.node_id.as_str();
        let mut state = self
            .load_state(node_id)?
            .unwrap_or_else(|| IngestState::new(node_id));
        self.reconcile_tail(&mut state)?;

        if let Some(rejection) = Self::check(envelope, &state) {
            warn!(node_id, seq = envelope.seq, reason = %rejection, "envelope rejected");
            return Ok(AppendOutcome::Rejected(rejection));
        }

        let chain_hash = effective_chain_hash(envelope);
        let mut stored = envelope.clone();
        stored.envelope_hash = Some(chain_hash.clone());
        let line = canonicalize(&stored.to_value().map_err(RelayError::serialization)?);

        append_line(&self.storage.ledger_path(node_id), &line)?;

        state.last_seq = envelope.seq;
        state.last_hash = Some(chain_hash.clone());
        state.last_ingested_at = Some(Utc::now());
        state.total_envelopes += 1;
        write_json_atomic(&self.storage.ingest_state_path(node_id), &state)?;

        debug!(node_id, seq = envelope.seq, envelope_hash = %chain_hash, "envelope appended");
        Ok(AppendOutcome::Accepted {
            seq: envelope.seq,
            envelope_hash: chain_hash,
        })
    }

    /// Roll `state` forward over a ledger line that was appended but never
    /// recorded in the state file.
    fn reconcile_tail(&self, state: &mut IngestState) -> RelayResult<()> {
        let ledger = self.storage.ledger_path(&state.node_id);
        let Some(line) = read_last_line(&ledger)? else {
            return Ok(());
        };
        let Ok(tail) = serde_json::from_str::<Envelope>(&line) else {
            return Ok(());
        };
        if tail.node_id != state.node_id
            || tail.seq <= state.last_seq
            || (state.last_hash.is_some() && tail.prev_hash != state.last_hash)
        {
            return Ok(());
        }

        let tail_hash = effective_chain_hash(&tail);
        warn!(
            node_id = %state.node_id,
            state_seq = state.last_seq,
            ledger_seq = tail.seq,
            "ingest state behind ledger tail; rolling forward"
        );
        state.last_seq = tail.seq;
        state.last_hash = Some(tail_hash);
        state.total_envelopes += 1;
        write_json_atomic(&self.storage.ingest_state_path(&state.node_id), &*state)
    }

    fn check(envelope: &Envelope, state: &IngestState) -> Option<Rejection> {
        let node_id = envelope.node_id.clone();
        let seq = envelope.seq;

        if state.node_id != envelope.node_id {
            return Some(Rejection::SchemaInvalid {
                node_id,
                seq,
                errors: vec![format!(
                    "node_id shares a storage directory with existing node '{}'",
                    state.node_id
                )],
            });
        }

        let report = validate_envelope(envelope);
        if !report.valid {
            return Some(Rejection::SchemaInvalid {
                node_id,
                seq,
                errors: report.errors,
            });
        }

        if seq <= state.last_seq {
            return Some(Rejection::ReplayOrOutOfOrder {
                node_id,
                seq,
                last_seq: state.last_seq,
            });
        }

        if let Some(expected) = &state.last_hash {
            if envelope.prev_hash.as_ref() != Some(expected) {
                return Some(Rejection::ChainBroken {
                    node_id,
                    seq,
                    expected: Some(expected.clone()),
                    got: envelope.prev_hash.clone(),
                });
            }
        }

        None
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// The node's persisted ingest state, `None` if it has never been ingested.
    ///
    /// This is also the answer to an exporter's "report your last hash"
    /// handshake (see `ChainAnchor`).
    pub fn get_node_state(&self, node_id: &str) -> RelayResult<Option<IngestState>> {
        self.load_state(node_id)
    }

    fn load_state(&self, node_id: &str) -> RelayResult<Option<IngestState>> {
        read_json(&self.storage.ingest_state_path(node_id))
    }

    /// Node ids with persisted state, sorted.
    pub fn get_known_nodes(&self) -> RelayResult<Vec<String>> {
        let root = self.storage.ledger_root();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RelayError::storage(&root, e)),
        };

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RelayError::storage(&root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let state_path = entry.path().join("ingest_state.json");
            if let Some(state) = read_json::<IngestState>(&state_path)? {
                nodes.push(state.node_id);
            }
        }
        nodes.sort();
        Ok(nodes)
    }

    /// Every stored envelope for `node_id`, in append order.
    ///
    /// An unterminated final line is skipped: it is either an append still
    /// in flight or the remains of a crash mid-write.  Complete lines that do
    /// not parse (such a fragment, closed off by a later append) are skipped
    /// with a warning.
    pub fn read_ledger(&self, node_id: &str) -> RelayResult<Vec<Envelope>> {
        Ok(self.scan_ledger(node_id)?.0)
    }

    fn scan_ledger(&self, node_id: &str) -> RelayResult<(Vec<Envelope>, Vec<usize>)> {
        let path = self.storage.ledger_path(node_id);
        let read = read_lines(&path)?;
        if let Some(tail) = &read.torn_tail {
            warn!(node_id, bytes = tail.len(), "skipping unterminated ledger tail");
        }

        let mut envelopes = Vec::with_capacity(read.lines.len());
        let mut unreadable = Vec::new();
        for (i, line) in read.lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(envelope) => envelopes.push(envelope),
                Err(e) => {
                    warn!(node_id, line = i + 1, error = %e, "skipping unreadable ledger line");
                    unreadable.push(i + 1);
                }
            }
        }
        Ok((envelopes, unreadable))
    }

    /// A page of `node_id`'s envelopes in append order.
    pub fn get_node_evidence(
        &self,
        node_id: &str,
        limit: usize,
        offset: usize,
    ) -> RelayResult<Vec<Envelope>> {
        Ok(self
            .read_ledger(node_id)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    /// The `limit` most recent envelopes across all nodes, newest first.
    ///
    /// Purely a read-time view; per-node storage is untouched.  Ties on
    /// capture time are ordered by node id, then seq.
    pub fn get_merged_evidence(&self, limit: usize) -> RelayResult<Vec<Envelope>> {
        let mut merged = Vec::new();
        for node_id in self.get_known_nodes()? {
            merged.extend(self.read_ledger(&node_id)?);
        }

        merged.sort_by_cached_key(|e| {
            let ts = parse_timestamp(&e.captured_at).unwrap_or(DateTime::<Utc>::MIN_UTC);
            (Reverse(ts), e.node_id.clone(), e.seq)
        });
        merged.truncate(limit);
        Ok(merged)
    }

    /// Re-read `node_id`'s ledger, validate it as a chain, and compare its
    /// tail with the stored ingest state.
    pub fn verify_node_ledger(&self, node_id: &str) -> RelayResult<LedgerVerification> {
        let (envelopes, unreadable_lines) = self.scan_ledger(node_id)?;
        let chain = validate_chain(&envelopes);
        let mut state_issues = Vec::new();

        match (self.load_state(node_id)?, envelopes.last()) {
            (None, None) => {}
            (None, Some(_)) => state_issues.push("ledger has entries but no ingest state".to_string()),
            (Some(state), last) => {
                let (tail_seq, tail_hash) = last
                    .map(|e| (e.seq, Some(effective_chain_hash(e))))
                    .unwrap_or((-1, None));
                if state.last_seq != tail_seq {
                    state_issues.push(format!(
                        "state last_seq {} but ledger ends at seq {}",
                        state.last_seq, tail_seq
                    ));
                }
                if state.last_hash != tail_hash {
                    state_issues.push("state last_hash differs from ledger tail hash".to_string());
                }
                if state.total_envelopes != envelopes.len() as u64 {
                    state_issues.push(format!(
                        "state total_envelopes {} but ledger holds {}",
                        state.total_envelopes,
                        envelopes.len()
                    ));
                }
            }
        }

        info!(
            node_id,
            entries = envelopes.len(),
            chain_valid = chain.valid,
            unreadable = unreadable_lines.len(),
            state_issues = state_issues.len(),
            "ledger verified"
        );

        Ok(LedgerVerification {
            node_id: node_id.to_string(),
            entries: envelopes.len(),
            unreadable_lines,
            chain,
            state_issues,
        })
    }
}
