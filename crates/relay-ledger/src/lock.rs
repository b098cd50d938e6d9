//! Per-node mutual exclusion for the read-validate-append-write-state unit.
//!
//! Locks are keyed by the sanitized node directory name, not the raw node
//! id, so two ids that share a directory also share a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use relay_config::sanitize_node_id;
use relay_contracts::error::{RelayError, RelayResult};

/// Lazily populated table of one mutex per node directory.
#[derive(Debug, Default)]
pub struct NodeLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NodeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `node_id`'s ledger and state files.
    ///
    /// The table lock is held only long enough to fetch or insert the entry.
    pub fn for_node(&self, node_id: &str) -> RelayResult<Arc<Mutex<()>>> {
        let mut table = self.table.lock().map_err(|e| RelayError::LockPoisoned {
            reason: format!("node lock table: {e}"),
        })?;
        Ok(table.entry(sanitize_node_id(node_id)).or_default().clone())
    }
}
