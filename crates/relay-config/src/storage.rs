//! The storage context injected into every component that touches disk.
//!
//! Layout under the root:
//!
//! ```text
//! ledger/<node>/ledger.jsonl         append-only envelope lines
//! ledger/<node>/ingest_state.json    IngestState
//! export/<node>/export_state.json    ExportState
//! audit/ingest_audit.jsonl           AuditRecord lines
//! ```
//!
//! `<node>` is the node id with every character outside `[A-Za-z0-9_-]`
//! replaced by `_`.

use std::path::{Path, PathBuf};

/// Resolves every on-disk path from one root directory.
///
/// Cheap to clone.  Two contexts with different roots share nothing, which
/// is what lets tests run isolated stores side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageContext {
    root: PathBuf,
}

impl StorageContext {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent of every per-node ledger directory.
    pub fn ledger_root(&self) -> PathBuf {
        self.root.join("ledger")
    }

    pub fn node_dir(&self, node_id: &str) -> PathBuf {
        self.ledger_root().join(sanitize_node_id(node_id))
    }

    pub fn ledger_path(&self, node_id: &str) -> PathBuf {
        self.node_dir(node_id).join("ledger.jsonl")
    }

    pub fn ingest_state_path(&self, node_id: &str) -> PathBuf {
        self.node_dir(node_id).join("ingest_state.json")
    }

    pub fn export_state_path(&self, node_id: &str) -> PathBuf {
        self.root
            .join("export")
            .join(sanitize_node_id(node_id))
            .join("export_state.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.root.join("audit").join("ingest_audit.jsonl")
    }
}

/// Directory-safe form of a node id.
pub fn sanitize_node_id(node_id: &str) -> String {
    let sanitized: String = node_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
