//! Relay configuration schema.
//!
//! A `RelayConfig` is deserialized from TOML.  Every section and field has a
//! default, so an empty document is a complete configuration.
//!
//! Example:
//! ```toml
//! [storage]
//! root = "/var/lib/relay"
//!
//! [node]
//! node_id = "laptop-001"
//! node_name = "Field laptop"
//!
//! [export]
//! events_path = "/var/lib/agents/events.jsonl"
//! allowed_event_types = ["advisory", "reflection"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use relay_contracts::{
    audit::AUDIT_REASON_SAMPLE,
    error::{RelayError, RelayResult},
    ingest::MAX_REJECTION_REASONS,
};

use crate::storage::StorageContext;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub storage: StorageConfig,
    pub node: NodeConfig,
    pub export: ExportConfig,
    pub ingest: IngestConfig,
}

/// Where ledger, state, audit, and export files live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./relay-data"),
        }
    }
}

/// Identity of the local node when it exports its own evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: String,
    pub node_name: Option<String>,
    pub collector_version: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "local-node".to_string(),
            node_name: None,
            collector_version: concat!("relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Export/bundle builder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// JSONL file of local generic events.
    pub events_path: PathBuf,
    /// Directory bundles are written to.
    pub bundle_dir: PathBuf,
    /// How many recent events an export looks at when not told otherwise.
    pub default_recent_n: usize,
    /// Event types eligible for export.  Anything else never leaves the node.
    pub allowed_event_types: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("./events.jsonl"),
            bundle_dir: PathBuf::from("./bundles"),
            default_recent_n: 500,
            allowed_event_types: [
                "advisory",
                "reflection",
                "autonomy_decision",
                "observation",
                "session_summary",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Ingest entry point limits.  Each may be lowered but never raised above
/// its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Cap on rejection reasons returned to a caller.
    pub max_rejection_reasons: usize,
    /// Cap on rejection reasons sampled into each audit record.
    pub audit_reason_sample: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_rejection_reasons: MAX_REJECTION_REASONS,
            audit_reason_sample: AUDIT_REASON_SAMPLE,
        }
    }
}

impl RelayConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `RelayError::Config` if the TOML is malformed, does not match
    /// the schema, or fails [`RelayConfig::validate`].
    pub fn from_toml_str(s: &str) -> RelayResult<Self> {
        let config: RelayConfig = toml::from_str(s).map_err(|e| RelayError::Config {
            reason: format!("failed to parse relay TOML: {}", e),
        })?;
        config.validate()?;
        debug!(root = %config.storage.root.display(), node_id = %config.node.node_id, "config loaded");
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML relay configuration.
    pub fn from_file(path: &Path) -> RelayResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RelayError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> RelayResult<()> {
        if self.node.node_id.trim().is_empty() {
            return Err(RelayError::Config {
                reason: "node.node_id must not be empty".to_string(),
            });
        }
        if self.node.collector_version.trim().is_empty() {
            return Err(RelayError::Config {
                reason: "node.collector_version must not be empty".to_string(),
            });
        }
        if self.ingest.max_rejection_reasons > MAX_REJECTION_REASONS {
            return Err(RelayError::Config {
                reason: format!(
                    "ingest.max_rejection_reasons must be at most {}",
                    MAX_REJECTION_REASONS
                ),
            });
        }
        if self.ingest.audit_reason_sample > AUDIT_REASON_SAMPLE {
            return Err(RelayError::Config {
                reason: format!(
                    "ingest.audit_reason_sample must be at most {}",
                    AUDIT_REASON_SAMPLE
                ),
            });
        }
        if self.ingest.audit_reason_sample > self.ingest.max_rejection_reasons {
            return Err(RelayError::Config {
                reason: "ingest.audit_reason_sample must not exceed ingest.max_rejection_reasons"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Storage context rooted at `storage.root`.
    pub fn storage_context(&self) -> StorageContext {
        StorageContext::new(&self.storage.root)
    }
}
