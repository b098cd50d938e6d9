//! # relay-config
//!
//! TOML configuration and the explicit storage context for the node
//! evidence relay.
//!
//! There is no process-wide configuration.  Load a [`RelayConfig`], derive a
//! [`StorageContext`] from it, and hand that context to each store's
//! constructor.
//!
//! ```rust,ignore
//! use relay_config::RelayConfig;
//!
//! let config = RelayConfig::from_file(Path::new("relay.toml"))?;
//! let storage = config.storage_context();
//! ```

pub mod config;
pub mod files;
pub mod storage;

pub use config::{ExportConfig, IngestConfig, NodeConfig, RelayConfig, StorageConfig};
pub use storage::{sanitize_node_id, StorageContext};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use relay_contracts::error::RelayError;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.ingest.max_rejection_reasons, 10);
        assert_eq!(config.ingest.audit_reason_sample, 5);
        assert!(config.export.allowed_event_types.contains(&"advisory".to_string()));
    }

    #[test]
    fn full_document_parses() {
        let toml = r#"
            [storage]
            root = "/var/lib/relay"

            [node]
            node_id = "laptop-001"
            node_name = "Field laptop"
            collector_version = "relay/9.9"

            [export]
            events_path = "/tmp/events.jsonl"
            bundle_dir = "/tmp/bundles"
            default_recent_n = 50
            allowed_event_types = ["advisory"]

            [ingest]
            max_rejection_reasons = 8
            audit_reason_sample = 3
        "#;

        let config = RelayConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/relay"));
        assert_eq!(config.node.node_id, "laptop-001");
        assert_eq!(config.node.node_name.as_deref(), Some("Field laptop"));
        assert_eq!(config.export.default_recent_n, 50);
        assert_eq!(config.export.allowed_event_types, vec!["advisory".to_string()]);
        assert_eq!(config.ingest.audit_reason_sample, 3);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = RelayConfig::from_toml_str("[storage\nroot = ").unwrap_err();
        match err {
            RelayError::Config { reason } => assert!(reason.contains("failed to parse")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn empty_node_id_is_rejected() {
        let err = RelayConfig::from_toml_str("[node]\nnode_id = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("node_id"));
    }

    #[test]
    fn reason_caps_cannot_be_raised() {
        let err = RelayConfig::from_toml_str("[ingest]\nmax_rejection_reasons = 50\n").unwrap_err();
        assert!(
            matches!(&err, RelayError::Config { reason } if reason.contains("max_rejection_reasons")),
            "{err:?}"
        );

        let err = RelayConfig::from_toml_str("[ingest]\naudit_reason_sample = 6\n").unwrap_err();
        assert!(
            matches!(&err, RelayError::Config { reason } if reason.contains("audit_reason_sample")),
            "{err:?}"
        );

        let lowered =
            RelayConfig::from_toml_str("[ingest]\nmax_rejection_reasons = 2\naudit_reason_sample = 1\n")
                .unwrap();
        assert_eq!(lowered.ingest.max_rejection_reasons, 2);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = RelayConfig::from_file(Path::new("/nonexistent/relay.toml")).unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
    }

    #[test]
    fn sanitize_replaces_everything_outside_the_safe_set() {
        assert_eq!(sanitize_node_id("laptop-001"), "laptop-001");
        assert_eq!(sanitize_node_id("host.example.com"), "host_example_com");
        assert_eq!(sanitize_node_id("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_node_id("nœud"), "n_ud");
        assert_eq!(sanitize_node_id(""), "_");
    }

    #[test]
    fn storage_paths_hang_off_the_root() {
        let ctx = StorageContext::new("/data");
        assert_eq!(ctx.ledger_path("a.b"), PathBuf::from("/data/ledger/a_b/ledger.jsonl"));
        assert_eq!(
            ctx.ingest_state_path("a.b"),
            PathBuf::from("/data/ledger/a_b/ingest_state.json")
        );
        assert_eq!(
            ctx.export_state_path("a.b"),
            PathBuf::from("/data/export/a_b/export_state.json")
        );
        assert_eq!(ctx.audit_path(), PathBuf::from("/data/audit/ingest_audit.jsonl"));
    }
}
