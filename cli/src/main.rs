//! relay: operator CLI for the node evidence relay
//!
//! Thin front end over the relay crates: ingest a bundle into this node's
//! ledgers, export local events as a bundle for another node, and inspect
//! ledgers, export state, and the ingest audit log.  Every command prints
//! pretty JSON on stdout.
//!
//! Usage:
//!   relay --config relay.toml ingest bundles/evidence_bundle_laptop-001_20240501T120000Z.jsonl
//!   relay --config relay.toml node-state laptop-001 > anchor.json
//!   relay --config relay.toml export --anchor anchor.json
//!   relay merged --limit 20

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use relay_audit::FileAuditLog;
use relay_config::RelayConfig;
use relay_contracts::{
    error::{RelayError, RelayResult},
    ingest::{AuthOutcome, IngestRequest},
    state::{ChainAnchor, IngestState},
};
use relay_export::{read_bundle, verify_bundle, ExportBuilder, JsonlEventSource};
use relay_ledger::{IngestService, LedgerStore};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Append-only evidence relay between nodes.
///
/// Evidence moves between nodes as bundle files.  The receiving node ingests
/// them into per-node hash-chained ledgers; the sending node builds them from
/// its local events.
#[derive(Parser)]
#[command(
    name = "relay",
    about = "Node evidence relay",
    long_about = "Ingests, exports and verifies hash-chained evidence bundles\n\
                  exchanged between nodes."
)]
struct Cli {
    /// TOML configuration file.  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every envelope in a bundle file.
    Ingest {
        bundle: PathBuf,
    },
    /// Export recent local events as a new bundle.
    Export {
        /// How many recent events to consider (default from config).
        #[arg(long)]
        recent: Option<usize>,
        /// Re-export the whole window from seq 0.
        #[arg(long)]
        all: bool,
        /// Receiver state file, as printed by `node-state` on the receiver.
        #[arg(long)]
        anchor: Option<PathBuf>,
    },
    /// Show this node's export counters.
    ExportStatus,
    /// Show the ingest state of one node.  Usable as an export anchor.
    NodeState {
        node_id: String,
    },
    /// List every node with a ledger.
    Nodes,
    /// Page through one node's evidence in ledger order.
    Evidence {
        node_id: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Most recent evidence across all nodes.
    Merged {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Check a bundle file's schema and hash chain.
    VerifyBundle {
        bundle: PathBuf,
    },
    /// Re-verify a node's ledger against its chain and ingest state.
    VerifyLedger {
        node_id: String,
    },
    /// Show the most recent ingest audit records.
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("relay error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> RelayResult<()> {
    let config = load_config(cli.config.as_deref())?;
    let storage = config.storage_context();
    let store = LedgerStore::new(storage.clone())
        .with_max_rejection_reasons(config.ingest.max_rejection_reasons);

    match cli.command {
        Command::Ingest { bundle } => {
            let envelopes = read_bundle(&bundle)?;
            let payload_size = fs::metadata(&bundle)
                .map_err(|e| RelayError::storage(&bundle, e))?
                .len() as usize;
            let service = IngestService::new(
                Arc::new(store),
                Box::new(FileAuditLog::new(&storage)),
            )
            .with_audit_reason_sample(config.ingest.audit_reason_sample);
            let response = service.ingest(&IngestRequest {
                source_addr: format!("file:{}", bundle.display()),
                auth: AuthOutcome::Authenticated,
                envelopes,
                payload_size,
            });
            print_json(&response)
        }
        Command::Export { recent, all, anchor } => {
            let anchor = anchor.as_deref().map(read_anchor).transpose()?;
            let builder = ExportBuilder::new(
                storage,
                config.node.clone(),
                &config.export,
                Box::new(JsonlEventSource::new(&config.export.events_path)),
            );
            let outcome = builder.export(
                recent.unwrap_or(config.export.default_recent_n),
                all,
                anchor.as_ref(),
            )?;
            print_json(&outcome)
        }
        Command::ExportStatus => {
            let builder = ExportBuilder::new(
                storage,
                config.node.clone(),
                &config.export,
                Box::new(JsonlEventSource::new(&config.export.events_path)),
            );
            print_json(&builder.get_export_status()?)
        }
        Command::NodeState { node_id } => {
            let state = store
                .get_node_state(&node_id)?
                .unwrap_or_else(|| IngestState::new(node_id));
            print_json(&state)
        }
        Command::Nodes => print_json(&store.get_known_nodes()?),
        Command::Evidence { node_id, limit, offset } => {
            print_json(&store.get_node_evidence(&node_id, limit, offset)?)
        }
        Command::Merged { limit } => print_json(&store.get_merged_evidence(limit)?),
        Command::VerifyBundle { bundle } => print_json(&verify_bundle(&bundle)?),
        Command::VerifyLedger { node_id } => print_json(&store.verify_node_ledger(&node_id)?),
        Command::Audit { limit } => {
            print_json(&FileAuditLog::new(&storage).read_recent(limit)?)
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> RelayResult<RelayConfig> {
    let config = match path {
        Some(path) => RelayConfig::from_file(path)?,
        None => {
            debug!("no --config given, using defaults");
            RelayConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

/// `node-state` output carries extra fields; only the anchor fields are read.
fn read_anchor(path: &Path) -> RelayResult<ChainAnchor> {
    let raw = fs::read_to_string(path).map_err(|e| RelayError::storage(path, e))?;
    serde_json::from_str(&raw).map_err(|e| RelayError::Config {
        reason: format!("invalid anchor file '{}': {}", path.display(), e),
    })
}

fn print_json<T: Serialize>(value: &T) -> RelayResult<()> {
    let out = serde_json::to_string_pretty(value).map_err(RelayError::serialization)?;
    println!("{}", out);
    Ok(())
}
