//! JSONL-backed local event source.

use std::path::{Path, PathBuf};

use tracing::warn;

use relay_config::files::read_lines;
use relay_contracts::{error::RelayResult, event::LocalEvent};
use relay_core::traits::EventSource;

/// Reads local generic events from a newline-delimited JSON file written by
/// the agents and schedulers running on this node.
///
/// Lines that do not parse as a `LocalEvent` are skipped with a warning:
/// the file belongs to other components and one bad line should not block
/// export of everything else.
#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
}

impl JsonlEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for JsonlEventSource {
    fn recent_events(&self, limit: usize) -> RelayResult<Vec<LocalEvent>> {
        let read = read_lines(&self.path)?;
        let mut events: Vec<LocalEvent> = Vec::with_capacity(read.lines.len());
        for (i, line) in read.lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(path = %self.path.display(), line = i + 1, error = %e, "skipping unreadable event"),
            }
        }
        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }
}
