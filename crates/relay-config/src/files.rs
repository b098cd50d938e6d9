//! File primitives shared by the ledger, audit log, and exporter.
//!
//! - `append_line` writes one complete record with a single append-mode
//!   write, so a reader never sees half of it interleaved with another.  A
//!   fragment left by an earlier crashed write is first closed off with a
//!   newline, so it stays a line of its own.
//! - `write_json_atomic` replaces a whole file through a sibling temp file
//!   and a rename.
//! - `read_lines` separates complete lines from a trailing fragment that has
//!   no terminator yet (a torn tail).
//!
//! Every I/O failure comes back as `RelayError::Storage` naming the path.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use relay_contracts::error::{RelayError, RelayResult};

/// Complete lines of a file plus any unterminated trailing fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineRead {
    pub lines: Vec<String>,
    pub torn_tail: Option<String>,
}

fn ensure_parent(path: &Path) -> RelayResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RelayError::storage(parent, e))?;
    }
    Ok(())
}

const TAIL_CHUNK: u64 = 4096;

/// Append `record` plus a newline to `path` in one write, creating the file
/// and its parent directories if needed.
///
/// When the file does not end in a newline, the write starts with one.
pub fn append_line(path: &Path, record: &[u8]) -> RelayResult<()> {
    ensure_parent(path)?;

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| RelayError::storage(path, e))?;

    let mut buf = Vec::with_capacity(record.len() + 2);
    if !ends_with_newline(&mut file).map_err(|e| RelayError::storage(path, e))? {
        buf.push(b'\n');
    }
    buf.extend_from_slice(record);
    buf.push(b'\n');

    file.write_all(&buf).map_err(|e| RelayError::storage(path, e))?;
    file.sync_data().map_err(|e| RelayError::storage(path, e))?;
    Ok(())
}

/// `true` for an empty file or one whose last byte is `\n`.
fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// The last complete (newline-terminated) line of `path`, reading backwards
/// from the end.  A torn tail after it is ignored.  `None` for a missing
/// file or one with no complete line.
pub fn read_last_line(path: &Path) -> RelayResult<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RelayError::storage(path, e)),
    };
    let len = file.metadata().map_err(|e| RelayError::storage(path, e))?.len();

    let mut start = len;
    let mut buf: Vec<u8> = Vec::new();
    while start > 0 {
        let step = TAIL_CHUNK.min(start);
        start -= step;
        let mut chunk = vec![0u8; step as usize];
        file.seek(SeekFrom::Start(start))
            .and_then(|_| file.read_exact(&mut chunk))
            .map_err(|e| RelayError::storage(path, e))?;
        chunk.extend_from_slice(&buf);
        buf = chunk;

        if let Some(end) = buf.iter().rposition(|b| *b == b'\n') {
            let body = &buf[..end];
            let line = match body.iter().rposition(|b| *b == b'\n') {
                Some(nl) => &body[nl + 1..],
                None if start == 0 => body,
                None => continue,
            };
            let line = String::from_utf8_lossy(line).trim_end_matches('\r').to_string();
            return Ok((!line.trim().is_empty()).then_some(line));
        }
    }
    Ok(None)
}

/// Replace `path` with the pretty JSON form of `value`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> RelayResult<()> {
    ensure_parent(path)?;
    let bytes = serde_json::to_vec_pretty(value).map_err(RelayError::serialization)?;
    write_bytes_atomic(path, &bytes)
}

/// Replace `path` with `bytes` through a temp file and a rename.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> RelayResult<()> {
    ensure_parent(path)?;
    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp).map_err(|e| RelayError::storage(&tmp, e))?;
        file.write_all(bytes).map_err(|e| RelayError::storage(&tmp, e))?;
        file.sync_all().map_err(|e| RelayError::storage(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| RelayError::storage(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a JSON document, or `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> RelayResult<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RelayError::storage(path, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| RelayError::storage(path, format!("corrupt JSON: {e}")))
}

/// Read a line-oriented file.  A missing file reads as empty.
///
/// Blank lines are dropped.  Text after the last newline is returned as
/// `torn_tail` instead of as a line.
pub fn read_lines(path: &Path) -> RelayResult<LineRead> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LineRead::default()),
        Err(e) => return Err(RelayError::storage(path, e)),
    };

    let (complete, tail) = match text.rfind('\n') {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => ("", text.as_str()),
    };

    Ok(LineRead {
        lines: complete
            .split('\n')
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect(),
        torn_tail: (!tail.trim().is_empty()).then(|| tail.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn append_creates_parents_and_terminates_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/log.jsonl");
        append_line(&path, b"{\"n\":1}").unwrap();
        append_line(&path, b"{\"n\":2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"n\":1}\n{\"n\":2}\n");
        let read = read_lines(&path).unwrap();
        assert_eq!(read.lines.len(), 2);
        assert!(read.torn_tail.is_none());
    }

    #[test]
    fn unterminated_fragment_is_reported_as_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "{\"n\":1}\n{\"n\":").unwrap();

        let read = read_lines(&path).unwrap();
        assert_eq!(read.lines, vec!["{\"n\":1}".to_string()]);
        assert_eq!(read.torn_tail.as_deref(), Some("{\"n\":"));
    }

    #[test]
    fn append_after_torn_tail_keeps_the_fragment_on_its_own_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "{\"n\":1}\n{\"n\":").unwrap();

        append_line(&path, b"{\"n\":2}").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"n\":1}\n{\"n\":\n{\"n\":2}\n"
        );
        let read = read_lines(&path).unwrap();
        assert_eq!(read.lines.len(), 3);
        assert_eq!(read.lines[2], "{\"n\":2}");
        assert!(read.torn_tail.is_none());
    }

    #[test]
    fn last_line_skips_torn_tail_and_spans_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        assert!(read_last_line(&path).unwrap().is_none());

        let long = "x".repeat(TAIL_CHUNK as usize * 2 + 17);
        fs::write(&path, format!("first\n{long}\npartial")).unwrap();
        assert_eq!(read_last_line(&path).unwrap().as_deref(), Some(long.as_str()));

        fs::write(&path, "only\n").unwrap();
        assert_eq!(read_last_line(&path).unwrap().as_deref(), Some("only"));

        fs::write(&path, "no terminator").unwrap();
        assert!(read_last_line(&path).unwrap().is_none());
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_lines(&dir.path().join("nope")).unwrap(), LineRead::default());
        let state: Option<Value> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(state.is_none());
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        write_json_atomic(&path, &json!({ "v": 1 })).unwrap();
        write_json_atomic(&path, &json!({ "v": 2 })).unwrap();

        let value: Value = read_json(&path).unwrap().unwrap();
        assert_eq!(value["v"], 2);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn corrupt_json_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let err = read_json::<Value>(&path).unwrap_err();
        assert!(matches!(err, RelayError::Storage { .. }));
    }
}
