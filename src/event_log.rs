use crate::storage::CmdEvent;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tracing::warn;

/// Read every event from a JSONL log.
///
/// Lines that are not valid events are skipped with a warning; only I/O
/// failures abort the read.
pub fn read_events(path: &Path) -> Result<Vec<CmdEvent>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open events file {}", path.display()))?;
    parse_events(BufReader::new(file), path)
}

/// Like [`read_events`], but a log that does not exist yet reads as empty.
pub fn read_events_or_empty(path: &Path) -> Result<Vec<CmdEvent>> {
    match read_events(path) {
        Err(e) if is_not_found(&e) => Ok(Vec::new()),
        other => other,
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .map_or(false, |e| e.kind() == io::ErrorKind::NotFound)
}

fn parse_events<R: BufRead>(mut reader: R, origin: &Path) -> Result<Vec<CmdEvent>> {
    let mut events = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    // Bytes, not `lines()`: a non-UTF-8 record must not end the read
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("error reading events file {}", origin.display()))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<CmdEvent>(&buf) {
            Ok(event) => events.push(event),
            Err(e) => warn!(
                file = %origin.display(),
                line = line_no,
                error = %e,
                "skipping malformed event line: {}",
                String::from_utf8_lossy(&buf).trim_end()
            ),
        }
    }

    Ok(events)
}

/// Append one event as a single JSON line.
pub fn append_event(path: &Path, event: &CmdEvent) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut line = serde_json::to_string(event)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open events file {}", path.display()))?;
    // One write per record so a crash can only tear the trailing line
    file.write_all(line.as_bytes())
        .with_context(|| format!("failed to append to {}", path.display()))?;
    Ok(())
}
