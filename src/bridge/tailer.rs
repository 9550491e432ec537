//! Per-pane session log tailing.
//!
//! Each matched pane carries a `(session path, byte offset)` cursor. A
//! read returns only complete lines appended since the last read; when
//! the resolved session file changes (agent restarted), the cursor seeks
//! to the new file's end instead of replaying its history.
//!
//! Offsets are strictly per-pane, monotonically non-decreasing for a
//! fixed path, and no byte range is ever read twice. An unterminated
//! trailing line is held back: the offset only ever advances past the
//! last line break, so a line that is still being written is re-read in
//! full on a later tick rather than emitted in pieces.

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use serde_json::Value;

use crate::harness::{HarnessKind, HarnessRegistry};

/// Tail cursor for one pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailPosition {
    /// Session log the cursor points into.
    pub path: PathBuf,
    /// Next byte to read.
    pub offset: u64,
}

/// Everything a tail read needs, snapshotted so reads for distinct panes
/// can run concurrently without touching shared state.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    /// Pane being tailed.
    pub pane_id: u64,
    /// Harness kind claimed for the pane.
    pub kind: HarnessKind,
    /// Pane working directory, for session resolution.
    pub cwd: String,
    /// Cursor from the previous read, if any.
    pub prev: Option<TailPosition>,
}

/// Result of one tail read.
#[derive(Debug)]
pub struct ReadOutcome {
    /// Pane the outcome belongs to.
    pub pane_id: u64,
    /// New cursor to store, or `None` to leave the stored cursor as-is.
    pub pos: Option<TailPosition>,
    /// Formatted display messages, in log order.
    pub messages: Vec<String>,
}

impl ReadOutcome {
    fn unchanged(pane_id: u64) -> Self {
        Self {
            pane_id,
            pos: None,
            messages: Vec::new(),
        }
    }

    fn seek_to(pane_id: u64, path: PathBuf, offset: u64) -> Self {
        Self {
            pane_id,
            pos: Some(TailPosition { path, offset }),
            messages: Vec::new(),
        }
    }
}

/// Read newly appended complete lines for one pane and format them.
///
/// Never fails: a vanished session, an unreadable file, or unparsable
/// records all degrade to fewer (or zero) messages. The next tick is the
/// retry mechanism.
pub fn read_new(registry: &HarnessRegistry, plan: &ReadPlan) -> ReadOutcome {
    let Some(session) = registry.find_session(plan.kind, &plan.cwd) else {
        // Agent not started yet, or the directory no longer matches.
        return ReadOutcome::unchanged(plan.pane_id);
    };

    let prev = match &plan.prev {
        // First sighting: attach at end-of-file, no history replay.
        None => return ReadOutcome::seek_to(plan.pane_id, session.path, session.size),
        Some(prev) => prev,
    };

    if prev.path != session.path {
        // A new session superseded the old one; seek forward, never replay.
        return ReadOutcome::seek_to(plan.pane_id, session.path, session.size);
    }

    if session.size <= prev.offset {
        // No growth. Truncation is not specially detected and reads the
        // same way; the cursor resets when the session file changes.
        return ReadOutcome::unchanged(plan.pane_id);
    }

    let new_bytes = match read_range(&session.path, prev.offset, session.size) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(
                "[tailer] {}/{} read failed: {e}",
                plan.kind.name(),
                plan.pane_id
            );
            return ReadOutcome::unchanged(plan.pane_id);
        }
    };

    // Hold back an unterminated trailing line for a future read.
    let Some(last_break) = new_bytes.iter().rposition(|&b| b == b'\n') else {
        return ReadOutcome::unchanged(plan.pane_id);
    };
    let consumed = last_break + 1;

    let text = String::from_utf8_lossy(&new_bytes[..consumed]);
    let mut records = 0usize;
    let mut messages = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records += 1;
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            // Unparsable lines are skipped, not fatal.
            continue;
        };
        if let Some(formatted) = plan.kind.format_record(&record) {
            messages.push(formatted);
        }
    }

    if records > 0 {
        log::debug!(
            "[tailer] {}/{} read {records} records, {} messages",
            plan.kind.name(),
            plan.pane_id,
            messages.len()
        );
    }

    ReadOutcome {
        pane_id: plan.pane_id,
        pos: Some(TailPosition {
            path: session.path,
            offset: prev.offset + consumed as u64,
        }),
        messages,
    }
}

fn read_range(path: &std::path::Path, from: u64, to: u64) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(from))?;

    let mut buf = Vec::with_capacity((to - from) as usize);
    file.take(to - from).read_to_end(&mut buf)?;
    Ok(buf)
}
