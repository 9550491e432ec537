//! Harness registry - which agent kinds the bridge knows how to follow.
//!
//! A harness is one kind of AI coding agent, identified by its own session
//! log format and its own outbound chat identity. The set of harnesses is
//! fixed at deployment, so dispatch is a `match` over [`HarnessKind`]
//! rather than an open-ended registration table.
//!
//! # Session discovery
//!
//! Each kind knows how to locate the session log for a working directory:
//!
//! - **Claude** keeps per-project directories under `~/.claude/projects`,
//!   named by flattening the cwd, each holding `*.jsonl` session files.
//! - **Codex** shards rollout files by date under `~/.codex/sessions`;
//!   the owning cwd is recorded in each file's first line, so the registry
//!   maintains a periodically refreshed rollout → cwd index.

mod claude;
mod codex;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use serde_json::Value;

use crate::constants::ROLLOUT_INDEX_TTL;

/// The agent kinds this bridge can follow. Fixed at deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarnessKind {
    /// Claude Code sessions under `~/.claude/projects`.
    Claude,
    /// Codex CLI rollout sessions under `~/.codex/sessions`.
    Codex,
}

impl HarnessKind {
    /// Short lowercase name used in logs and the `/list` rendering.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
        }
    }

    /// Convert one raw session-log record into display text.
    ///
    /// Returns `None` for records that should not be surfaced (tool
    /// results, metadata, user turns). Pure; never fails - an unexpected
    /// shape is just a `None`.
    #[must_use]
    pub fn format_record(self, record: &Value) -> Option<String> {
        match self {
            Self::Claude => claude::format_record(record),
            Self::Codex => codex::format_record(record),
        }
    }
}

/// A located session log: stable path plus the size and mtime observed at
/// lookup time. Only ever used to detect "new session" vs "more data".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    /// Stable locator for the log file.
    pub path: PathBuf,
    /// Modification time at lookup, for most-recent selection.
    pub mtime: SystemTime,
    /// Size in bytes at lookup, for end-of-file seeks.
    pub size: u64,
}

impl SessionRef {
    /// Build a ref by statting `path`. `None` when the file vanished.
    pub(crate) fn from_path(path: PathBuf) -> Option<Self> {
        let meta = std::fs::metadata(&path).ok()?;
        let mtime = meta.modified().ok()?;
        Some(Self {
            path,
            mtime,
            size: meta.len(),
        })
    }
}

/// The configured harness set plus the filesystem roots they search.
///
/// Construction happens once at startup; lookups take `&self` so
/// concurrent tail reads can share one registry behind an `Arc`.
#[derive(Debug)]
pub struct HarnessRegistry {
    kinds: Vec<HarnessKind>,
    claude_root: PathBuf,
    codex_root: PathBuf,
    rollout_index: Mutex<codex::RolloutIndex>,
}

impl HarnessRegistry {
    /// Creates a registry for `kinds`, searching the default per-user
    /// session roots.
    #[must_use]
    pub fn new(kinds: Vec<HarnessKind>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_roots(
            kinds,
            home.join(".claude/projects"),
            home.join(".codex/sessions"),
        )
    }

    /// Creates a registry with explicit session roots. Used by tests to
    /// point discovery at fixture directories.
    #[must_use]
    pub fn with_roots(kinds: Vec<HarnessKind>, claude_root: PathBuf, codex_root: PathBuf) -> Self {
        Self {
            kinds,
            claude_root,
            codex_root,
            rollout_index: Mutex::new(codex::RolloutIndex::default()),
        }
    }

    /// Configured kinds, in preference order (primary first).
    #[must_use]
    pub fn kinds(&self) -> &[HarnessKind] {
        &self.kinds
    }

    /// Whether `kind` is configured.
    #[must_use]
    pub fn contains(&self, kind: HarnessKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// The primary harness (topic management and notices go through its
    /// identity).
    #[must_use]
    pub fn primary(&self) -> HarnessKind {
        self.kinds[0]
    }

    /// Locate the current session log of `kind` for a working directory.
    ///
    /// Picks the most recently modified candidate. `None` means the agent
    /// has not started (or its directory no longer matches) - not an
    /// error.
    #[must_use]
    pub fn find_session(&self, kind: HarnessKind, cwd: &str) -> Option<SessionRef> {
        match kind {
            HarnessKind::Claude => claude::find_session(&self.claude_root, cwd),
            HarnessKind::Codex => {
                let mut index = self
                    .rollout_index
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                index.refresh_if_stale(&self.codex_root, ROLLOUT_INDEX_TTL);
                index.find_session(cwd)
            }
        }
    }
}

/// Path of the Claude project directory for a working directory.
///
/// Exposed for tests that build fixture trees.
#[must_use]
pub fn claude_project_dir(root: &Path, cwd: &str) -> PathBuf {
    claude::project_dir(root, cwd)
}
