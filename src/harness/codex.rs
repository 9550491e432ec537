//! Codex session discovery and record formatting.
//!
//! Codex shards rollout logs by date (`YYYY/MM/DD/rollout-*.jsonl`) and
//! records the owning working directory in each file's first line, so
//! matching a pane to a session requires an index over recent rollout
//! files. The index is rebuilt at most once per TTL.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{Datelike, Utc};
use serde_json::Value;

use super::SessionRef;
use crate::constants::ROLLOUT_SCAN_DAYS;

/// Rollout file path → the cwd recorded in its first-line metadata.
#[derive(Debug, Default)]
pub(crate) struct RolloutIndex {
    entries: HashMap<PathBuf, String>,
    refreshed_at: Option<Instant>,
}

impl RolloutIndex {
    /// Rebuild the index when it is older than `ttl`.
    pub(crate) fn refresh_if_stale(&mut self, root: &Path, ttl: Duration) {
        if self
            .refreshed_at
            .is_some_and(|at| at.elapsed() < ttl)
        {
            return;
        }

        self.entries.clear();
        let now = Utc::now();
        for days_ago in 0..ROLLOUT_SCAN_DAYS {
            let day = now - chrono::Duration::days(days_ago);
            let dir = root.join(format!(
                "{:04}/{:02}/{:02}",
                day.year(),
                day.month(),
                day.day()
            ));
            self.scan_day(&dir);
        }
        self.refreshed_at = Some(Instant::now());
    }

    fn scan_day(&mut self, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_rollout_file(&path) || self.entries.contains_key(&path) {
                continue;
            }
            if let Some(cwd) = read_session_cwd(&path) {
                self.entries.insert(path, cwd);
            }
        }
    }

    /// Most recently modified indexed rollout whose recorded cwd matches.
    pub(crate) fn find_session(&self, cwd: &str) -> Option<SessionRef> {
        let mut best: Option<SessionRef> = None;
        for (path, session_cwd) in &self.entries {
            if session_cwd != cwd {
                continue;
            }
            let Some(candidate) = SessionRef::from_path(path.clone()) else {
                continue;
            };
            match &best {
                Some(current) if current.mtime >= candidate.mtime => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

fn is_rollout_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.starts_with("rollout-") && name.ends_with(".jsonl"))
}

/// The cwd recorded in a rollout file's first-line session metadata.
fn read_session_cwd(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut first_line = String::new();
    std::io::BufReader::new(file).read_line(&mut first_line).ok()?;

    let meta: Value = serde_json::from_str(&first_line).ok()?;
    meta.get("payload")
        .and_then(|p| p.get("cwd"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Render a response item as display text.
pub(crate) fn format_record(record: &Value) -> Option<String> {
    if record.get("type").and_then(Value::as_str) != Some("response_item") {
        return None;
    }
    let payload = record.get("payload")?;

    match payload.get("type").and_then(Value::as_str) {
        Some("message") if payload.get("role").and_then(Value::as_str) == Some("assistant") => {
            let blocks = payload.get("content").and_then(Value::as_array)?;
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("output_text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        Some("function_call") => {
            let name = payload.get("name").and_then(Value::as_str).unwrap_or("?");
            let arguments = payload
                .get("arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            if name == "exec_command" {
                if let Ok(args) = serde_json::from_str::<Value>(arguments) {
                    let cmd: String = args
                        .get("cmd")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .chars()
                        .take(80)
                        .collect();
                    return Some(format!("[$ {cmd}]"));
                }
            }
            Some(format!("[{name}]"))
        }
        Some("custom_tool_call") => {
            let name = payload.get("name").and_then(Value::as_str).unwrap_or("?");
            Some(format!("[{name}]"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::SystemTime;

    #[test]
    fn formats_assistant_messages() {
        let record = json!({
            "type": "response_item",
            "payload": {
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "output_text", "text": " done. "},
                    {"type": "reasoning", "text": "hidden"},
                ]
            }
        });
        assert_eq!(format_record(&record).as_deref(), Some("done."));
    }

    #[test]
    fn formats_exec_commands() {
        let record = json!({
            "type": "response_item",
            "payload": {
                "type": "function_call",
                "name": "exec_command",
                "arguments": "{\"cmd\": \"ls -la\"}"
            }
        });
        assert_eq!(format_record(&record).as_deref(), Some("[$ ls -la]"));
    }

    #[test]
    fn falls_back_to_call_name_on_bad_arguments() {
        let record = json!({
            "type": "response_item",
            "payload": {
                "type": "function_call",
                "name": "apply_patch",
                "arguments": "not json"
            }
        });
        assert_eq!(format_record(&record).as_deref(), Some("[apply_patch]"));
    }

    #[test]
    fn formats_custom_tool_calls() {
        let record = json!({
            "type": "response_item",
            "payload": {"type": "custom_tool_call", "name": "browser"}
        });
        assert_eq!(format_record(&record).as_deref(), Some("[browser]"));
    }

    #[test]
    fn skips_other_record_types() {
        assert!(format_record(&json!({"type": "event"})).is_none());
        assert!(format_record(&json!({
            "type": "response_item",
            "payload": {"type": "message", "role": "user", "content": []}
        }))
        .is_none());
    }

    #[test]
    fn index_matches_sessions_by_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let day_dir = tmp.path().join(format!(
            "{:04}/{:02}/{:02}",
            now.year(),
            now.month(),
            now.day()
        ));
        std::fs::create_dir_all(&day_dir).unwrap();

        let meta = |cwd: &str| format!("{{\"payload\":{{\"cwd\":\"{cwd}\"}}}}\n");
        let ours = day_dir.join("rollout-aaa.jsonl");
        let theirs = day_dir.join("rollout-bbb.jsonl");
        std::fs::write(&ours, meta("/srv/app")).unwrap();
        std::fs::write(&theirs, meta("/srv/other")).unwrap();
        // A non-rollout file must be ignored entirely.
        std::fs::write(day_dir.join("notes.jsonl"), meta("/srv/app")).unwrap();

        let mut index = RolloutIndex::default();
        index.refresh_if_stale(tmp.path(), Duration::from_secs(30));

        let found = index.find_session("/srv/app").unwrap();
        assert_eq!(found.path, ours);
        assert!(index.find_session("/srv/missing").is_none());
    }

    #[test]
    fn index_prefers_most_recent_rollout() {
        let tmp = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let day_dir = tmp.path().join(format!(
            "{:04}/{:02}/{:02}",
            now.year(),
            now.month(),
            now.day()
        ));
        std::fs::create_dir_all(&day_dir).unwrap();

        let line = "{\"payload\":{\"cwd\":\"/srv/app\"}}\n";
        let older = day_dir.join("rollout-old.jsonl");
        let newer = day_dir.join("rollout-new.jsonl");
        std::fs::write(&older, line).unwrap();
        std::fs::write(&newer, line).unwrap();

        let past = SystemTime::now() - Duration::from_secs(900);
        std::fs::File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let mut index = RolloutIndex::default();
        index.refresh_if_stale(tmp.path(), Duration::from_secs(30));
        assert_eq!(index.find_session("/srv/app").unwrap().path, newer);
    }
}
