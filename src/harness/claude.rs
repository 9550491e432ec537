//! Claude session discovery and record formatting.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::SessionRef;

/// Claude flattens the working directory into a project directory name.
pub(crate) fn project_dir(root: &Path, cwd: &str) -> PathBuf {
    root.join(cwd.replace('/', "-"))
}

/// Most recently modified `*.jsonl` session in the project directory.
pub(crate) fn find_session(root: &Path, cwd: &str) -> Option<SessionRef> {
    let dir = project_dir(root, cwd);
    let entries = std::fs::read_dir(dir).ok()?;

    let mut best: Option<SessionRef> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "jsonl") {
            continue;
        }
        let Some(candidate) = SessionRef::from_path(path) else {
            continue;
        };
        match &best {
            Some(current) if current.mtime >= candidate.mtime => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Render an assistant record as display text.
///
/// Text blocks pass through; tool invocations collapse to a one-line tag
/// so the chat shows what the agent is doing without flooding the topic.
pub(crate) fn format_record(record: &Value) -> Option<String> {
    if record.get("type").and_then(Value::as_str) != Some("assistant") {
        return None;
    }

    let content = record
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)?;

    let mut parts = Vec::new();
    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Some("tool_use") => {
                let name = block.get("name").and_then(Value::as_str).unwrap_or("?");
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                parts.push(format_tool_use(name, &input));
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn format_tool_use(name: &str, input: &Value) -> String {
    let str_field = |key: &str| input.get(key).and_then(Value::as_str).unwrap_or_default();

    match name {
        "Read" | "Glob" | "Grep" => {
            let target = [str_field("file_path"), str_field("pattern"), str_field("path")]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or_default();
            format!("[{name}: {target}]")
        }
        "Edit" | "Write" => {
            let path = input
                .get("file_path")
                .and_then(Value::as_str)
                .unwrap_or("?");
            format!("[{name}: {path}]")
        }
        "Bash" => {
            let command: String = str_field("command").chars().take(80).collect();
            format!("[$ {command}]")
        }
        "Task" => {
            let description = input
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("?");
            format!("[Task: {description}]")
        }
        _ => format!("[{name}]"),
    }
}
