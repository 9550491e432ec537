//! Terminal multiplexer access via the wezterm CLI.
//!
//! Pane enumeration and keystroke injection shell out to `wezterm cli`.
//! Every invocation carries a bounded timeout; a missing binary, a hung
//! mux server, or malformed output all degrade to an empty result so a
//! broken multiplexer can never take the bridge down.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::constants::{SEND_INPUT_SUBMIT_DELAY, WEZTERM_CLI_TIMEOUT};

/// One terminal pane as the bridge sees it.
///
/// Ephemeral: rediscovered on every tick, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneInfo {
    /// Opaque pane identifier, stable for the pane's lifetime.
    pub pane_id: u64,
    /// Identifier of the tab grouping this pane.
    pub tab_id: u64,
    /// Display title of the tab (names the chat topic).
    pub tab_title: String,
    /// Display title of the pane (usually the foreground process).
    pub title: String,
    /// Working directory, normalized from wezterm's `file://` URL form.
    pub cwd: String,
}

/// Raw pane entry as emitted by `wezterm cli list --format json`.
#[derive(Debug, Deserialize)]
struct PaneEntry {
    pane_id: u64,
    tab_id: u64,
    #[serde(default)]
    tab_title: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    cwd: String,
}

impl PaneEntry {
    fn into_pane(self) -> PaneInfo {
        PaneInfo {
            pane_id: self.pane_id,
            tab_id: self.tab_id,
            tab_title: self.tab_title,
            title: self.title,
            cwd: normalize_cwd(&self.cwd),
        }
    }
}

/// Capability interface over the terminal multiplexer.
///
/// The bridge core only ever talks to panes through this trait; tests
/// substitute a scripted implementation.
#[async_trait]
pub trait PaneController: Send + Sync {
    /// Enumerate all panes across all tabs. Empty on any failure.
    async fn list_panes(&self) -> Vec<PaneInfo>;

    /// Type `text` into the pane, then submit it with an enter keypress.
    /// Best effort; failures are logged and swallowed.
    async fn send_input(&self, pane_id: u64, text: &str);
}

/// Production [`PaneController`] backed by the `wezterm cli` subprocess.
#[derive(Debug, Clone)]
pub struct WeztermController {
    timeout: Duration,
}

impl Default for WeztermController {
    fn default() -> Self {
        Self {
            timeout: WEZTERM_CLI_TIMEOUT,
        }
    }
}

impl WeztermController {
    /// Creates a controller with the default subprocess timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `wezterm cli <args>` and return stdout, or `None` on any
    /// failure (missing binary, non-zero exit, timeout).
    async fn wezterm(&self, args: &[&str]) -> Option<Vec<u8>> {
        let child = Command::new("wezterm")
            .arg("cli")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) if output.status.success() => Some(output.stdout),
            Ok(Ok(output)) => {
                log::debug!("[wezterm] cli {:?} exited with {}", args, output.status);
                None
            }
            Ok(Err(e)) => {
                log::debug!("[wezterm] cli unavailable: {e}");
                None
            }
            Err(_) => {
                log::warn!("[wezterm] cli {:?} timed out", args);
                None
            }
        }
    }

    /// Run `wezterm cli <args>` feeding `input` to stdin.
    async fn wezterm_with_stdin(&self, args: &[&str], input: &[u8]) -> bool {
        let spawned = Command::new("wezterm")
            .arg("cli")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                log::debug!("[wezterm] cli unavailable: {e}");
                return false;
            }
        };

        let fed = async {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input).await?;
                drop(stdin);
            }
            child.wait().await
        };

        match tokio::time::timeout(self.timeout, fed).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                log::debug!("[wezterm] cli {:?} failed: {e}", args);
                false
            }
            Err(_) => {
                log::warn!("[wezterm] cli {:?} timed out", args);
                false
            }
        }
    }
}

#[async_trait]
impl PaneController for WeztermController {
    async fn list_panes(&self) -> Vec<PaneInfo> {
        let Some(stdout) = self.wezterm(&["list", "--format", "json"]).await else {
            return Vec::new();
        };

        match serde_json::from_slice::<Vec<PaneEntry>>(&stdout) {
            Ok(entries) => entries.into_iter().map(PaneEntry::into_pane).collect(),
            Err(e) => {
                log::warn!("[wezterm] unparsable pane list: {e}");
                Vec::new()
            }
        }
    }

    async fn send_input(&self, pane_id: u64, text: &str) {
        let pane = pane_id.to_string();
        if !self
            .wezterm_with_stdin(&["send-text", "--pane-id", &pane], text.as_bytes())
            .await
        {
            return;
        }

        // Let the paste land before submitting.
        tokio::time::sleep(SEND_INPUT_SUBMIT_DELAY).await;
        self.wezterm_with_stdin(&["send-text", "--pane-id", &pane, "--no-paste"], b"\r")
            .await;
    }
}

/// Normalize the cwd wezterm reports (`file://host/path` with percent
/// escapes) to a plain filesystem path. Anything that is not a file URL
/// passes through unchanged.
pub fn normalize_cwd(cwd: &str) -> String {
    let Some(rest) = cwd.strip_prefix("file://") else {
        return cwd.to_string();
    };

    // Drop the authority (hostname) segment if present.
    let path = match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => return String::new(),
    };

    percent_decode(path)
}

/// Decode `%XX` escapes. Malformed escapes are kept literally.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(byte) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
