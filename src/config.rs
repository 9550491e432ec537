//! Configuration loading and persistence.
//!
//! Handles reading and writing the panegram configuration file.
//! Bot tokens are never written to disk; they are supplied through the
//! environment only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf};

use crate::constants::DEFAULT_POLL_INTERVAL_SECS;

/// Configuration for the panegram daemon.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Telegram forum group chat id the bridge posts into.
    pub chat_id: i64,
    /// Telegram user id allowed to drive the bridge. 0 disables the lock.
    #[serde(default)]
    pub owner: i64,
    /// Interval in seconds between sync ticks.
    pub poll_interval: u64,
    /// Location of the durable tab→topic state file.
    pub state_file: PathBuf,
    /// Bot token for the Claude identity - NOT serialized to disk.
    #[serde(skip)]
    pub claude_token: String,
    /// Bot token for the Codex identity - NOT serialized to disk.
    /// Empty means the Codex harness is disabled.
    #[serde(skip)]
    pub codex_token: String,
}

impl Default for Config {
    fn default() -> Self {
        let state_file = dirs::config_dir()
            .map(|d| d.join("panegram/state.json"))
            .unwrap_or_else(|| PathBuf::from("panegram-state.json"));

        Self {
            chat_id: 0,
            owner: 0,
            poll_interval: DEFAULT_POLL_INTERVAL_SECS,
            state_file,
            claude_token: String::new(),
            codex_token: String::new(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `PANEGRAM_CONFIG_DIR` overrides the platform config dir, which is
    /// what the integration tests use to stay inside a tempdir.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("PANEGRAM_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("panegram")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| Self::default());
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(chat) = std::env::var("PANEGRAM_CHAT_ID") {
            if let Ok(id) = chat.parse::<i64>() {
                self.chat_id = id;
            }
        }

        if let Ok(owner) = std::env::var("PANEGRAM_OWNER") {
            if let Ok(id) = owner.parse::<i64>() {
                self.owner = id;
            }
        }

        if let Ok(interval) = std::env::var("PANEGRAM_POLL_INTERVAL") {
            if let Ok(secs) = interval.parse::<u64>() {
                self.poll_interval = secs;
            }
        }

        if let Ok(path) = std::env::var("PANEGRAM_STATE_FILE") {
            self.state_file = PathBuf::from(shellexpand::tilde(&path).into_owned());
        }

        if let Ok(token) = std::env::var("PANEGRAM_CLAUDE_TOKEN") {
            self.claude_token = token;
        }

        if let Ok(token) = std::env::var("PANEGRAM_CODEX_TOKEN") {
            self.codex_token = token;
        }
    }

    /// Validates that everything required to start the bridge is present.
    ///
    /// # Errors
    ///
    /// Returns an error when the Claude bot token or the chat id is
    /// missing. These abort startup before the tick loop; a missing Codex
    /// token only disables that harness and is not an error.
    pub fn validate(&self) -> Result<()> {
        if self.claude_token.is_empty() {
            anyhow::bail!("PANEGRAM_CLAUDE_TOKEN is required");
        }
        if self.chat_id == 0 {
            anyhow::bail!("PANEGRAM_CHAT_ID is required (forum group chat id)");
        }
        Ok(())
    }

    /// Persists the current configuration to disk.
    /// Tokens are NOT saved (they are `serde(skip)`).
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}
