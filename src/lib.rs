//! Panegram - wezterm ↔ Telegram bridge for AI coding agents.
//!
//! Each wezterm tab gets one Telegram forum topic (named after the tab).
//! Multiple harnesses (Claude, Codex) share the topic but post via their
//! own bot identity; replies in the topic route back to the pane that
//! produced the replied-to message.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────────────┐
//!            │       Bridge         │
//!            │  - Owns all state    │
//!            │  - Runs tick loop    │
//!            └──────────┬───────────┘
//!                       │
//!        ┌──────────────┼──────────────┐
//!        │              │              │
//!        ▼              ▼              ▼
//!   PaneController   Harness       Messenger
//!   (wezterm cli)    (sessions)    (Telegram)
//! ```
//!
//! # Modules
//!
//! - [`bridge`] - discovery, topic sync, tailing and routing
//! - [`harness`] - agent kinds, session lookup, record formatting
//! - [`messenger`] - chat transport trait and the Telegram client
//! - [`wezterm`] - multiplexer trait and the wezterm CLI controller
//! - [`config`] - configuration loading/saving

pub mod bridge;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod harness;
pub mod messenger;
pub mod state;
pub mod wezterm;

// Re-export commonly used types
pub use bridge::Bridge;
pub use config::Config;
pub use harness::{HarnessKind, HarnessRegistry, SessionRef};
pub use messenger::{Messenger, TelegramBot, Update};
pub use state::StateStore;
pub use wezterm::{PaneController, PaneInfo, WeztermController};
