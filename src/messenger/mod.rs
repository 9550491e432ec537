//! Chat transport abstraction.
//!
//! The bridge core talks to the chat service through the [`Messenger`]
//! trait - one instance per harness identity, so each agent kind posts
//! under its own bot. The production implementation is
//! [`telegram::TelegramBot`]; tests substitute scripted mocks.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

pub use telegram::TelegramBot;

/// One inbound chat event.
///
/// Updates that carry no usable text still appear in the poll result (with
/// an empty `text`) so the consumer can advance its offset past them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Monotonic poll cursor assigned by the transport.
    pub update_id: i64,
    /// Id of the message, for reply bookkeeping.
    pub message_id: i64,
    /// Topic (sub-channel) the message was posted in, when any.
    pub thread_id: Option<i64>,
    /// Sender identity, for the single-owner gate.
    pub sender_id: i64,
    /// Message text; empty for non-text events.
    pub text: String,
    /// Id of the message this one replies to, when any.
    pub reply_to_message_id: Option<i64>,
}

/// Outbound chat capability for one bot identity.
///
/// All methods are best-effort at the call site: the bridge contains
/// failures per message/tab and relies on the next tick as the retry
/// mechanism.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Create a sub-channel (forum topic) in the group. Returns its id.
    async fn create_topic(&self, title: &str) -> Result<i64>;

    /// Close a sub-channel. Best effort.
    async fn close_topic(&self, topic_id: i64) -> Result<()>;

    /// Send plain text into a sub-channel. Returns the sent message id.
    async fn send(&self, topic_id: i64, text: &str) -> Result<i64>;

    /// Send HTML-formatted text into a sub-channel.
    async fn send_html(&self, topic_id: i64, text: &str) -> Result<i64>;

    /// Long-poll for inbound events at `offset`.
    async fn poll_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>>;
}

/// Escape text for inclusion in an HTML-formatted message.
#[must_use]
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
