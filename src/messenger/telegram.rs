//! Telegram Bot API client.
//!
//! A thin reqwest client over the handful of Bot API methods the bridge
//! needs: forum topic management, sending into topics, and long-polling
//! `getUpdates`. Response envelopes are decoded into typed structs; an
//! `ok: false` envelope surfaces the API's own description.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Messenger, Update};
use crate::constants::HTTP_REQUEST_TIMEOUT;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Bot API client for one bot identity, bound to one group chat.
#[derive(Debug, Clone)]
pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: i64,
}

/// Standard Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ForumTopic {
    message_thread_id: i64,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: i64,
    #[serde(default)]
    message_thread_id: Option<i64>,
    #[serde(default)]
    from: Option<RawUser>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    reply_to_message: Option<RawReply>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    message_id: i64,
}

impl TelegramBot {
    /// Creates a client for `token`, posting into `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: String, chat_id: i64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: TELEGRAM_API.to_string(),
            token,
            chat_id,
        })
    }

    /// Points the client at a different API host. Used by tests to talk
    /// to a local mock server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("{method} failed: HTTP {status}");
        }

        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.ok {
            anyhow::bail!(
                "{method} rejected: {}",
                envelope.description.unwrap_or_else(|| "unknown".to_string())
            );
        }
        envelope
            .result
            .ok_or_else(|| anyhow::anyhow!("{method} returned an empty result"))
    }

    async fn send_with(&self, topic_id: i64, text: &str, parse_mode: Option<&str>) -> Result<i64> {
        let mut body = json!({
            "chat_id": self.chat_id,
            "message_thread_id": topic_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode);
        }
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn create_topic(&self, title: &str) -> Result<i64> {
        let topic: ForumTopic = self
            .call(
                "createForumTopic",
                json!({"chat_id": self.chat_id, "name": title}),
            )
            .await?;
        Ok(topic.message_thread_id)
    }

    async fn close_topic(&self, topic_id: i64) -> Result<()> {
        let _: Value = self
            .call(
                "closeForumTopic",
                json!({"chat_id": self.chat_id, "message_thread_id": topic_id}),
            )
            .await?;
        Ok(())
    }

    async fn send(&self, topic_id: i64, text: &str) -> Result<i64> {
        self.send_with(topic_id, text, None).await
    }

    async fn send_html(&self, topic_id: i64, text: &str) -> Result<i64> {
        self.send_with(topic_id, text, Some("HTML")).await
    }

    async fn poll_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let raw: Vec<RawUpdate> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        Ok(raw.into_iter().map(convert_update).collect())
    }
}

/// Flatten a raw update into the bridge's [`Update`] shape. Events
/// without a text message keep their `update_id` (so polling can advance)
/// but carry empty text, which the inbound handler ignores.
fn convert_update(raw: RawUpdate) -> Update {
    let Some(message) = raw.message else {
        return Update {
            update_id: raw.update_id,
            ..Update::default()
        };
    };

    Update {
        update_id: raw.update_id,
        message_id: message.message_id,
        thread_id: message.message_thread_id,
        sender_id: message.from.map_or(0, |u| u.id),
        text: message.text.unwrap_or_default(),
        reply_to_message_id: message.reply_to_message.map(|r| r.message_id),
    }
}
