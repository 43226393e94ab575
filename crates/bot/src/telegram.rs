//! Telegram Bot API transport.
//!
//! Thin wrapper over `sendMessage` and long-poll `getUpdates`. Send failures
//! are classified for the delivery retrier: HTTP 429 carries the
//! `parameters.retry_after` hint from the response body, everything else is
//! a plain failure. Retry policy itself lives in the engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use marquee_common::types::MediaItem;
use marquee_engine::messenger::Messenger;
use marquee_engine::retry::SendError;

use crate::format;

const API_BASE: &str = "https://api.telegram.org";

/// Long-poll window for `getUpdates`.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Headroom on top of the long-poll window before the HTTP request itself
/// is abandoned. The per-client timeout is too short for long polls.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Bot API client bound to one bot token and one announcement chat.
pub struct TelegramBot {
    http: Client,
    token: String,
    chat_id: i64,
    request_emoji: String,
}

impl TelegramBot {
    pub fn new(
        http: Client,
        token: impl Into<String>,
        chat_id: i64,
        request_emoji: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token: token.into(),
            chat_id,
            request_emoji: request_emoji.into(),
        }
    }

    /// The one chat this bot announces to and takes updates from.
    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    /// Send one message to the announcement chat and return its message id.
    ///
    /// One attempt only; the caller decides whether and when to retry based
    /// on the returned classification.
    pub async fn send_message(&self, text: &str, html: bool) -> Result<i64, SendError> {
        let mut payload = json!({
            "chat_id": self.chat_id,
            "text": format::truncate_message(text),
        });
        if html {
            payload["parse_mode"] = json!("HTML");
        }

        let response = self
            .http
            .post(self.endpoint("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::Failed(format!("sendMessage request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(SendError::RateLimited {
                retry_after: retry_after_from_body(&body),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Failed(format!(
                "sendMessage failed: {status} - {body}"
            )));
        }

        let reply: ApiResponse<SentMessage> = response
            .json()
            .await
            .map_err(|e| SendError::Failed(format!("sendMessage returned invalid JSON: {e}")))?;
        match reply.result {
            Some(message) if reply.ok => Ok(message.message_id),
            _ => Err(SendError::Failed(
                reply
                    .description
                    .unwrap_or_else(|| "sendMessage rejected without description".to_string()),
            )),
        }
    }

    /// Long-poll for updates after `offset`.
    ///
    /// Subscribes to messages and reaction changes; reaction updates only
    /// arrive when `message_reaction` is in `allowed_updates`.
    pub async fn get_updates(&self, offset: Option<i64>) -> anyhow::Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": POLL_TIMEOUT.as_secs(),
            "allowed_updates": ["message", "message_reaction"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        let response = self
            .http
            .post(self.endpoint("getUpdates"))
            .timeout(POLL_TIMEOUT + POLL_GRACE)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let reply: ApiResponse<Vec<Update>> = response.json().await?;
        if !reply.ok {
            anyhow::bail!(
                "getUpdates rejected: {}",
                reply
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            );
        }
        Ok(reply.result.unwrap_or_default())
    }
}

#[async_trait]
impl Messenger for TelegramBot {
    async fn send_release(&self, item: &MediaItem) -> Result<i64, SendError> {
        let text = format::announcement(item, &self.request_emoji);
        self.send_message(&text, true).await
    }

    async fn send_text(&self, text: &str) -> Result<i64, SendError> {
        self.send_message(text, false).await
    }
}

/// Pull the wait hint out of a 429 response body.
///
/// Telegram reports it as `parameters.retry_after` in seconds; a missing or
/// malformed hint falls back to one second rather than hammering the API.
fn retry_after_from_body(body: &serde_json::Value) -> Duration {
    body.get("parameters")
        .and_then(|p| p.get("retry_after"))
        .and_then(|v| v.as_u64())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(1))
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// One entry from `getUpdates`.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub message_reaction: Option<MessageReactionUpdated>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// A change to the reaction list on one message.
#[derive(Debug, Deserialize)]
pub struct MessageReactionUpdated {
    pub chat: Chat,
    pub message_id: i64,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub old_reaction: Vec<ReactionType>,
    #[serde(default)]
    pub new_reaction: Vec<ReactionType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactionType {
    Emoji { emoji: String },
    CustomEmoji { custom_emoji_id: String },
    Paid,
    #[serde(other)]
    Unknown,
}
