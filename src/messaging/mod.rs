//! Messaging Adapter: the boundary to the Telegram front end. Only the
//! outbound `send` contract is implemented here -- no interactive menus,
//! keyboards, or command parsing.
//!
//! One `reqwest::Client` held once, a thin wrapper over the bot HTTP API
//! rather than a full bot framework (see DESIGN.md for that dependency
//! trade-off).

use async_trait::async_trait;
use std::time::Duration;

/// Either a tracked subscriber or the configured broadcast channel (spec
/// §4.9 "Recipient is either a subscriber `chatId` or the configured
/// broadcast channel identifier").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    Subscriber(i64),
    Channel(String),
}

impl Recipient {
    fn chat_id(&self) -> String {
        match self {
            Recipient::Subscriber(chat_id) => chat_id.to_string(),
            Recipient::Channel(channel_id) => channel_id.clone(),
        }
    }

    /// `Some(chatId)` only for subscriber recipients -- used by the fan-out
    /// layer to decide whether a `RecipientBlocked` failure should disable
    /// a subscriber's notifications (spec §4.9; a blocked broadcast
    /// channel has no subscriber row to mutate).
    pub fn subscriber_chat_id(&self) -> Option<i64> {
        match self {
            Recipient::Subscriber(chat_id) => Some(*chat_id),
            Recipient::Channel(_) => None,
        }
    }
}

/// Failure modes the caller must distinguish (spec §4.9, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// HTTP 403-class: the recipient has blocked the bot or left the
    /// channel. Policy: disable the subscriber's notifications, no retry.
    RecipientBlocked,
    /// Anything else transient (timeout, 5xx, malformed response).
    /// Policy: log and drop, no retry.
    Transient(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecipientBlocked => write!(f, "recipient blocked"),
            Self::Transient(msg) => write!(f, "transient send failure: {msg}"),
        }
    }
}

impl std::error::Error for SendError {}

/// `send` is fire-and-forget from the caller's perspective but completes
/// before the caller resumes (spec §4.9) -- no background queue in the
/// core, and implementations must bound their own latency so a slow
/// recipient never blocks an ingest shard indefinitely (spec §5).
#[async_trait]
pub trait Messaging: Send + Sync {
    async fn send(&self, recipient: &Recipient, message: &str) -> Result<(), SendError>;
}

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over Telegram's Bot HTTP API `sendMessage` endpoint.
pub struct TelegramClient {
    client: reqwest::Client,
    bot_token: String,
}

impl TelegramClient {
    pub fn new(bot_token: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self { client, bot_token })
    }
}

#[async_trait]
impl Messaging for TelegramClient {
    async fn send(&self, recipient: &Recipient, message: &str) -> Result<(), SendError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = serde_json::json!({
            "chat_id": recipient.chat_id(),
            "text": message,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transient(e.to_string()))?;

        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status.as_u16() == 403 || text.contains("\"error_code\":403") {
            Err(SendError::RecipientBlocked)
        } else {
            Err(SendError::Transient(format!("telegram returned {status}: {text}")))
        }
    }
}

/// In-process `Messaging` test double: records every attempted send and
/// can be told to fail a given recipient with a chosen error, so
/// `alerting` tests don't need a live bot token.
#[cfg(test)]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeMessaging {
        pub sent: Mutex<Vec<(Recipient, String)>>,
        pub blocked: Mutex<std::collections::HashSet<Recipient>>,
    }

    impl FakeMessaging {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn block(&self, recipient: Recipient) {
            self.blocked.lock().insert(recipient);
        }

        pub fn sent_to(&self, recipient: &Recipient) -> usize {
            self.sent.lock().iter().filter(|(r, _)| r == recipient).count()
        }
    }

    #[async_trait]
    impl Messaging for FakeMessaging {
        async fn send(&self, recipient: &Recipient, message: &str) -> Result<(), SendError> {
            if self.blocked.lock().contains(recipient) {
                return Err(SendError::RecipientBlocked);
            }
            self.sent.lock().push((recipient.clone(), message.to_string()));
            Ok(())
        }
    }
}
