//! Alert delivery
//!
//! A [`Notifier`] broadcasts text to every selected recipient and returns a
//! handle per delivered copy so the message can be edited later. Delivery is
//! sequential and best-effort: a failed recipient is logged and skipped.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration as StdDuration;
use tracing::{error, info};

use crate::config::TelegramConfig;
use crate::error::NotifyError;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Reference to one delivered copy of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    pub recipient_id: String,
    pub message_id: i64,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to every recipient selected by `instrument`
    ///
    /// Returns handles for the copies that were delivered.
    async fn broadcast(&self, text: &str, instrument: Option<&str>) -> Vec<MessageHandle>;

    /// Replace the text of an already delivered message
    async fn edit_message(
        &self,
        recipient_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotifyError>;
}

/// Recipients of a broadcast, subscribers first
///
/// Subscribers receive a message when it has no instrument or when they
/// subscribed to it. Fallback recipients without a stored preference
/// receive everything.
pub fn select_recipients(config: &TelegramConfig, instrument: Option<&str>) -> Vec<String> {
    let mut subscribers: BTreeSet<&String> = BTreeSet::new();
    for (chat_id, preferences) in &config.subscriptions {
        let wants = match instrument {
            None => true,
            Some(symbol) => preferences.iter().any(|p| p == symbol),
        };
        if wants {
            subscribers.insert(chat_id);
        }
    }

    let mut recipients: Vec<String> = subscribers.into_iter().cloned().collect();
    for chat_id in &config.fallback_chat_ids {
        if !config.subscriptions.contains_key(chat_id) && !recipients.contains(chat_id) {
            recipients.push(chat_id.clone());
        }
    }
    recipients
}

/// Send to each recipient in order, keeping the handles that were delivered
///
/// A failed recipient is logged and the remaining ones are still tried.
pub async fn deliver_each<F, Fut>(recipients: Vec<String>, mut send: F) -> Vec<MessageHandle>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<MessageHandle, NotifyError>>,
{
    let mut handles = Vec::with_capacity(recipients.len());
    for chat_id in recipients {
        let target = chat_id.clone();
        match send(chat_id).await {
            Ok(handle) => handles.push(handle),
            Err(e) => error!("Failed to send to {}: {}", target, e),
        }
    }
    handles
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
}

/// Telegram Bot API notifier
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    token: String,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .context("TELEGRAM_TOKEN is not set")?;
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(TelegramNotifier {
            client,
            token,
            config,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", TELEGRAM_API_BASE, self.token, method)
    }

    /// Forum thread for `chat_id`, set only for the report group
    fn thread_for(&self, chat_id: &str) -> Option<i64> {
        match &self.config.report_group_id {
            Some(group) if group.trim() == chat_id.trim() => self.config.thread_id,
            _ => None,
        }
    }

    async fn send(&self, chat_id: &str, text: &str) -> Result<MessageHandle, NotifyError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            message_thread_id: self.thread_for(chat_id),
        };

        let response: TelegramResponse<SentMessage> = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        match response {
            TelegramResponse {
                ok: true,
                result: Some(sent),
                ..
            } => Ok(MessageHandle {
                recipient_id: chat_id.to_string(),
                message_id: sent.message_id,
            }),
            other => Err(NotifyError::Rejected {
                chat_id: chat_id.to_string(),
                description: other.description.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn broadcast(&self, text: &str, instrument: Option<&str>) -> Vec<MessageHandle> {
        let recipients = select_recipients(&self.config, instrument);
        info!(
            "Broadcasting to {} recipients ({})",
            recipients.len(),
            instrument.unwrap_or("general")
        );

        deliver_each(recipients, move |chat_id| async move {
            self.send(&chat_id, text).await
        })
        .await
    }

    async fn edit_message(
        &self,
        recipient_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotifyError> {
        let request = EditMessageRequest {
            chat_id: recipient_id,
            message_id,
            text,
        };

        let response: TelegramResponse<serde_json::Value> = self
            .client
            .post(self.method_url("editMessageText"))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if response.ok {
            Ok(())
        } else {
            Err(NotifyError::Rejected {
                chat_id: recipient_id.to_string(),
                description: response.description.unwrap_or_default(),
            })
        }
    }
}

/// Notifier that only logs, used when no Telegram token is configured
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn broadcast(&self, text: &str, instrument: Option<&str>) -> Vec<MessageHandle> {
        info!(
            "[dry-run] broadcast ({}):\n{}",
            instrument.unwrap_or("general"),
            text
        );
        Vec::new()
    }

    async fn edit_message(
        &self,
        recipient_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotifyError> {
        info!(
            "[dry-run] edit {}/{}:\n{}",
            recipient_id, message_id, text
        );
        Ok(())
    }
}
