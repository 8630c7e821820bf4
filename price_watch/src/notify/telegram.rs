//! Telegram bot channel

use super::{summarize, Notifier, DISPLAY_LIMIT};
use crate::config::TelegramConfig;
use crate::error::{Result, WatchError};
use crate::model::PriceChange;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages to every configured chat through the Bot API
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn send_to(&self, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.config.api_base, self.config.token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "MarkdownV2",
            })
            .send()
            .await?;

        let status = response.status();
        let reply: ApiReply = response.json().await?;
        if !status.is_success() || !reply.ok {
            return Err(WatchError::Delivery(
                reply.description.unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }
        Ok(())
    }

    /// Send to all chats; fails only if no chat accepted the message
    async fn broadcast(&self, text: &str) -> Result<()> {
        let mut errors = Vec::new();
        for chat_id in &self.config.chat_ids {
            match self.send_to(chat_id, text).await {
                Ok(()) => log::info!("Telegram notification sent to {}", chat_id),
                Err(e) => {
                    log::error!("Telegram error for chat_id {}: {}", chat_id, e);
                    errors.push(format!("{}: {}", chat_id, e));
                }
            }
        }

        if !errors.is_empty() && errors.len() == self.config.chat_ids.len() {
            return Err(WatchError::Delivery(errors.join("; ")));
        }
        Ok(())
    }
}

/// Alert body; only `` ` `` and `\` need escaping inside a MarkdownV2 code span
fn failure_text(message: &str) -> String {
    let code = message.replace('\\', "\\\\").replace('`', "\\`");
    format!("*Price watch error:*\n\n`{}`", code)
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify_changes(&self, changes: &[PriceChange]) -> Result<()> {
        match summarize(changes, DISPLAY_LIMIT) {
            Some(text) => self.broadcast(&text).await,
            None => Ok(()),
        }
    }

    async fn notify_failure(&self, message: &str) -> Result<()> {
        self.broadcast(&failure_text(message)).await
    }
}
