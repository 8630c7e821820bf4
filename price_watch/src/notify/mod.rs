//! Change notifications
//!
//! Channels implement [`Notifier`]; the [`Dispatcher`] tries every channel and
//! only fails the run when the primary channel or all channels fail.

mod email;
mod telegram;

pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;

use crate::error::{Result, WatchError};
use crate::model::{PriceChange, NO_PRICE};
use async_trait::async_trait;

/// Changes shown per message before the "+N more" suffix
pub const DISPLAY_LIMIT: usize = 10;

/// A delivery channel for change summaries and failure alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify_changes(&self, changes: &[PriceChange]) -> Result<()>;

    async fn notify_failure(&self, message: &str) -> Result<()>;
}

/// Characters Telegram MarkdownV2 reserves outside code spans
const MARKDOWN_RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escapes scraped text for a MarkdownV2 message, inside or outside an entity
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn price_line(old: &str, new: &str) -> String {
    let old = if old.is_empty() { NO_PRICE } else { old };
    let new = if new.is_empty() { NO_PRICE } else { new };
    if old == new {
        escape_markdown(new)
    } else {
        format!("{} → *{}*", escape_markdown(old), escape_markdown(new))
    }
}

/// One MarkdownV2 bullet per change; `None` when neither display string changed
pub fn format_change(change: &PriceChange) -> Option<String> {
    if change.old_public == change.new_public && change.old_reseller == change.new_reseller {
        return None;
    }
    Some(format!(
        "• *{}*\n  Public: {}\n  Reseller: {}",
        escape_markdown(&change.name),
        price_line(&change.old_public, &change.new_public),
        price_line(&change.old_reseller, &change.new_reseller),
    ))
}

/// Summary message for a batch of changes, capped at `limit` entries
pub fn summarize(changes: &[PriceChange], limit: usize) -> Option<String> {
    let lines: Vec<String> = changes.iter().filter_map(format_change).collect();
    if lines.is_empty() {
        return None;
    }

    let mut message = format!("Price changes in {} products:\n\n", lines.len());
    message.push_str(&lines[..lines.len().min(limit)].join("\n\n"));
    if lines.len() > limit {
        message.push_str(&format!("\n\n\\+{} more", lines.len() - limit));
    }
    Some(message)
}

/// Writes summaries to the application log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify_changes(&self, changes: &[PriceChange]) -> Result<()> {
        match summarize(changes, DISPLAY_LIMIT) {
            Some(summary) => log::info!("{}", summary),
            None => log::info!("No price changes to report"),
        }
        Ok(())
    }

    async fn notify_failure(&self, message: &str) -> Result<()> {
        log::error!("Price watch run failed: {}", message);
        Ok(())
    }
}

struct Channel {
    notifier: Box<dyn Notifier>,
    primary: bool,
}

/// Fans notifications out over all configured channels
#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Channel>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel; a failing primary channel fails the dispatch
    pub fn with_channel(mut self, notifier: Box<dyn Notifier>, primary: bool) -> Self {
        self.channels.push(Channel { notifier, primary });
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Deliver `changes` on every channel.
    ///
    /// Errors with [`WatchError::Delivery`] if the primary channel failed or
    /// if no channel succeeded.
    pub async fn dispatch(&self, changes: &[PriceChange]) -> Result<()> {
        let mut delivered = 0usize;
        let mut failures = Vec::new();
        let mut primary_failed = false;

        for channel in &self.channels {
            match channel.notifier.notify_changes(changes).await {
                Ok(()) => {
                    log::info!("Notified {} change(s) via {}", changes.len(), channel.notifier.name());
                    delivered += 1;
                }
                Err(e) => {
                    log::warn!("Notification via {} failed: {}", channel.notifier.name(), e);
                    primary_failed |= channel.primary;
                    let detail = match e {
                        WatchError::Delivery(detail) => detail,
                        other => other.to_string(),
                    };
                    failures.push(format!("{}: {}", channel.notifier.name(), detail));
                }
            }
        }

        if primary_failed || (delivered == 0 && !failures.is_empty()) {
            return Err(WatchError::Delivery(failures.join("; ")));
        }
        Ok(())
    }

    /// Best-effort failure alert on every channel
    pub async fn broadcast_failure(&self, message: &str) {
        for channel in &self.channels {
            if let Err(e) = channel.notifier.notify_failure(message).await {
                log::warn!("Failure alert via {} failed: {}", channel.notifier.name(), e);
            }
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
