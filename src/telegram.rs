//! Telegram client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

use crate::journal::ReminderDelivery;
use crate::journal::message::html_escape;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send an HTML-formatted message. Returns the new message id.
    pub async fn send_html(&self, chat_id: i64, text: &str) -> Result<i64, String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

#[async_trait]
impl ReminderDelivery for TelegramClient {
    async fn deliver_reminder(&self, chat_id: i64, author_handle: &str) -> Result<(), String> {
        let text = format!("⏰ {}, напоминание!", html_escape(author_handle));
        self.send_html(chat_id, &text).await.map(|_| ())
    }
}
