use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, warn};

use common::NotificationSink;

/// Pushes bot notifications to a single Telegram chat.
///
/// Built without credentials it only logs: delivery is best effort and
/// never fails the caller.
#[derive(Clone)]
pub struct TelegramNotifier {
    target: Option<(Bot, ChatId)>,
}

impl TelegramNotifier {
    pub fn new(token: Option<&str>, chat_id: Option<i64>) -> Self {
        let target = match (token, chat_id) {
            (Some(token), Some(chat_id)) => Some((Bot::new(token), ChatId(chat_id))),
            _ => {
                warn!("Telegram token or chat id not set, notifications disabled");
                None
            }
        };
        Self { target }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send_text(&self, message: &str) {
        let Some((bot, chat_id)) = &self.target else {
            debug!(message, "Telegram disabled, dropping message");
            return;
        };
        if let Err(e) = bot.send_message(*chat_id, message).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram message");
        }
    }

    async fn send_image(&self, bytes: Vec<u8>, caption: &str) {
        let Some((bot, chat_id)) = &self.target else {
            debug!(caption, "Telegram disabled, dropping image");
            return;
        };
        let photo = InputFile::memory(bytes).file_name("chart.png");
        if let Err(e) = bot.send_photo(*chat_id, photo).caption(caption).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram photo");
        }
    }
}
