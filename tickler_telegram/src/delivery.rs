use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use teloxide::{prelude::*, types::MessageId};
use thiserror::Error;
use tokio::sync::Mutex;

use tickler_scheduler::{Notification, NotificationChannel, Notifier, fire::NotifierResult};

#[derive(Debug, Error)]
pub enum TelegramNotifierError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error("Notification channel {0} was never created")]
    UnknownChannel(String),
}

/// Delivers notifications as messages to a single Telegram chat.
///
/// Telegram has no notion of channels, so they are only tracked locally.
/// Showing a notification whose id was already delivered deletes the previous
/// message before sending the new one.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    channels: Mutex<HashSet<String>>,
    sent: Mutex<HashMap<i64, MessageId>>,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
            channels: Mutex::new(HashSet::new()),
            sent: Mutex::new(HashMap::new()),
        }
    }

    async fn replace(&self, notification: &Notification) -> Result<(), TelegramNotifierError> {
        let mut sent = self.sent.lock().await;

        if let Some(previous) = sent.remove(&notification.id) {
            if let Err(e) = self.bot.delete_message(self.chat_id, previous).await {
                log::warn!(
                    "Could not delete previous reminder message. [notification_id = {}, error = {e}]",
                    notification.id
                );
            }
        }

        let message = self
            .bot
            .send_message(self.chat_id, message_text(notification))
            .await?;
        sent.insert(notification.id, message.id);

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn ensure_channel(&self, channel: &NotificationChannel) -> NotifierResult {
        if self.channels.lock().await.insert(channel.id.clone()) {
            log::debug!("Registered Telegram notification channel {}", channel.id);
        }
        Ok(())
    }

    async fn show(&self, notification: Notification) -> NotifierResult {
        if !self.channels.lock().await.contains(&notification.channel_id) {
            return Err(TelegramNotifierError::UnknownChannel(notification.channel_id).into());
        }

        self.replace(&notification).await?;
        log::info!(
            "Sent reminder {} to Telegram chat {}",
            notification.reminder_id,
            self.chat_id.0
        );
        Ok(())
    }
}

fn message_text(notification: &Notification) -> String {
    format!("🔔 {}\n{}", notification.title, notification.body)
}
