use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use tickler_models::reminder::ReminderId;

use crate::timer::{AlarmReceiver, TimerPayload};

pub const BASE_NOTIFICATION_ID: i64 = 1001;
pub const REMINDER_CHANNEL_ID: &str = "reminders";

const DEFAULT_TITLE: &str = "Reminder";
const DEFAULT_BODY: &str = "It's time to get this done!";

pub type NotifierResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl NotificationChannel {
    pub fn reminders() -> Self {
        Self {
            id: REMINDER_CHANNEL_ID.to_string(),
            name: "Reminders".to_string(),
            description: "Notifications for due reminders".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Stable per reminder. Showing a notification with an id that is already
    /// displayed replaces it.
    pub id: i64,
    pub channel_id: String,
    pub reminder_id: ReminderId,
    pub title: String,
    pub body: String,
}

/// Display facility for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Creates the channel if it does not exist yet.
    async fn ensure_channel(&self, channel: &NotificationChannel) -> NotifierResult;
    async fn show(&self, notification: Notification) -> NotifierResult;
}

pub fn notification_id(reminder_id: ReminderId) -> i64 {
    BASE_NOTIFICATION_ID + reminder_id
}

/// Turns a fired timer payload into a displayed notification.
///
/// A fire is terminal for its registration: the handler never looks at the
/// store and never arms the following occurrence.
pub struct FireHandler {
    notifier: Arc<dyn Notifier>,
    channel: NotificationChannel,
}

impl FireHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            channel: NotificationChannel::reminders(),
        }
    }

    pub async fn handle_fire(&self, payload: TimerPayload) -> NotifierResult {
        self.notifier.ensure_channel(&self.channel).await?;
        let notification = self.build_notification(payload);
        self.notifier.show(notification).await
    }

    fn build_notification(&self, payload: TimerPayload) -> Notification {
        let title = if payload.title.trim().is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            payload.title
        };

        Notification {
            id: notification_id(payload.id),
            channel_id: self.channel.id.clone(),
            reminder_id: payload.id,
            title,
            body: payload
                .description
                .unwrap_or_else(|| DEFAULT_BODY.to_string()),
        }
    }
}

#[async_trait]
impl AlarmReceiver for FireHandler {
    async fn on_alarm(&self, payload: TimerPayload) {
        let reminder_id = payload.id;
        if let Err(e) = self.handle_fire(payload).await {
            log::error!("Failed to display reminder notification. [reminder_id = {reminder_id}, error = {e}]");
        }
    }
}

/// Notifier that writes notifications to the log.
#[derive(Default)]
pub struct LogNotifier {
    channels: Mutex<HashSet<String>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn ensure_channel(&self, channel: &NotificationChannel) -> NotifierResult {
        if self.channels.lock().await.insert(channel.id.clone()) {
            log::info!("Created notification channel {} ({})", channel.id, channel.name);
        }
        Ok(())
    }

    async fn show(&self, notification: Notification) -> NotifierResult {
        log::info!(
            "[{}] #{} {}: {}",
            notification.channel_id,
            notification.id,
            notification.title,
            notification.body
        );
        Ok(())
    }
}
