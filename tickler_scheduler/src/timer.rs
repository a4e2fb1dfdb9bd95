use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use tickler_models::reminder::{Reminder, ReminderId};

/// Data handed back verbatim when an armed timer fires. Captured at arm time,
/// never re-read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerPayload {
    pub id: ReminderId,
    pub title: String,
    pub description: Option<String>,
}

impl From<&Reminder> for TimerPayload {
    fn from(value: &Reminder) -> Self {
        Self {
            id: value.id,
            title: value.title.clone(),
            description: value.description.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArmMode {
    /// Fire at the exact instant, waking the host if needed.
    Exact,
    /// Lower-guarantee registration the facility may deliver late.
    Inexact,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("The timer facility refused the registration")]
    PermissionDenied,

    #[error("The timer facility is unavailable")]
    Unavailable,
}

/// External wake-up facility. At most one registration exists per key.
#[async_trait]
pub trait Timer: Send + Sync {
    /// Registers a wake-up for `key`, atomically replacing any earlier one.
    async fn arm(
        &self,
        key: ReminderId,
        at: DateTime<Utc>,
        payload: TimerPayload,
        mode: ArmMode,
    ) -> Result<(), TimerError>;

    /// Removes the registration for `key`. Does nothing if none exists.
    async fn disarm(&self, key: ReminderId);
}

/// Invoked by the timer facility with the payload supplied at arm time.
#[async_trait]
pub trait AlarmReceiver: Send + Sync {
    async fn on_alarm(&self, payload: TimerPayload);
}
