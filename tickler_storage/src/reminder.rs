use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use tickler_models::{
    chrono::{DateTime, Utc},
    reminder::{Reminder, ReminderId, RuleError},
};

use crate::NewReminder;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Reminder {0} does not exist")]
    NotFound(ReminderId),

    #[error(transparent)]
    CorruptRecord(#[from] CorruptRecord),
}

/// A stored row whose rule no longer satisfies the rule invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Reminder {id} is stored with an invalid rule: {source}")]
pub struct CorruptRecord {
    pub id: ReminderId,
    #[source]
    pub source: RuleError,
}

/// A row of a bulk read. Rows that fail to decode are reported one by one
/// instead of failing the whole read.
pub type StoredReminder = Result<Reminder, CorruptRecord>;

/// Key-indexed table of reminder records.
///
/// `get_all` and the snapshots published through `subscribe` are ordered by
/// `next_occurrence`, unset values first, ties broken by id. Both leave out
/// rows that fail to decode.
#[async_trait]
pub trait ReminderStorage: Send + Sync {
    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StorageError>;
    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError>;
    async fn get_enabled(&self) -> Result<Vec<StoredReminder>, StorageError>;
    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError>;
    async fn upsert(&self, reminder: Reminder) -> Result<Reminder, StorageError>;
    /// Deleting an id that does not exist is a no-op.
    async fn delete(&self, id: ReminderId) -> Result<(), StorageError>;
    async fn set_enabled(&self, id: ReminderId, is_enabled: bool) -> Result<(), StorageError>;
    async fn set_next_occurrence(
        &self,
        id: ReminderId,
        next_occurrence: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    /// Observable sequence of the whole table, refreshed after every write.
    fn subscribe(&self) -> watch::Receiver<Vec<Reminder>>;
}

pub(crate) fn sort_for_display(reminders: &mut [Reminder]) {
    reminders.sort_by_key(|reminder| (reminder.next_occurrence, reminder.id));
}
