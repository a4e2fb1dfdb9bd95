mod model;

use std::str::FromStr;

use async_trait::async_trait;
use model::ReminderStorageModel;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::{Mutex, watch};

use tickler_models::{
    chrono::{DateTime, Utc},
    reminder::{Reminder, ReminderId},
};

use crate::{
    NewReminder,
    reminder::{ReminderStorage, StorageError, StoredReminder},
};

pub struct SqliteReminderStorage {
    pool: sqlx::SqlitePool,
    updates: watch::Sender<Vec<Reminder>>,
    publish_lock: Mutex<()>,
}

impl SqliteReminderStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        let (updates, _) = watch::channel(Vec::new());
        Self {
            pool,
            updates,
            publish_lock: Mutex::new(()),
        }
    }

    /// Opens (creating if missing) the database and brings its schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let storage = Self::new(pool);
        storage.migrate().await?;
        storage.publish().await;

        Ok(storage)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    // Held across query and send so snapshots go out in write order.
    async fn publish(&self) {
        let _guard = self.publish_lock.lock().await;
        match self.get_all().await {
            Ok(reminders) => {
                self.updates.send_replace(reminders);
            }
            Err(e) => log::warn!("Failed to refresh reminder snapshot. [error = {e}]"),
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<StoredReminder>, StorageError> {
        let reminders = sqlx::query_as::<_, ReminderStorageModel>(query)
            .fetch_all(&self.pool)
            .await?;

        Ok(reminders.into_iter().map(TryInto::try_into).collect())
    }
}

#[async_trait]
impl ReminderStorage for SqliteReminderStorage {
    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StorageError> {
        let reminder = sqlx::query_as::<_, ReminderStorageModel>(
            "SELECT * FROM reminders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reminder.map(Reminder::try_from).transpose()?)
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        let rows = self
            .fetch("SELECT * FROM reminders ORDER BY next_occurrence ASC, id ASC")
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.inspect_err(|e| log::warn!("Skipping unreadable reminder. [error = {e}]"))
                    .ok()
            })
            .collect())
    }

    async fn get_enabled(&self) -> Result<Vec<StoredReminder>, StorageError> {
        self.fetch(
            "SELECT * FROM reminders WHERE is_enabled = 1 ORDER BY next_occurrence ASC, id ASC",
        )
        .await
    }

    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError> {
        let NewReminder {
            title,
            description,
            rule,
        } = reminder;
        let (cycle, day_of_week, day_of_month) = rule.to_parts();

        let created = sqlx::query_as::<_, ReminderStorageModel>(
            "
INSERT INTO reminders (title, description, time_of_day, cycle, day_of_week, day_of_month, is_enabled, next_occurrence)
VALUES (?, ?, ?, ?, ?, ?, 1, NULL)
RETURNING *
",
        )
        .bind(title)
        .bind(description)
        .bind(rule.time().into_time())
        .bind(cycle.as_str())
        .bind(day_of_week.map(i64::from))
        .bind(day_of_month.map(i64::from))
        .fetch_one(&self.pool)
        .await?;

        let created = created.try_into()?;
        self.publish().await;

        Ok(created)
    }

    async fn upsert(&self, reminder: Reminder) -> Result<Reminder, StorageError> {
        let ReminderStorageModel {
            id,
            title,
            description,
            time_of_day,
            cycle,
            day_of_week,
            day_of_month,
            is_enabled,
            next_occurrence,
        } = reminder.into();

        let stored = sqlx::query_as::<_, ReminderStorageModel>(
            "
INSERT INTO reminders (id, title, description, time_of_day, cycle, day_of_week, day_of_month, is_enabled, next_occurrence)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE
SET title = excluded.title,
    description = excluded.description,
    time_of_day = excluded.time_of_day,
    cycle = excluded.cycle,
    day_of_week = excluded.day_of_week,
    day_of_month = excluded.day_of_month,
    is_enabled = excluded.is_enabled,
    next_occurrence = excluded.next_occurrence
RETURNING *
",
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(time_of_day)
        .bind(cycle)
        .bind(day_of_week)
        .bind(day_of_month)
        .bind(is_enabled)
        .bind(next_occurrence)
        .fetch_one(&self.pool)
        .await?;

        let stored = stored.try_into()?;
        self.publish().await;

        Ok(stored)
    }

    async fn delete(&self, id: ReminderId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.publish().await;
        }

        Ok(())
    }

    async fn set_enabled(&self, id: ReminderId, is_enabled: bool) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE reminders SET is_enabled = ? WHERE id = ?")
            .bind(is_enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }

        self.publish().await;
        Ok(())
    }

    async fn set_next_occurrence(
        &self,
        id: ReminderId,
        next_occurrence: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE reminders SET next_occurrence = ? WHERE id = ?")
            .bind(next_occurrence)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }

        self.publish().await;
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Reminder>> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests;
