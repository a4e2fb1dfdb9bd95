use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use tickler_models::{
    chrono::{DateTime, Utc},
    reminder::{Reminder, ReminderId},
};

use crate::{
    NewReminder,
    reminder::{ReminderStorage, StorageError, StoredReminder, sort_for_display},
};

struct InMemoryReminderStore {
    current_id: ReminderId,
    storage: HashMap<ReminderId, Reminder>,
}

impl InMemoryReminderStore {
    fn snapshot(&self) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self.storage.values().cloned().collect();
        sort_for_display(&mut reminders);
        reminders
    }

    fn get_mut(&mut self, id: ReminderId) -> Result<&mut Reminder, StorageError> {
        self.storage.get_mut(&id).ok_or(StorageError::NotFound(id))
    }
}

pub struct InMemoryReminderStorage {
    store: RwLock<InMemoryReminderStore>,
    updates: watch::Sender<Vec<Reminder>>,
}

impl InMemoryReminderStorage {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(Vec::new());
        InMemoryReminderStorage {
            store: RwLock::new(InMemoryReminderStore {
                current_id: 1,
                storage: HashMap::new(),
            }),
            updates,
        }
    }

    fn publish(&self, store: &InMemoryReminderStore) {
        self.updates.send_replace(store.snapshot());
    }
}

impl Default for InMemoryReminderStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderStorage for InMemoryReminderStorage {
    async fn get(&self, id: ReminderId) -> Result<Option<Reminder>, StorageError> {
        let store = self.store.read().await;
        Ok(store.storage.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Reminder>, StorageError> {
        let store = self.store.read().await;
        Ok(store.snapshot())
    }

    async fn get_enabled(&self) -> Result<Vec<StoredReminder>, StorageError> {
        let store = self.store.read().await;
        Ok(store
            .snapshot()
            .into_iter()
            .filter(|reminder| reminder.is_enabled)
            .map(Ok)
            .collect())
    }

    async fn insert(&self, reminder: NewReminder) -> Result<Reminder, StorageError> {
        let mut store = self.store.write().await;
        let id = store.current_id;
        let created = Reminder {
            id,
            title: reminder.title,
            description: reminder.description,
            rule: reminder.rule,
            is_enabled: true,
            next_occurrence: None,
        };

        store.storage.insert(id, created.clone());
        store.current_id += 1;
        self.publish(&store);

        log::debug!("Inserted reminder {id}");
        Ok(created)
    }

    async fn upsert(&self, reminder: Reminder) -> Result<Reminder, StorageError> {
        let mut store = self.store.write().await;
        if reminder.id >= store.current_id {
            store.current_id = reminder.id + 1;
        }

        store.storage.insert(reminder.id, reminder.clone());
        self.publish(&store);

        Ok(reminder)
    }

    async fn delete(&self, id: ReminderId) -> Result<(), StorageError> {
        let mut store = self.store.write().await;
        if store.storage.remove(&id).is_some() {
            self.publish(&store);
        }

        Ok(())
    }

    async fn set_enabled(&self, id: ReminderId, is_enabled: bool) -> Result<(), StorageError> {
        let mut store = self.store.write().await;
        store.get_mut(id)?.is_enabled = is_enabled;
        self.publish(&store);

        Ok(())
    }

    async fn set_next_occurrence(
        &self,
        id: ReminderId,
        next_occurrence: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let mut store = self.store.write().await;
        store.get_mut(id)?.next_occurrence = next_occurrence;
        self.publish(&store);

        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Reminder>> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use tickler_models::{
        chrono::TimeZone,
        reminder::{ReminderRule, ReminderTime},
    };

    use super::*;

    fn new_reminder(title: &str) -> NewReminder {
        NewReminder {
            title: title.to_string(),
            description: None,
            rule: ReminderRule::Daily {
                time: ReminderTime::from_hm(9, 0).unwrap(),
            },
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids_and_enables() {
        let storage = InMemoryReminderStorage::new();

        let first = storage.insert(new_reminder("first")).await.unwrap();
        let second = storage.insert(new_reminder("second")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(first.is_enabled);
        assert_eq!(first.next_occurrence, None);
    }

    #[tokio::test]
    async fn get_enabled_skips_disabled_reminders() {
        let storage = InMemoryReminderStorage::new();
        let enabled = storage.insert(new_reminder("enabled")).await.unwrap();
        let disabled = storage.insert(new_reminder("disabled")).await.unwrap();

        storage.set_enabled(disabled.id, false).await.unwrap();

        let reminders = storage.get_enabled().await.unwrap();
        assert_eq!(reminders, vec![Ok(enabled)]);
    }

    #[tokio::test]
    async fn writes_to_missing_reminder_fail() {
        let storage = InMemoryReminderStorage::new();

        let result = storage.set_next_occurrence(42, None).await;

        assert!(matches!(result, Err(StorageError::NotFound(42))));
        assert!(matches!(
            storage.set_enabled(42, true).await,
            Err(StorageError::NotFound(42))
        ));
    }

    #[tokio::test]
    async fn delete_of_missing_reminder_is_noop() {
        let storage = InMemoryReminderStorage::new();

        storage.delete(42).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_does_not_reuse_explicit_ids() {
        let storage = InMemoryReminderStorage::new();
        let mut reminder = storage.insert(new_reminder("first")).await.unwrap();
        reminder.id = 10;

        storage.upsert(reminder).await.unwrap();
        let next = storage.insert(new_reminder("next")).await.unwrap();

        assert_eq!(next.id, 11);
    }

    #[tokio::test]
    async fn subscribers_observe_sorted_snapshots() {
        let storage = InMemoryReminderStorage::new();
        let mut updates = storage.subscribe();
        let late = storage.insert(new_reminder("late")).await.unwrap();
        let early = storage.insert(new_reminder("early")).await.unwrap();
        let unscheduled = storage.insert(new_reminder("unscheduled")).await.unwrap();

        storage
            .set_next_occurrence(late.id, Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap()))
            .await
            .unwrap();
        storage
            .set_next_occurrence(early.id, Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()))
            .await
            .unwrap();

        assert!(updates.has_changed().unwrap());
        let ids: Vec<ReminderId> = updates.borrow_and_update().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![unscheduled.id, early.id, late.id]);
    }
}
