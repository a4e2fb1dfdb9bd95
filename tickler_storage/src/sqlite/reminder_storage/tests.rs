use sqlx::sqlite::SqlitePoolOptions;
use tickler_models::{
    chrono::{TimeZone, Weekday},
    reminder::{ReminderRule, ReminderTime, RuleError},
};

use super::*;
use crate::CorruptRecord;

async fn storage() -> SqliteReminderStorage {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let storage = SqliteReminderStorage::new(pool);
    storage.migrate().await.unwrap();
    storage
}

fn nine() -> ReminderTime {
    ReminderTime::from_hm(9, 0).unwrap()
}

fn new_reminder(title: &str, rule: ReminderRule) -> NewReminder {
    NewReminder {
        title: title.to_string(),
        description: Some(format!("{title} description")),
        rule,
    }
}

#[tokio::test]
async fn insert_and_get_preserve_rule() {
    let storage = storage().await;
    let rule = ReminderRule::Weekly {
        time: nine(),
        day: Weekday::Wed,
    };

    let created = storage.insert(new_reminder("weekly", rule)).await.unwrap();
    let loaded = storage.get(created.id).await.unwrap().unwrap();

    assert_eq!(loaded, created);
    assert_eq!(loaded.rule, rule);
    assert!(loaded.is_enabled);
    assert_eq!(loaded.next_occurrence, None);
}

#[tokio::test]
async fn monthly_rule_and_next_occurrence_survive_round_trip() {
    let storage = storage().await;
    let created = storage
        .insert(new_reminder(
            "rent",
            ReminderRule::Monthly {
                time: nine(),
                day: 31,
            },
        ))
        .await
        .unwrap();
    let next = Utc.with_ymd_and_hms(2024, 4, 30, 9, 0, 0).unwrap();

    storage
        .set_next_occurrence(created.id, Some(next))
        .await
        .unwrap();

    let loaded = storage.get(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.next_occurrence, Some(next));
    assert_eq!(
        loaded.rule,
        ReminderRule::Monthly {
            time: nine(),
            day: 31
        }
    );
}

#[tokio::test]
async fn get_enabled_excludes_disabled() {
    let storage = storage().await;
    let enabled = storage
        .insert(new_reminder("enabled", ReminderRule::Daily { time: nine() }))
        .await
        .unwrap();
    let disabled = storage
        .insert(new_reminder("disabled", ReminderRule::Once { time: nine() }))
        .await
        .unwrap();

    storage.set_enabled(disabled.id, false).await.unwrap();

    let ids: Vec<ReminderId> = storage
        .get_enabled()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.unwrap().id)
        .collect();
    assert_eq!(ids, vec![enabled.id]);
}

#[tokio::test]
async fn upsert_replaces_existing_record() {
    let storage = storage().await;
    let mut reminder = storage
        .insert(new_reminder("before", ReminderRule::Daily { time: nine() }))
        .await
        .unwrap();

    reminder.title = "after".to_string();
    reminder.description = None;
    reminder.rule = ReminderRule::Weekly {
        time: nine(),
        day: Weekday::Sun,
    };
    storage.upsert(reminder.clone()).await.unwrap();

    let loaded = storage.get(reminder.id).await.unwrap().unwrap();
    assert_eq!(loaded, reminder);
    assert_eq!(storage.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_records_are_reported_for_writes_only() {
    let storage = storage().await;

    assert!(matches!(
        storage.set_next_occurrence(7, None).await,
        Err(StorageError::NotFound(7))
    ));
    assert!(matches!(
        storage.set_enabled(7, false).await,
        Err(StorageError::NotFound(7))
    ));
    storage.delete(7).await.unwrap();
    assert!(storage.get(7).await.unwrap().is_none());
}

async fn insert_weekly_without_day(storage: &SqliteReminderStorage, id: ReminderId) {
    sqlx::query(
        "INSERT INTO reminders (id, title, time_of_day, cycle, is_enabled) VALUES (?, 'broken', '09:00:00', 'Weekly', 1)",
    )
    .bind(id)
    .execute(&storage.pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn corrupt_rows_are_rejected() {
    let storage = storage().await;
    insert_weekly_without_day(&storage, 5).await;

    let result = storage.get(5).await;

    assert!(matches!(
        result,
        Err(StorageError::CorruptRecord(CorruptRecord {
            id: 5,
            source: RuleError::MissingDayOfWeek
        }))
    ));
}

#[tokio::test]
async fn corrupt_row_does_not_hide_enabled_reminders() {
    let storage = storage().await;
    let healthy = storage
        .insert(new_reminder("healthy", ReminderRule::Daily { time: nine() }))
        .await
        .unwrap();
    insert_weekly_without_day(&storage, 5).await;

    let rows = storage.get_enabled().await.unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&Ok(healthy.clone())));
    assert!(rows.contains(&Err(CorruptRecord {
        id: 5,
        source: RuleError::MissingDayOfWeek
    })));
    assert_eq!(storage.get_all().await.unwrap(), vec![healthy]);
}

#[tokio::test]
async fn subscribers_keep_receiving_updates_past_corrupt_rows() {
    let storage = storage().await;
    insert_weekly_without_day(&storage, 5).await;
    let mut updates = storage.subscribe();

    let reminder = storage
        .insert(new_reminder("fresh", ReminderRule::Daily { time: nine() }))
        .await
        .unwrap();

    assert!(updates.has_changed().unwrap());
    assert_eq!(*updates.borrow_and_update(), vec![reminder.clone()]);

    storage.set_enabled(reminder.id, false).await.unwrap();
    assert!(!updates.borrow_and_update()[0].is_enabled);
}

#[tokio::test]
async fn subscribers_see_deletes() {
    let storage = storage().await;
    let mut updates = storage.subscribe();
    let reminder = storage
        .insert(new_reminder("short lived", ReminderRule::Daily { time: nine() }))
        .await
        .unwrap();
    assert_eq!(updates.borrow_and_update().len(), 1);

    storage.delete(reminder.id).await.unwrap();

    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_empty());
}
