use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

use tickler_models::reminder::{Reminder, ReminderId, RuleError};
use tickler_storage::{CorruptRecord, ReminderStorage, StorageError};

use crate::{
    clock::Clock,
    recurrence::next_occurrence,
    timer::{ArmMode, Timer, TimerError, TimerPayload},
};

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Failed to persist reminder state: {0}")]
    PersistenceFailure(#[from] StorageError),

    #[error("Timer facility refused reminder {id}: {source}")]
    TimerUnavailable {
        id: ReminderId,
        #[source]
        source: TimerError,
    },

    #[error("Reminder {id} has an invalid rule: {source}")]
    InvalidRule {
        id: ReminderId,
        #[source]
        source: RuleError,
    },

    #[error("Scheduling of reminder {id} did not complete: {source}")]
    Interrupted {
        id: ReminderId,
        #[source]
        source: JoinError,
    },
}

/// Outcome of `reschedule_all`. Every enabled reminder ends up in exactly one
/// of the two buckets.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub armed: usize,
    pub failed: Vec<(ReminderId, SchedulingError)>,
}

impl ReconcileReport {
    fn record_failure(&mut self, id: ReminderId, error: SchedulingError) {
        log::warn!("Failed to reschedule reminder. [reminder_id = {id}, error = {error}]");
        self.failed.push((id, error));
    }
}

/// Keeps the persisted next occurrence of every reminder and its timer
/// registration in step.
///
/// Store writes and timer registrations are not transactional. When arming
/// fails after the write, the record keeps its `next_occurrence` with no live
/// timer behind it until a later mutation or reconciliation re-arms it.
#[derive(Clone)]
pub struct SchedulingService {
    storage: Arc<dyn ReminderStorage>,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
}

impl SchedulingService {
    pub fn new(
        storage: Arc<dyn ReminderStorage>,
        timer: Arc<dyn Timer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            timer,
            clock,
        }
    }

    /// Disarms a disabled reminder, or computes, persists and arms the next
    /// occurrence of an enabled one. Returns the persisted value.
    pub async fn schedule_reminder(
        &self,
        reminder: &Reminder,
    ) -> Result<Option<DateTime<Utc>>, SchedulingError> {
        let id = reminder.id;
        if !reminder.is_enabled {
            self.timer.disarm(id).await;
            self.storage.set_next_occurrence(id, None).await?;
            log::info!("Reminder {id} is disabled, timer disarmed");
            return Ok(None);
        }

        reminder
            .rule
            .validate()
            .map_err(|source| SchedulingError::InvalidRule { id, source })?;

        let next = next_occurrence(&reminder.rule, &self.clock.now()).with_timezone(&Utc);
        self.storage.set_next_occurrence(id, Some(next)).await?;
        self.arm(id, next, TimerPayload::from(reminder)).await?;

        Ok(Some(next))
    }

    /// Disarms the timer for `id`. The record does not need to exist anymore.
    pub async fn cancel_reminder(&self, id: ReminderId) {
        self.timer.disarm(id).await;
        log::info!("Cancelled reminder {id}");
    }

    /// Re-arms every enabled reminder. Meant to run once per cold start, when
    /// the persisted occurrences survived but the timer registrations did not.
    ///
    /// A failing reminder, including one whose stored record no longer
    /// decodes, is logged and skipped. It never stops the others. Only a
    /// failure to read the enabled set at all is returned as an error.
    pub async fn reschedule_all(&self) -> Result<ReconcileReport, SchedulingError> {
        let rows = self.storage.get_enabled().await?;
        log::info!("Reconciling {} enabled reminders", rows.len());

        let mut report = ReconcileReport::default();
        let mut tasks = JoinSet::new();
        let mut reminder_ids = HashMap::new();
        for row in rows {
            let reminder = match row {
                Ok(reminder) => reminder,
                Err(CorruptRecord { id, source }) => {
                    report.record_failure(id, SchedulingError::InvalidRule { id, source });
                    continue;
                }
            };

            let id = reminder.id;
            let service = self.clone();
            let handle = tasks.spawn(async move { service.schedule_reminder(&reminder).await });
            reminder_ids.insert(handle.id(), id);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(_))) => report.armed += 1,
                Ok((task_id, Err(e))) => report.record_failure(reminder_ids[&task_id], e),
                Err(source) => {
                    let id = reminder_ids[&source.id()];
                    report.record_failure(id, SchedulingError::Interrupted { id, source });
                }
            }
        }

        log::info!(
            "Reconciliation finished. [armed = {}, failed = {}]",
            report.armed,
            report.failed.len()
        );
        Ok(report)
    }

    async fn arm(
        &self,
        id: ReminderId,
        at: DateTime<Utc>,
        payload: TimerPayload,
    ) -> Result<(), SchedulingError> {
        let result = match self.timer.arm(id, at, payload.clone(), ArmMode::Exact).await {
            Err(TimerError::PermissionDenied) => {
                log::warn!("Exact timer refused for reminder {id}, retrying with inexact registration");
                self.timer.arm(id, at, payload, ArmMode::Inexact).await
            }
            other => other,
        };

        result.map_err(|source| SchedulingError::TimerUnavailable { id, source })
    }
}
