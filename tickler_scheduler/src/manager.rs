use std::sync::Arc;

use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};

use tickler_models::reminder::{Reminder, ReminderRule, RuleError};
use tickler_storage::{NewReminder, ReminderStorage, StorageError};

use crate::service::{SchedulingError, SchedulingService};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Reminder title must not be blank")]
    BlankTitle,

    #[error(transparent)]
    InvalidRule(#[from] RuleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    /// Last mutation failure, shown until dismissed with `clear_error`.
    pub error: Option<String>,
}

/// Mutation entry points for the presentation layer.
///
/// Every mutation runs as its own spawned task. Callers observe the outcome
/// through `reminders()` and `ui_state()` rather than awaiting the handle.
#[derive(Clone)]
pub struct ReminderManager {
    storage: Arc<dyn ReminderStorage>,
    scheduling: SchedulingService,
    ui_state: Arc<watch::Sender<UiState>>,
}

impl ReminderManager {
    pub fn new(storage: Arc<dyn ReminderStorage>, scheduling: SchedulingService) -> Self {
        let (ui_state, _) = watch::channel(UiState::default());
        Self {
            storage,
            scheduling,
            ui_state: Arc::new(ui_state),
        }
    }

    pub fn reminders(&self) -> watch::Receiver<Vec<Reminder>> {
        self.storage.subscribe()
    }

    pub fn ui_state(&self) -> watch::Receiver<UiState> {
        self.ui_state.subscribe()
    }

    pub fn clear_error(&self) {
        self.ui_state.send_modify(|state| state.error = None);
    }

    pub fn add_reminder(
        &self,
        title: String,
        description: Option<String>,
        rule: ReminderRule,
    ) -> JoinHandle<()> {
        self.dispatch(move |manager| async move {
            validate(&title, &rule)?;
            let reminder = manager
                .storage
                .insert(NewReminder {
                    title,
                    description,
                    rule,
                })
                .await?;
            manager.scheduling.schedule_reminder(&reminder).await?;
            Ok(())
        })
    }

    pub fn update_reminder(&self, reminder: Reminder) -> JoinHandle<()> {
        self.dispatch(move |manager| async move {
            validate(&reminder.title, &reminder.rule)?;
            let stored = manager.storage.upsert(reminder).await?;
            manager.scheduling.schedule_reminder(&stored).await?;
            Ok(())
        })
    }

    pub fn toggle_enabled(&self, reminder: Reminder) -> JoinHandle<()> {
        self.dispatch(move |manager| async move {
            let toggled = Reminder {
                is_enabled: !reminder.is_enabled,
                ..reminder
            };
            manager
                .storage
                .set_enabled(toggled.id, toggled.is_enabled)
                .await?;
            manager.scheduling.schedule_reminder(&toggled).await?;
            Ok(())
        })
    }

    pub fn delete_reminder(&self, reminder: Reminder) -> JoinHandle<()> {
        self.dispatch(move |manager| async move {
            manager.storage.delete(reminder.id).await?;
            manager.scheduling.cancel_reminder(reminder.id).await;
            Ok(())
        })
    }

    fn dispatch<F, Fut>(&self, work: F) -> JoinHandle<()>
    where
        F: FnOnce(ReminderManager) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ManagerError>> + Send + 'static,
    {
        let manager = self.clone();
        let ui_state = Arc::clone(&self.ui_state);
        tokio::spawn(async move {
            if let Err(e) = work(manager).await {
                log::warn!("Reminder mutation failed. [error = {e}]");
                ui_state.send_modify(|state| state.error = Some(e.to_string()));
            }
        })
    }
}

fn validate(title: &str, rule: &ReminderRule) -> Result<(), ManagerError> {
    if title.trim().is_empty() {
        return Err(ManagerError::BlankTitle);
    }
    rule.validate()?;
    Ok(())
}
