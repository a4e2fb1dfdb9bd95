pub mod clock;
pub mod fire;
pub mod manager;
pub mod recurrence;
pub mod service;
pub mod timer;
pub mod tokio_timer;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, SystemClock};
pub use fire::{FireHandler, LogNotifier, Notification, NotificationChannel, Notifier};
pub use manager::{ManagerError, ReminderManager, UiState};
pub use recurrence::next_occurrence;
pub use service::{ReconcileReport, SchedulingError, SchedulingService};
pub use timer::{AlarmReceiver, ArmMode, Timer, TimerError, TimerPayload};
pub use tokio_timer::TokioTimer;
