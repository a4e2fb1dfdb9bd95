use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    sync::RwLock,
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use tickler_models::reminder::ReminderId;

use crate::{
    clock::Clock,
    timer::{AlarmReceiver, ArmMode, Timer, TimerError, TimerPayload},
};

struct ArmedTimer {
    generation: u64,
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl ArmedTimer {
    fn cancel(self) {
        self.cancellation_token.cancel();
    }
}

type ArmedTimers = RwLock<HashMap<ReminderId, ArmedTimer>>;

/// In-process timer facility. Every armed key owns one sleeping task.
///
/// Registrations only live in memory, so none of them survive a restart.
/// There is no coarser wake-up mode to fall back on: inexact registrations
/// are served with the same precision as exact ones.
pub struct TokioTimer {
    armed: Arc<ArmedTimers>,
    receiver: Arc<dyn AlarmReceiver>,
    clock: Arc<dyn Clock>,
    exact_permitted: bool,
    next_generation: AtomicU64,
    // Parent of every registration's token, cancelled on drop.
    shutdown: CancellationToken,
}

impl TokioTimer {
    pub fn new(
        receiver: Arc<dyn AlarmReceiver>,
        clock: Arc<dyn Clock>,
        exact_permitted: bool,
    ) -> Self {
        Self {
            armed: Arc::new(RwLock::new(HashMap::new())),
            receiver,
            clock,
            exact_permitted,
            next_generation: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn is_armed(&self, key: ReminderId) -> bool {
        self.armed.read().await.contains_key(&key)
    }

    pub async fn armed_count(&self) -> usize {
        self.armed.read().await.len()
    }

    fn delay_until(&self, at: DateTime<Utc>) -> Duration {
        let now = self.clock.now().with_timezone(&Utc);
        (at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Ok(mut armed) = self.armed.try_write() {
            armed.drain().for_each(|(_, timer)| timer.task.abort());
        }
    }
}

#[async_trait]
impl Timer for TokioTimer {
    async fn arm(
        &self,
        key: ReminderId,
        at: DateTime<Utc>,
        payload: TimerPayload,
        mode: ArmMode,
    ) -> Result<(), TimerError> {
        if mode == ArmMode::Exact && !self.exact_permitted {
            return Err(TimerError::PermissionDenied);
        }

        let delay = self.delay_until(at);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // The write lock is held until the new registration is in place, so
        // the replaced task can never fire after this point.
        let mut armed = self.armed.write().await;
        if let Some(previous) = armed.remove(&key) {
            previous.cancel();
        }

        let cancellation_token = self.shutdown.child_token();
        let task_cancellation_token = cancellation_token.child_token();
        let armed_timers = Arc::clone(&self.armed);
        let receiver = Arc::clone(&self.receiver);

        let task = task::spawn(async move {
            tokio::select! {
                _ = task_cancellation_token.cancelled() => {
                    log::debug!("Timer for reminder {key} was cancelled");
                },
                _ = tokio::time::sleep(delay) => {
                    if !release_if_current(&armed_timers, key, generation).await {
                        return;
                    }
                    log::info!("Timer fired for reminder {key}");
                    receiver.on_alarm(payload).await;
                }
            }
        });

        armed.insert(
            key,
            ArmedTimer {
                generation,
                task,
                cancellation_token,
            },
        );

        log::info!("Armed timer for reminder {key} at {at} ({mode:?}), firing in {delay:?}");
        Ok(())
    }

    async fn disarm(&self, key: ReminderId) {
        if let Some(timer) = self.armed.write().await.remove(&key) {
            timer.cancel();
            log::info!("Disarmed timer for reminder {key}");
        }
    }
}

// A fired registration is removed, unless it was replaced or disarmed while
// its task was waking up.
async fn release_if_current(armed: &ArmedTimers, key: ReminderId, generation: u64) -> bool {
    let mut armed = armed.write().await;
    match armed.get(&key) {
        Some(timer) if timer.generation == generation => {
            armed.remove(&key);
            true
        }
        _ => false,
    }
}
