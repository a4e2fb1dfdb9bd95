use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use tickler_models::reminder::{Reminder, ReminderId, ReminderRule, ReminderTime};

use crate::{
    clock::Clock,
    fire::{Notification, NotificationChannel, Notifier, NotifierResult},
    timer::{AlarmReceiver, ArmMode, Timer, TimerError, TimerPayload},
};

pub struct FixedClock(Mutex<DateTime<Tz>>);

impl FixedClock {
    pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let now = chrono_tz::UTC
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap();
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Tz>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        *self.0.lock().unwrap()
    }
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

pub fn payload(id: ReminderId) -> TimerPayload {
    TimerPayload {
        id,
        title: format!("Reminder {id}"),
        description: None,
    }
}

pub fn daily_at_nine() -> ReminderRule {
    ReminderRule::Daily {
        time: ReminderTime::from_hm(9, 0).unwrap(),
    }
}

pub fn reminder(id: ReminderId, rule: ReminderRule, is_enabled: bool) -> Reminder {
    Reminder {
        id,
        title: format!("Reminder {id}"),
        description: None,
        rule,
        is_enabled,
        next_occurrence: None,
    }
}

#[derive(Default)]
pub struct RecordingReceiver {
    fired: Mutex<Vec<TimerPayload>>,
}

impl RecordingReceiver {
    pub fn fired(&self) -> Vec<TimerPayload> {
        self.fired.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlarmReceiver for RecordingReceiver {
    async fn on_alarm(&self, payload: TimerPayload) {
        self.fired.lock().unwrap().push(payload);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCall {
    Arm {
        key: ReminderId,
        at: DateTime<Utc>,
        mode: ArmMode,
    },
    Disarm {
        key: ReminderId,
    },
}

#[derive(Default)]
pub struct RecordingTimer {
    calls: Mutex<Vec<TimerCall>>,
    armed: Mutex<HashMap<ReminderId, (DateTime<Utc>, TimerPayload, ArmMode)>>,
    unavailable_for: Mutex<HashSet<ReminderId>>,
    panicking_for: Mutex<HashSet<ReminderId>>,
    deny_exact: bool,
}

impl RecordingTimer {
    pub fn denying_exact() -> Self {
        Self {
            deny_exact: true,
            ..Default::default()
        }
    }

    pub fn fail_for(&self, key: ReminderId) {
        self.unavailable_for.lock().unwrap().insert(key);
    }

    pub fn panic_for(&self, key: ReminderId) {
        self.panicking_for.lock().unwrap().insert(key);
    }

    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn armed_keys(&self) -> HashSet<ReminderId> {
        self.armed.lock().unwrap().keys().copied().collect()
    }

    pub fn armed(&self, key: ReminderId) -> Option<(DateTime<Utc>, TimerPayload, ArmMode)> {
        self.armed.lock().unwrap().get(&key).cloned()
    }
}

#[async_trait]
impl Timer for RecordingTimer {
    async fn arm(
        &self,
        key: ReminderId,
        at: DateTime<Utc>,
        payload: TimerPayload,
        mode: ArmMode,
    ) -> Result<(), TimerError> {
        self.calls
            .lock()
            .unwrap()
            .push(TimerCall::Arm { key, at, mode });

        let panics = self.panicking_for.lock().unwrap().contains(&key);
        if panics {
            panic!("Timer facility crashed while arming reminder {key}");
        }
        if self.deny_exact && mode == ArmMode::Exact {
            return Err(TimerError::PermissionDenied);
        }
        if self.unavailable_for.lock().unwrap().contains(&key) {
            return Err(TimerError::Unavailable);
        }

        self.armed.lock().unwrap().insert(key, (at, payload, mode));
        Ok(())
    }

    async fn disarm(&self, key: ReminderId) {
        self.calls.lock().unwrap().push(TimerCall::Disarm { key });
        self.armed.lock().unwrap().remove(&key);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    channels: Mutex<Vec<NotificationChannel>>,
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.channels.lock().unwrap().clone()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn ensure_channel(&self, channel: &NotificationChannel) -> NotifierResult {
        self.channels.lock().unwrap().push(channel.clone());
        Ok(())
    }

    async fn show(&self, notification: Notification) -> NotifierResult {
        self.shown.lock().unwrap().push(notification);
        Ok(())
    }
}
