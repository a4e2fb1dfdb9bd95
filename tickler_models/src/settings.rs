use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Deserialize, Debug)]
pub struct SchedulingSettings {
    /// Timezone the reminders' wall-clock times are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: chrono_tz::Tz,
    /// Whether the timer facility may register exact wake-ups.
    #[serde(default = "default_exact_alarms")]
    pub exact_alarms: bool,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            exact_alarms: default_exact_alarms(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct StorageSettings {
    pub database_url: String,
}

#[derive(Deserialize, Debug)]
pub struct Settings {
    #[serde(default)]
    pub scheduling: SchedulingSettings,
    pub storage: StorageSettings,
    pub telegram: Option<TelegramSettings>,
}

fn default_timezone() -> chrono_tz::Tz {
    chrono_tz::UTC
}

fn default_exact_alarms() -> bool {
    true
}
