use sqlx::types::chrono::{DateTime, NaiveTime, Utc};
use tickler_models::reminder::{Reminder, ReminderRule, ReminderTime, RepeatCycle, RuleError};

use crate::CorruptRecord;

#[derive(sqlx::FromRow)]
pub struct ReminderStorageModel {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_of_day: NaiveTime,
    pub cycle: String,
    pub day_of_week: Option<i64>,
    pub day_of_month: Option<i64>,
    pub is_enabled: bool,
    pub next_occurrence: Option<DateTime<Utc>>,
}

impl From<Reminder> for ReminderStorageModel {
    fn from(value: Reminder) -> Self {
        let (cycle, day_of_week, day_of_month) = value.rule.to_parts();
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            time_of_day: value.rule.time().into_time(),
            cycle: cycle.as_str().to_string(),
            day_of_week: day_of_week.map(i64::from),
            day_of_month: day_of_month.map(i64::from),
            is_enabled: value.is_enabled,
            next_occurrence: value.next_occurrence,
        }
    }
}

impl TryFrom<ReminderStorageModel> for Reminder {
    type Error = CorruptRecord;

    fn try_from(value: ReminderStorageModel) -> Result<Self, Self::Error> {
        let id = value.id;
        let rule = parse_rule(&value).map_err(|source| CorruptRecord { id, source })?;

        Ok(Self {
            id,
            title: value.title,
            description: value.description,
            rule,
            is_enabled: value.is_enabled,
            next_occurrence: value.next_occurrence,
        })
    }
}

fn parse_rule(value: &ReminderStorageModel) -> Result<ReminderRule, RuleError> {
    let cycle: RepeatCycle = value.cycle.parse()?;
    ReminderRule::from_parts(
        ReminderTime::new(value.time_of_day),
        cycle,
        value.day_of_week.map(to_day),
        value.day_of_month.map(to_day),
    )
}

// Negative or oversized values map to 0, which the rule validation rejects.
fn to_day(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
