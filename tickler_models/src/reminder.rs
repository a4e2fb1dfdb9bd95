use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use thiserror::Error;

pub type ReminderId = i64;

/// Wall-clock time of day a reminder fires at. Carries no date and no timezone,
/// it is interpreted in the local timezone whenever an occurrence is computed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReminderTime(NaiveTime);

impl ReminderTime {
    pub fn new(inner: NaiveTime) -> Self {
        let normalized_time = inner
            .with_nanosecond(0)
            .and_then(|t| t.with_second(0))
            .expect("Will never fail.");
        Self(normalized_time)
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> &NaiveTime {
        &self.0
    }

    pub fn into_time(self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RepeatCycle {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl RepeatCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatCycle::Once => "Once",
            RepeatCycle::Daily => "Daily",
            RepeatCycle::Weekly => "Weekly",
            RepeatCycle::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for RepeatCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatCycle {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Once" => Ok(RepeatCycle::Once),
            "Daily" => Ok(RepeatCycle::Daily),
            "Weekly" => Ok(RepeatCycle::Weekly),
            "Monthly" => Ok(RepeatCycle::Monthly),
            other => Err(RuleError::UnknownCycle(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("Unknown repeat cycle {0}")]
    UnknownCycle(String),

    #[error("Day of week must be within 1..=7, got {0}")]
    DayOfWeekOutOfRange(u32),

    #[error("Day of month must be within 1..=31, got {0}")]
    DayOfMonthOutOfRange(u32),

    #[error("Weekly rule is missing the day of week")]
    MissingDayOfWeek,

    #[error("Monthly rule is missing the day of month")]
    MissingDayOfMonth,

    #[error("Day of week is only allowed for weekly rules, got a {0} rule")]
    UnexpectedDayOfWeek(RepeatCycle),

    #[error("Day of month is only allowed for monthly rules, got a {0} rule")]
    UnexpectedDayOfMonth(RepeatCycle),
}

/// Repeat rule of a reminder. Each cycle carries exactly the fields it needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReminderRule {
    Once { time: ReminderTime },
    Daily { time: ReminderTime },
    Weekly { time: ReminderTime, day: Weekday },
    /// `day` is 1..=31. Months shorter than `day` fire on their last day.
    Monthly { time: ReminderTime, day: u32 },
}

impl ReminderRule {
    pub fn time(&self) -> &ReminderTime {
        match self {
            ReminderRule::Once { time }
            | ReminderRule::Daily { time }
            | ReminderRule::Weekly { time, .. }
            | ReminderRule::Monthly { time, .. } => time,
        }
    }

    pub fn cycle(&self) -> RepeatCycle {
        match self {
            ReminderRule::Once { .. } => RepeatCycle::Once,
            ReminderRule::Daily { .. } => RepeatCycle::Daily,
            ReminderRule::Weekly { .. } => RepeatCycle::Weekly,
            ReminderRule::Monthly { .. } => RepeatCycle::Monthly,
        }
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        match self {
            ReminderRule::Monthly { day, .. } if !(1..=31).contains(day) => {
                Err(RuleError::DayOfMonthOutOfRange(*day))
            }
            _ => Ok(()),
        }
    }

    /// Builds a rule from the flat row layout, where the day fields are only
    /// present for the cycle that uses them.
    pub fn from_parts(
        time: ReminderTime,
        cycle: RepeatCycle,
        day_of_week: Option<u32>,
        day_of_month: Option<u32>,
    ) -> Result<Self, RuleError> {
        let rule = match (cycle, day_of_week, day_of_month) {
            (RepeatCycle::Weekly, Some(day), None) => ReminderRule::Weekly {
                time,
                day: weekday_from_number(day)?,
            },
            (RepeatCycle::Weekly, None, _) => return Err(RuleError::MissingDayOfWeek),
            (RepeatCycle::Monthly, None, Some(day)) => ReminderRule::Monthly { time, day },
            (RepeatCycle::Monthly, _, None) => return Err(RuleError::MissingDayOfMonth),
            (cycle, Some(_), _) if cycle != RepeatCycle::Weekly => {
                return Err(RuleError::UnexpectedDayOfWeek(cycle));
            }
            (cycle, _, Some(_)) => return Err(RuleError::UnexpectedDayOfMonth(cycle)),
            (RepeatCycle::Once, None, None) => ReminderRule::Once { time },
            (RepeatCycle::Daily, None, None) => ReminderRule::Daily { time },
            (cycle, _, _) => return Err(RuleError::UnexpectedDayOfWeek(cycle)),
        };

        rule.validate()?;
        Ok(rule)
    }

    /// Flattens the rule into `(cycle, day_of_week, day_of_month)`.
    pub fn to_parts(&self) -> (RepeatCycle, Option<u32>, Option<u32>) {
        match self {
            ReminderRule::Weekly { day, .. } => {
                (RepeatCycle::Weekly, Some(day.number_from_monday()), None)
            }
            ReminderRule::Monthly { day, .. } => (RepeatCycle::Monthly, None, Some(*day)),
            other => (other.cycle(), None, None),
        }
    }
}

fn weekday_from_number(day: u32) -> Result<Weekday, RuleError> {
    match day {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(RuleError::DayOfWeekOutOfRange(other)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    pub description: Option<String>,
    pub rule: ReminderRule,
    pub is_enabled: bool,
    /// Instant the engine last armed for. Always `None` while disabled.
    pub next_occurrence: Option<DateTime<Utc>>,
}
