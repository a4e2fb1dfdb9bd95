use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};

use tickler_models::reminder::ReminderRule;

/// Computes the first instant strictly after `now` at which `rule` fires.
///
/// Wall-clock candidates are built in `now`'s timezone. A candidate that falls
/// into a DST overlap resolves to its earlier instant; one that falls into a
/// DST gap moves forward to the first wall-clock minute that exists.
///
/// `Monthly` rules clamp their day to the length of the month instead of
/// rolling over, so day 31 fires on April 30th.
pub fn next_occurrence<Tz: TimeZone>(rule: &ReminderRule, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.naive_local().date();
    let time = *rule.time().time();
    let at = |date: NaiveDate| resolve_local(&tz, date.and_time(time));

    match rule {
        ReminderRule::Once { .. } | ReminderRule::Daily { .. } => {
            let candidate = at(today);
            if candidate > *now {
                candidate
            } else {
                at(add_days(today, 1))
            }
        }
        ReminderRule::Weekly { day, .. } => {
            let current = today.weekday().number_from_monday();
            let target = day.number_from_monday();
            let candidate = at(today);

            if current == target && candidate > *now {
                candidate
            } else {
                let offset = if target > current {
                    target - current
                } else {
                    7 - current + target
                };
                at(add_days(today, offset))
            }
        }
        ReminderRule::Monthly { day, .. } => {
            let candidate = at(clamped_date(today.year(), today.month(), *day));
            if candidate > *now {
                candidate
            } else {
                let (year, month) = following_month(today.year(), today.month());
                at(clamped_date(year, month, *day))
            }
        }
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = following_month(year, month);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .expect("Month boundaries of a valid month are valid dates.")
}

fn clamped_date(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("Day is clamped to the month length.")
}

fn following_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(days.into()))
        .expect("Not realistic to overflow")
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = local;
    loop {
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return resolved;
        }
        // DST gaps are whole minutes and never longer than a few hours.
        candidate += TimeDelta::minutes(1);
    }
}
