use teloxide::{prelude::*, utils::command::BotCommands};
use thiserror::Error;

use tickler_models::{
    chrono::{NaiveTime, Weekday},
    reminder::{Reminder, ReminderId, ReminderRule, ReminderTime, RuleError},
};
use tickler_scheduler::ReminderManager;

type HandlerResult = anyhow::Result<()>;

const ADD_USAGE: &str = "Usage: /add <once|daily|weekly DAY|monthly DAY> HH:MM title\n\
Examples:\n/add daily 09:00 Stand up\n/add weekly wed 18:30 Gym\n/add monthly 31 10:00 Pay rent";

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "show this text.")]
    Help,
    #[command(description = "list reminders.")]
    List,
    #[command(description = "add a reminder, see /add without arguments for the format.")]
    Add(String),
    #[command(description = "enable or disable a reminder by id.")]
    Toggle(ReminderId),
    #[command(description = "delete a reminder by id.")]
    Delete(ReminderId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddCommandError {
    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Unknown repeat cycle {0}")]
    UnknownCycle(String),

    #[error("Invalid day {0}")]
    InvalidDay(String),

    #[error("Invalid time {0}, expected HH:MM")]
    InvalidTime(String),

    #[error(transparent)]
    InvalidRule(#[from] RuleError),
}

/// Reminder management over bot commands, restricted to a single chat.
pub struct TelegramCommandInterface;

impl TelegramCommandInterface {
    pub async fn start(bot: Bot, chat_id: i64, manager: ReminderManager) {
        log::info!("Starting Telegram command interface");

        let handler = Update::filter_message()
            .filter(move |msg: Message| msg.chat.id == ChatId(chat_id))
            .branch(teloxide::filter_command::<Command, _>().endpoint(handle_command));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![manager])
            .build()
            .dispatch()
            .await
    }
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    manager: ReminderManager,
) -> HandlerResult {
    let reply = match cmd {
        Command::Help => Command::descriptions().to_string(),
        Command::List => list(&manager),
        Command::Add(args) => match parse_add(&args) {
            Ok((title, rule)) => {
                manager.add_reminder(title, None, rule).await?;
                outcome(&manager, "Reminder added.")
            }
            Err(e) => format!("{e}\n{ADD_USAGE}"),
        },
        Command::Toggle(id) => match find(&manager, id) {
            Some(reminder) => {
                let enabling = !reminder.is_enabled;
                manager.toggle_enabled(reminder).await?;
                outcome(
                    &manager,
                    if enabling {
                        "Reminder enabled."
                    } else {
                        "Reminder disabled."
                    },
                )
            }
            None => format!("There is no reminder #{id}."),
        },
        Command::Delete(id) => match find(&manager, id) {
            Some(reminder) => {
                manager.delete_reminder(reminder).await?;
                outcome(&manager, "Reminder deleted.")
            }
            None => format!("There is no reminder #{id}."),
        },
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

fn list(manager: &ReminderManager) -> String {
    format_list(&manager.reminders().borrow())
}

fn find(manager: &ReminderManager, id: ReminderId) -> Option<Reminder> {
    manager
        .reminders()
        .borrow()
        .iter()
        .find(|reminder| reminder.id == id)
        .cloned()
}

// Mutations report failures through the manager's UI state, which is shown
// once and then dismissed.
fn outcome(manager: &ReminderManager, success: &str) -> String {
    let error = manager.ui_state().borrow().error.clone();
    match error {
        Some(error) => {
            manager.clear_error();
            format!("Failed: {error}")
        }
        None => success.to_string(),
    }
}

/// Parses `<cycle> [day] HH:MM title` into the title and the rule.
fn parse_add(args: &str) -> Result<(String, ReminderRule), AddCommandError> {
    let mut words = args.split_whitespace();
    let cycle = words.next().ok_or(AddCommandError::Missing("repeat cycle"))?;

    let rule = match cycle.to_lowercase().as_str() {
        "once" => ReminderRule::Once {
            time: parse_time(words.next())?,
        },
        "daily" => ReminderRule::Daily {
            time: parse_time(words.next())?,
        },
        "weekly" => {
            let day = words.next().ok_or(AddCommandError::Missing("day of week"))?;
            let day = day
                .parse::<Weekday>()
                .map_err(|_| AddCommandError::InvalidDay(day.to_string()))?;
            ReminderRule::Weekly {
                time: parse_time(words.next())?,
                day,
            }
        }
        "monthly" => {
            let day = words.next().ok_or(AddCommandError::Missing("day of month"))?;
            let day = day
                .parse::<u32>()
                .map_err(|_| AddCommandError::InvalidDay(day.to_string()))?;
            ReminderRule::Monthly {
                time: parse_time(words.next())?,
                day,
            }
        }
        other => return Err(AddCommandError::UnknownCycle(other.to_string())),
    };
    rule.validate()?;

    let title = words.collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        return Err(AddCommandError::Missing("title"));
    }

    Ok((title, rule))
}

fn parse_time(word: Option<&str>) -> Result<ReminderTime, AddCommandError> {
    let word = word.ok_or(AddCommandError::Missing("time"))?;
    NaiveTime::parse_from_str(word, "%H:%M")
        .map(ReminderTime::new)
        .map_err(|_| AddCommandError::InvalidTime(word.to_string()))
}

fn describe_rule(rule: &ReminderRule) -> String {
    match rule {
        ReminderRule::Once { time } => format!("once at {time}"),
        ReminderRule::Daily { time } => format!("daily at {time}"),
        ReminderRule::Weekly { time, day } => format!("every {day} at {time}"),
        ReminderRule::Monthly { time, day } => format!("monthly on day {day} at {time}"),
    }
}

fn format_list(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "There are no reminders yet. Use /add to create one.".to_string();
    }

    reminders
        .iter()
        .map(|reminder| {
            let status = match (reminder.is_enabled, reminder.next_occurrence) {
                (false, _) => "disabled".to_string(),
                (true, Some(next)) => format!("next {}", next.format("%Y-%m-%d %H:%M UTC")),
                (true, None) => "not scheduled".to_string(),
            };
            format!(
                "#{} {}: {}, {}",
                reminder.id,
                reminder.title,
                describe_rule(&reminder.rule),
                status
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
