mod appsettings;

use std::sync::Arc;

use anyhow::Context;
use appsettings::AppSettings;
use teloxide::Bot;
use tickler_models::settings::TelegramSettings;
use tickler_scheduler::{
    FireHandler, LogNotifier, Notifier, ReminderManager, SchedulingService, SystemClock,
    TokioTimer,
};
use tickler_storage::sqlite::SqliteReminderStorage;
use tickler_telegram::{TelegramCommandInterface, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::load().context("Failed to load appsettings")?;
    log::info!(
        "Starting tickler. [timezone = {}, exact_alarms = {}]",
        settings.scheduling.timezone,
        settings.scheduling.exact_alarms
    );

    let storage = Arc::new(
        SqliteReminderStorage::connect(&settings.storage.database_url)
            .await
            .context("Failed to open the reminder database")?,
    );
    let clock = Arc::new(SystemClock::new(settings.scheduling.timezone));
    let fire_handler = Arc::new(FireHandler::new(notifier(settings.telegram.as_ref())));
    let timer = Arc::new(TokioTimer::new(
        fire_handler,
        clock.clone(),
        settings.scheduling.exact_alarms,
    ));
    let scheduling = SchedulingService::new(storage.clone(), timer, clock);

    match scheduling.reschedule_all().await {
        Ok(report) => log::info!(
            "Restored reminder timers. [armed = {}, failed = {}]",
            report.armed,
            report.failed.len()
        ),
        Err(e) => log::error!("Failed to restore reminder timers. [error = {e}]"),
    }

    match settings.telegram {
        Some(telegram) => {
            let manager = ReminderManager::new(storage, scheduling);
            let bot = Bot::new(telegram.token);
            tokio::select! {
                result = tokio::signal::ctrl_c() => result?,
                _ = TelegramCommandInterface::start(bot, telegram.chat_id, manager) => {
                    log::warn!("Telegram command interface stopped");
                }
            }
        }
        None => {
            log::warn!("Telegram is not configured, reminders can not be edited");
            tokio::signal::ctrl_c().await?;
        }
    }

    log::info!("Shutting down");

    Ok(())
}

fn notifier(telegram: Option<&TelegramSettings>) -> Arc<dyn Notifier> {
    match telegram {
        Some(telegram) => {
            let bot = Bot::new(telegram.token.clone());
            Arc::new(TelegramNotifier::new(bot, telegram.chat_id))
        }
        None => {
            log::warn!("Telegram is not configured, reminders will only be logged");
            Arc::new(LogNotifier::new())
        }
    }
}
