mod commands;
mod delivery;

pub use commands::TelegramCommandInterface;
pub use delivery::{TelegramNotifier, TelegramNotifierError};
pub use teloxide;
