mod in_memory;
mod model;
mod reminder;
pub mod sqlite;

pub use in_memory::InMemoryReminderStorage;
pub use model::NewReminder;
pub use reminder::{CorruptRecord, ReminderStorage, StorageError, StoredReminder};
