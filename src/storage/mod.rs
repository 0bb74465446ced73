mod json_storage;
mod model;
mod reminder_storage;

pub use json_storage::JsonFileReminderStorage;
pub use model::{LastMessage, StoredBook, StoredSettings};
pub use reminder_storage::{InMemoryReminderStorage, ReminderStorage};
