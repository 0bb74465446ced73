use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::reminder::{Reminder, ReminderId, ReminderKey};

use super::model::{LastMessage, StoredBook};

#[async_trait]
pub trait ReminderStorage: Send + Sync {
    async fn get_all(&self) -> anyhow::Result<StoredBook>;
    /// Stores a new reminder and returns the key it was stored under.
    async fn push(&self, reminder: Reminder) -> anyhow::Result<ReminderKey>;
    async fn update(&self, key: &str, reminder: Reminder) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
    async fn set_last_message(&self, message: LastMessage) -> anyhow::Result<()>;
    async fn set_timezone(&self, timezone: &str) -> anyhow::Result<()>;
    async fn set_latest_id(&self, id: ReminderId) -> anyhow::Result<()>;
}

pub(super) fn next_key(counter: &mut u64) -> ReminderKey {
    let key = format!("{:010}", *counter);
    *counter += 1;
    key
}

#[derive(Default)]
pub struct InMemoryReminderStorage {
    store: RwLock<(u64, StoredBook)>,
}

impl InMemoryReminderStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReminderStorage for InMemoryReminderStorage {
    async fn get_all(&self) -> anyhow::Result<StoredBook> {
        let store = self.store.read().await;
        Ok(store.1.clone())
    }

    async fn push(&self, reminder: Reminder) -> anyhow::Result<ReminderKey> {
        let mut store = self.store.write().await;
        let (counter, book) = &mut *store;
        let key = next_key(counter);

        book.reminders.insert(key.clone(), reminder);

        log::debug!("Stored reminder. [key = {}]", key);
        Ok(key)
    }

    async fn update(&self, key: &str, reminder: Reminder) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        match store.1.reminders.get_mut(key) {
            Some(stored) => {
                *stored = reminder;
                Ok(())
            }
            None => anyhow::bail!("Reminder {key} does not exist"),
        }
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store.1.reminders.remove(key);
        Ok(())
    }

    async fn set_last_message(&self, message: LastMessage) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store.1.settings.last_message = Some(message);
        Ok(())
    }

    async fn set_timezone(&self, timezone: &str) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store.1.settings.timezone = Some(timezone.to_string());
        Ok(())
    }

    async fn set_latest_id(&self, id: ReminderId) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store.1.settings.latest_id = id;
        Ok(())
    }
}
