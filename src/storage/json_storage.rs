use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::reminder::{Reminder, ReminderId, ReminderKey};

use super::model::{LastMessage, StoredBook};
use super::reminder_storage::{ReminderStorage, next_key};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    next_key: u64,
    #[serde(flatten)]
    book: StoredBook,
}

/// Keeps the whole book in one JSON file, rewritten after every change.
pub struct JsonFileReminderStorage {
    path: PathBuf,
    document: Mutex<JsonDocument>,
}

impl JsonFileReminderStorage {
    /// Opens the store at `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut document: JsonDocument = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("Could not parse reminder store {}", path.display()))?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                log::info!("Reminder store does not exist yet, starting empty. [path = {}]", path.display());
                JsonDocument::default()
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("Could not read reminder store {}", path.display()));
            }
        };

        // Keys written without a counter must never be handed out again.
        let taken = document
            .book
            .reminders
            .keys()
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .map_or(0, |largest| largest.saturating_add(1));
        document.next_key = document.next_key.max(taken);

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Applies `change` to a copy of the document and keeps it only once it is on disk.
    async fn commit<R>(
        &self,
        change: impl FnOnce(&mut JsonDocument) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        let mut document = self.document.lock().await;
        let mut staged = document.clone();
        let result = change(&mut staged)?;

        self.persist(&staged).await?;
        *document = staged;
        Ok(result)
    }

    async fn persist(&self, document: &JsonDocument) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(document)?;
        let staging = self.path.with_extension("json.tmp");

        tokio::fs::write(&staging, contents)
            .await
            .with_context(|| format!("Could not write {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Could not replace {}", self.path.display()))?;

        log::debug!("Reminder store written. [path = {}]", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl ReminderStorage for JsonFileReminderStorage {
    async fn get_all(&self) -> anyhow::Result<StoredBook> {
        Ok(self.document.lock().await.book.clone())
    }

    async fn push(&self, reminder: Reminder) -> anyhow::Result<ReminderKey> {
        self.commit(|document| {
            let key = next_key(&mut document.next_key);
            document.book.reminders.insert(key.clone(), reminder);
            Ok(key)
        })
        .await
    }

    async fn update(&self, key: &str, reminder: Reminder) -> anyhow::Result<()> {
        self.commit(|document| {
            let Some(stored) = document.book.reminders.get_mut(key) else {
                anyhow::bail!("Reminder {key} does not exist");
            };
            *stored = reminder;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        if !self.document.lock().await.book.reminders.contains_key(key) {
            return Ok(());
        }

        self.commit(|document| {
            document.book.reminders.remove(key);
            Ok(())
        })
        .await
    }

    async fn set_last_message(&self, message: LastMessage) -> anyhow::Result<()> {
        self.commit(|document| {
            document.book.settings.last_message = Some(message);
            Ok(())
        })
        .await
    }

    async fn set_timezone(&self, timezone: &str) -> anyhow::Result<()> {
        self.commit(|document| {
            document.book.settings.timezone = Some(timezone.to_string());
            Ok(())
        })
        .await
    }

    async fn set_latest_id(&self, id: ReminderId) -> anyhow::Result<()> {
        self.commit(|document| {
            document.book.settings.latest_id = id;
            Ok(())
        })
        .await
    }
}
