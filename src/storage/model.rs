use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reminder::{ChatId, Reminder, ReminderId, ReminderKey};

/// The most recently announced message, kept so it can be snoozed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    pub author: String,
    pub chat_id: ChatId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSettings {
    /// IANA name, e.g. `Europe/Lisbon`.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub latest_id: ReminderId,
}

/// Everything a store holds, as read at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBook {
    #[serde(default)]
    pub reminders: BTreeMap<ReminderKey, Reminder>,
    #[serde(default)]
    pub settings: StoredSettings,
}
