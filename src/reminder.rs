use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ReminderId = u32;

/// Storage generated key of a reminder.
pub type ReminderKey = String;

/// Where announcements are delivered (a Telegram chat id).
pub type ChatId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicSchedule {
    /// One word handle used to clear the reminder.
    pub name: String,
    /// Duration as the user typed it, shown when listing.
    pub raw_time: String,
    /// Unit key -> magnitude. Kept string-keyed so entries written by older versions survive.
    pub unit_values: BTreeMap<String, u32>,
    /// `None` repeats forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_occurrences: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReminderKind {
    OneOff,
    Periodic(PeriodicSchedule),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub chat_id: ChatId,
    #[serde(flatten)]
    pub kind: ReminderKind,
}

impl Reminder {
    pub fn is_periodic(&self) -> bool {
        matches!(self.kind, ReminderKind::Periodic(_))
    }

    pub fn periodic_name(&self) -> Option<&str> {
        match &self.kind {
            ReminderKind::Periodic(schedule) => Some(&schedule.name),
            ReminderKind::OneOff => None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.timestamp <= now
    }

    pub fn announcement(&self) -> String {
        format!("{} says: {}", self.author, self.text)
    }
}
