//! The reminder book: every live reminder plus the bot-wide settings, kept in memory and
//! mirrored to a [`ReminderStorage`] on every change.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::delivery::{DeliveryError, ReminderDeliveryChannel};
use crate::listing::{self, Page};
use crate::reminder::{ChatId, PeriodicSchedule, Reminder, ReminderId, ReminderKey, ReminderKind};
use crate::renewal::{Renewal, renew};
use crate::storage::{LastMessage, ReminderStorage};
use crate::time::{TimeParseError, parse_relative};

pub const MAX_TEXT_CHARS: usize = 1000;
pub const MAX_REMINDER_ID: ReminderId = 5000;

#[derive(Debug, Error)]
pub enum ReminderRequestError {
    #[error("That message is way too long!")]
    TextTooLong,

    #[error("1 minute into the future is the earliest you can set a reminder to!")]
    TooSoon,

    #[error("1 year into the future is the latest you can set a reminder to!")]
    TooFar,

    #[error(transparent)]
    InvalidTime(#[from] TimeParseError),

    #[error("There already is a periodic reminder named '{0}'.")]
    DuplicateName(String),

    #[error("There is no reminder to delay.")]
    NothingToDelay,

    #[error("Could not save the reminder.")]
    Storage(#[from] anyhow::Error),
}

/// Who asked for a reminder and where it should be announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub author: String,
    pub chat_id: ChatId,
}

/// The book as shared between the announcer and the command handlers.
pub type SharedBook = Arc<tokio::sync::Mutex<ReminderBook>>;

pub struct ReminderBook {
    storage: Arc<dyn ReminderStorage>,
    reminders: BTreeMap<ReminderKey, Reminder>,
    timezone: Tz,
    default_timezone: Tz,
    last_message: Option<LastMessage>,
    latest_id: ReminderId,
}

impl ReminderBook {
    /// Reads everything from `storage`. A missing or unknown stored timezone falls back to
    /// `default_timezone`.
    pub async fn load(
        storage: Arc<dyn ReminderStorage>,
        default_timezone: Tz,
    ) -> anyhow::Result<Self> {
        let mut book = Self {
            storage,
            reminders: BTreeMap::new(),
            timezone: default_timezone,
            default_timezone,
            last_message: None,
            latest_id: 0,
        };
        book.reload().await?;
        Ok(book)
    }

    /// Replaces the in-memory state with what the storage holds. Returns the reminder count.
    pub async fn reload(&mut self) -> anyhow::Result<usize> {
        let stored = self.storage.get_all().await?;

        let timezone = match stored.settings.timezone.as_deref() {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                log::warn!(
                    "Stored timezone is unknown, using the default. [stored = {}, default = {}]",
                    name,
                    self.default_timezone
                );
                self.default_timezone
            }),
            None => self.default_timezone,
        };

        log::info!(
            "Reminder book loaded. [reminders = {}, timezone = {}]",
            stored.reminders.len(),
            timezone
        );

        self.reminders = stored.reminders;
        self.timezone = timezone;
        self.last_message = stored.settings.last_message;
        self.latest_id = stored.settings.latest_id;
        Ok(self.reminders.len())
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub async fn set_timezone(&mut self, timezone: Tz) -> anyhow::Result<()> {
        self.storage.set_timezone(timezone.name()).await?;
        self.timezone = timezone;
        log::info!("Timezone changed. [timezone = {}]", timezone);
        Ok(())
    }

    pub fn reminders(&self) -> impl Iterator<Item = &Reminder> {
        self.reminders.values()
    }

    pub fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }

    /// Adds a reminder that fires once at `due`.
    pub async fn schedule_once(
        &mut self,
        requester: &Requester,
        text: &str,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reminder, ReminderRequestError> {
        validate(text, due, now)?;
        self.insert(requester, text, due, ReminderKind::OneOff).await
    }

    /// Adds a reminder that repeats every `raw_time`, `occurrences` times or forever.
    pub async fn schedule_periodic(
        &mut self,
        requester: &Requester,
        name: &str,
        raw_time: &str,
        occurrences: Option<u32>,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Reminder, ReminderRequestError> {
        if self.find_periodic(name).is_some() {
            return Err(ReminderRequestError::DuplicateName(name.to_string()));
        }

        let parsed = parse_relative(now, raw_time, self.timezone)?;
        let due = parsed.instant.with_timezone(&Utc);
        validate(text, due, now)?;

        let schedule = PeriodicSchedule {
            name: name.to_string(),
            raw_time: raw_time.to_string(),
            unit_values: parsed.unit_values.to_stored(),
            remaining_occurrences: occurrences,
        };
        self.insert(requester, text, due, ReminderKind::Periodic(schedule))
            .await
    }

    /// Sets the last announced message again, `duration` from now.
    pub async fn delay_last(
        &mut self,
        requester: &Requester,
        duration: &str,
        now: DateTime<Utc>,
    ) -> Result<Reminder, ReminderRequestError> {
        let Some(last_message) = self.last_message.clone() else {
            return Err(ReminderRequestError::NothingToDelay);
        };

        let due = parse_relative(now, duration, self.timezone)?
            .instant
            .with_timezone(&Utc);
        self.schedule_once(requester, &last_message.text, due, now)
            .await
    }

    /// Removes the periodic reminder called `name`, ignoring case.
    pub async fn clear_periodic(&mut self, name: &str) -> anyhow::Result<Option<Reminder>> {
        let Some(key) = self.find_periodic(name) else {
            return Ok(None);
        };

        self.storage.remove(&key).await?;
        let removed = self.reminders.remove(&key);
        log::info!("Periodic reminder cleared. [name = {}]", name);
        Ok(removed)
    }

    /// One page of the reminder list, soonest first.
    pub fn list_page(&self, now: DateTime<Utc>, requested_page: usize) -> Page {
        let mut reminders: Vec<&Reminder> = self.reminders.values().collect();
        reminders.sort_by_key(|reminder| (reminder.timestamp, reminder.id));

        let entries: Vec<_> = reminders
            .into_iter()
            .map(|reminder| listing::describe(reminder, now, self.timezone))
            .collect();

        listing::paginate(
            &entries,
            &listing::day_categories(now, self.timezone),
            requested_page,
        )
    }

    /// Announces every reminder due at `now`, renewing periodic ones and dropping the rest.
    /// Returns how many reminders were handled.
    pub async fn announce_due(
        &mut self,
        now: DateTime<Utc>,
        delivery: &dyn ReminderDeliveryChannel,
    ) -> usize {
        let mut due: Vec<(ReminderKey, Reminder)> = self
            .reminders
            .iter()
            .filter(|(_, reminder)| reminder.is_due(now))
            .map(|(key, reminder)| (key.clone(), reminder.clone()))
            .collect();
        due.sort_by_key(|(_, reminder)| reminder.timestamp);

        let handled = due.len();
        for (key, reminder) in due {
            match delivery.send(reminder.chat_id, &reminder.announcement()).await {
                Ok(()) => {}
                Err(DeliveryError::DestinationGone(chat_id)) => {
                    log::warn!(
                        "Destination is gone, dropping reminder. [reminder_id = {}, chat_id = {}]",
                        reminder.id,
                        chat_id
                    );
                    self.drop_reminder(&key).await;
                    continue;
                }
                Err(error) => {
                    log::error!(
                        "Could not deliver reminder. [reminder_id = {}, error = {}]",
                        reminder.id,
                        error
                    );
                }
            }

            self.remember_announced(&reminder).await;

            match renew(reminder, now, self.timezone) {
                Renewal::Renewed(renewed) => {
                    if let Err(error) = self.storage.update(&key, renewed.clone()).await {
                        log::error!(
                            "Could not store renewed reminder. [key = {}, error = {:?}]",
                            key,
                            error
                        );
                    }
                    self.reminders.insert(key, renewed);
                }
                Renewal::Exhausted => self.drop_reminder(&key).await,
            }
        }

        if handled > 0 {
            log::info!("Announcement pass finished. [handled = {}]", handled);
        }
        handled
    }

    async fn insert(
        &mut self,
        requester: &Requester,
        text: &str,
        due: DateTime<Utc>,
        kind: ReminderKind,
    ) -> Result<Reminder, ReminderRequestError> {
        let id = next_id(self.latest_id);
        let reminder = Reminder {
            id,
            text: text.to_string(),
            timestamp: due,
            author: requester.author.clone(),
            chat_id: requester.chat_id,
            kind,
        };

        // The id is claimed first so a failed push only skips an id.
        self.storage.set_latest_id(id).await?;
        self.latest_id = id;
        let key = self.storage.push(reminder.clone()).await?;
        self.reminders.insert(key, reminder.clone());

        log::info!(
            "Reminder set. [reminder_id = {}, periodic = {}, due = {}]",
            id,
            reminder.is_periodic(),
            due
        );
        Ok(reminder)
    }

    async fn remember_announced(&mut self, reminder: &Reminder) {
        let message = LastMessage {
            text: reminder.text.clone(),
            author: reminder.author.clone(),
            chat_id: reminder.chat_id,
        };

        if let Err(error) = self.storage.set_last_message(message.clone()).await {
            log::error!("Could not store last message. [error = {:?}]", error);
        }
        self.last_message = Some(message);
    }

    async fn drop_reminder(&mut self, key: &str) {
        if let Err(error) = self.storage.remove(key).await {
            log::error!(
                "Could not remove reminder from storage. [key = {}, error = {:?}]",
                key,
                error
            );
        }
        self.reminders.remove(key);
    }

    fn find_periodic(&self, name: &str) -> Option<ReminderKey> {
        self.reminders
            .iter()
            .find(|(_, reminder)| {
                reminder
                    .periodic_name()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(name))
            })
            .map(|(key, _)| key.clone())
    }
}

/// Id following `latest`, wrapping back to 0 after [`MAX_REMINDER_ID`].
fn next_id(latest: ReminderId) -> ReminderId {
    (latest % (MAX_REMINDER_ID + 1) + 1) % (MAX_REMINDER_ID + 1)
}

fn validate(text: &str, due: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ReminderRequestError> {
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(ReminderRequestError::TextTooLong);
    }

    let ahead = due - now;
    if ahead < TimeDelta::minutes(1) {
        return Err(ReminderRequestError::TooSoon);
    }
    if ahead > TimeDelta::days(365) {
        return Err(ReminderRequestError::TooFar);
    }

    Ok(())
}

#[cfg(test)]
mod tests;
