use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::TimeDelta;

use super::*;
use crate::storage::{InMemoryReminderStorage, StoredBook};
use crate::testing::{LISBON, Outcome, RecordingChannel, lisbon_utc, requester};

async fn empty_book() -> (ReminderBook, Arc<InMemoryReminderStorage>) {
    let storage = Arc::new(InMemoryReminderStorage::new());
    let book = ReminderBook::load(storage.clone(), LISBON).await.unwrap();
    (book, storage)
}

/// In-memory storage whose writes can be switched to fail.
#[derive(Default)]
struct FlakyStorage {
    inner: InMemoryReminderStorage,
    fail_push: AtomicBool,
    fail_latest_id: AtomicBool,
}

#[async_trait]
impl ReminderStorage for FlakyStorage {
    async fn get_all(&self) -> anyhow::Result<StoredBook> {
        self.inner.get_all().await
    }

    async fn push(&self, reminder: Reminder) -> anyhow::Result<ReminderKey> {
        if self.fail_push.load(Ordering::SeqCst) {
            anyhow::bail!("push rejected");
        }
        self.inner.push(reminder).await
    }

    async fn update(&self, key: &str, reminder: Reminder) -> anyhow::Result<()> {
        self.inner.update(key, reminder).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key).await
    }

    async fn set_last_message(&self, message: LastMessage) -> anyhow::Result<()> {
        self.inner.set_last_message(message).await
    }

    async fn set_timezone(&self, timezone: &str) -> anyhow::Result<()> {
        self.inner.set_timezone(timezone).await
    }

    async fn set_latest_id(&self, id: ReminderId) -> anyhow::Result<()> {
        if self.fail_latest_id.load(Ordering::SeqCst) {
            anyhow::bail!("id rejected");
        }
        self.inner.set_latest_id(id).await
    }
}

#[tokio::test]
async fn failed_id_write_stores_nothing() {
    let storage = Arc::new(FlakyStorage::default());
    storage.fail_latest_id.store(true, Ordering::SeqCst);
    let mut book = ReminderBook::load(storage.clone(), LISBON).await.unwrap();
    let now = lisbon_utc("02/02/2025 10:00");

    let result = book
        .schedule_once(&requester(), "hi", now + TimeDelta::hours(1), now)
        .await;

    assert!(matches!(result, Err(ReminderRequestError::Storage(_))));
    assert_eq!(book.reminders().count(), 0);
    assert!(storage.get_all().await.unwrap().reminders.is_empty());
    assert_eq!(book.reload().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_push_only_skips_an_id() {
    let storage = Arc::new(FlakyStorage::default());
    let mut book = ReminderBook::load(storage.clone(), LISBON).await.unwrap();
    let now = lisbon_utc("02/02/2025 10:00");
    let due = now + TimeDelta::hours(1);

    storage.fail_push.store(true, Ordering::SeqCst);
    let failed = book.schedule_once(&requester(), "lost", due, now).await;
    storage.fail_push.store(false, Ordering::SeqCst);
    let stored = book.schedule_once(&requester(), "kept", due, now).await.unwrap();

    assert!(failed.is_err());
    assert_eq!(stored.id, 2);
    assert_eq!(book.reload().await.unwrap(), 1);
    assert_eq!(book.reminders().next().unwrap().text, "kept");
}

#[tokio::test]
async fn corrupt_latest_id_wraps_without_overflow() {
    let storage = Arc::new(InMemoryReminderStorage::new());
    storage.set_latest_id(u32::MAX).await.unwrap();
    let mut book = ReminderBook::load(storage, LISBON).await.unwrap();
    let now = lisbon_utc("02/02/2025 10:00");

    let reminder = book
        .schedule_once(&requester(), "hi", now + TimeDelta::hours(1), now)
        .await
        .unwrap();

    assert_eq!(reminder.id, u32::MAX % (MAX_REMINDER_ID + 1) + 1);
    assert!(reminder.id <= MAX_REMINDER_ID);
}

#[tokio::test]
async fn reload_picks_up_external_changes() {
    let storage = Arc::new(InMemoryReminderStorage::new());
    let mut book = ReminderBook::load(storage.clone(), LISBON).await.unwrap();
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_once(&requester(), "hi", now + TimeDelta::hours(1), now)
        .await
        .unwrap();

    let key = storage.get_all().await.unwrap().reminders.into_keys().next().unwrap();
    storage.remove(&key).await.unwrap();
    storage.set_timezone("Asia/Tokyo").await.unwrap();

    assert_eq!(book.reload().await.unwrap(), 0);
    assert_eq!(book.reminders().count(), 0);
    assert_eq!(book.timezone(), chrono_tz::Asia::Tokyo);
}

#[tokio::test]
async fn loads_persisted_timezone_over_default() {
    let storage = Arc::new(InMemoryReminderStorage::new());
    storage.set_timezone("Asia/Tokyo").await.unwrap();

    let book = ReminderBook::load(storage, LISBON).await.unwrap();

    assert_eq!(book.timezone(), chrono_tz::Asia::Tokyo);
}

#[tokio::test]
async fn unknown_persisted_timezone_falls_back_to_default() {
    let storage = Arc::new(InMemoryReminderStorage::new());
    storage.set_timezone("Mars/Olympus").await.unwrap();

    let book = ReminderBook::load(storage, LISBON).await.unwrap();

    assert_eq!(book.timezone(), LISBON);
}

#[tokio::test]
async fn set_timezone_is_persisted() {
    let (mut book, storage) = empty_book().await;

    book.set_timezone(chrono_tz::America::New_York).await.unwrap();

    let settings = storage.get_all().await.unwrap().settings;
    assert_eq!(settings.timezone.as_deref(), Some("America/New_York"));
}

#[tokio::test]
async fn schedule_once_validates_the_request() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");

    let too_soon = book
        .schedule_once(&requester(), "hi", now + TimeDelta::seconds(30), now)
        .await;
    let too_far = book
        .schedule_once(&requester(), "hi", now + TimeDelta::days(366), now)
        .await;
    let too_long = book
        .schedule_once(&requester(), &"a".repeat(1001), now + TimeDelta::hours(1), now)
        .await;

    assert!(matches!(too_soon, Err(ReminderRequestError::TooSoon)));
    assert!(matches!(too_far, Err(ReminderRequestError::TooFar)));
    assert!(matches!(too_long, Err(ReminderRequestError::TextTooLong)));
    assert_eq!(book.reminders().count(), 0);
}

#[tokio::test]
async fn schedule_once_accepts_the_boundaries() {
    let (mut book, storage) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");

    book.schedule_once(&requester(), &"a".repeat(1000), now + TimeDelta::minutes(1), now)
        .await
        .unwrap();
    book.schedule_once(&requester(), "far", now + TimeDelta::days(365), now)
        .await
        .unwrap();

    assert_eq!(storage.get_all().await.unwrap().reminders.len(), 2);
}

#[tokio::test]
async fn ids_increase_and_wrap() {
    let storage = Arc::new(InMemoryReminderStorage::new());
    storage.set_latest_id(MAX_REMINDER_ID - 1).await.unwrap();
    let mut book = ReminderBook::load(storage.clone(), LISBON).await.unwrap();
    let now = lisbon_utc("02/02/2025 10:00");
    let due = now + TimeDelta::hours(1);

    let first = book.schedule_once(&requester(), "a", due, now).await.unwrap();
    let second = book.schedule_once(&requester(), "b", due, now).await.unwrap();

    assert_eq!(first.id, MAX_REMINDER_ID);
    assert_eq!(second.id, 0);
    assert_eq!(storage.get_all().await.unwrap().settings.latest_id, 0);
}

#[tokio::test]
async fn periodic_reminders_store_their_schedule() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");

    let reminder = book
        .schedule_periodic(&requester(), "plants", "1week2d", Some(3), "Water", now)
        .await
        .unwrap();

    assert_eq!(reminder.timestamp, lisbon_utc("11/02/2025 10:00"));
    let ReminderKind::Periodic(schedule) = reminder.kind else {
        panic!("Expected a periodic reminder.");
    };
    assert_eq!(schedule.raw_time, "1week2d");
    assert_eq!(
        schedule.unit_values,
        BTreeMap::from([("d".to_string(), 2), ("w".to_string(), 1)])
    );
    assert_eq!(schedule.remaining_occurrences, Some(3));
}

#[tokio::test]
async fn periodic_names_are_unique_ignoring_case() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");

    book.schedule_periodic(&requester(), "Plants", "1d", None, "Water", now)
        .await
        .unwrap();
    let duplicate = book
        .schedule_periodic(&requester(), "plants", "2d", None, "Water", now)
        .await;

    assert!(matches!(duplicate, Err(ReminderRequestError::DuplicateName(_))));
}

#[tokio::test]
async fn periodic_rejects_invalid_durations() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");

    let invalid = book
        .schedule_periodic(&requester(), "x", "1d1d", None, "Water", now)
        .await;

    assert!(matches!(
        invalid,
        Err(ReminderRequestError::InvalidTime(TimeParseError::DuplicateUnit(_)))
    ));
}

#[tokio::test]
async fn clear_removes_by_name_ignoring_case() {
    let (mut book, storage) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_periodic(&requester(), "Plants", "1d", None, "Water", now)
        .await
        .unwrap();

    assert!(book.clear_periodic("nothing").await.unwrap().is_none());
    let removed = book.clear_periodic("PLANTS").await.unwrap().unwrap();

    assert_eq!(removed.text, "Water");
    assert!(storage.get_all().await.unwrap().reminders.is_empty());
}

#[tokio::test]
async fn announce_sends_due_reminders_in_order() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_once(&requester(), "second", now + TimeDelta::hours(2), now)
        .await
        .unwrap();
    book.schedule_once(&requester(), "first", now + TimeDelta::hours(1), now)
        .await
        .unwrap();
    book.schedule_once(&requester(), "later", now + TimeDelta::days(2), now)
        .await
        .unwrap();
    let channel = RecordingChannel::new(Outcome::Delivered);

    let handled = book.announce_due(now + TimeDelta::hours(3), &channel).await;

    assert_eq!(handled, 2);
    assert_eq!(channel.messages(), vec!["ana says: first", "ana says: second"]);
    assert_eq!(book.reminders().count(), 1);
    assert_eq!(book.last_message().unwrap().text, "second");
}

#[tokio::test]
async fn announce_renews_periodic_reminders() {
    let (mut book, storage) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_periodic(&requester(), "plants", "1d", Some(2), "Water", now)
        .await
        .unwrap();
    let channel = RecordingChannel::new(Outcome::Delivered);
    let fired_at = lisbon_utc("03/02/2025 10:00");

    book.announce_due(fired_at, &channel).await;

    let stored = storage.get_all().await.unwrap().reminders;
    let renewed = stored.values().next().unwrap();
    assert_eq!(
        renewed.timestamp,
        lisbon_utc("04/02/2025 10:00") - TimeDelta::seconds(5)
    );
    let ReminderKind::Periodic(schedule) = &renewed.kind else {
        panic!("Expected a periodic reminder.");
    };
    assert_eq!(schedule.remaining_occurrences, Some(1));

    book.announce_due(lisbon_utc("04/02/2025 10:00"), &channel).await;

    assert_eq!(book.reminders().count(), 0);
    assert!(storage.get_all().await.unwrap().reminders.is_empty());
    assert_eq!(channel.messages().len(), 2);
}

#[tokio::test]
async fn announce_drops_reminders_whose_destination_is_gone() {
    let (mut book, storage) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_periodic(&requester(), "plants", "1d", None, "Water", now)
        .await
        .unwrap();
    let channel = RecordingChannel::new(Outcome::Gone);

    book.announce_due(lisbon_utc("03/02/2025 10:00"), &channel).await;

    assert_eq!(book.reminders().count(), 0);
    assert!(storage.get_all().await.unwrap().reminders.is_empty());
    assert!(book.last_message().is_none());
}

#[tokio::test]
async fn transport_failures_do_not_stop_the_pass() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_once(&requester(), "a", now + TimeDelta::hours(1), now)
        .await
        .unwrap();
    book.schedule_once(&requester(), "b", now + TimeDelta::hours(1), now)
        .await
        .unwrap();
    let channel = RecordingChannel::new(Outcome::Broken);

    let handled = book.announce_due(now + TimeDelta::hours(2), &channel).await;

    assert_eq!(handled, 2);
    assert_eq!(channel.messages().len(), 2);
    assert_eq!(book.reminders().count(), 0);
}

#[tokio::test]
async fn delay_recreates_last_announced_message() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");

    let nothing = book.delay_last(&requester(), "10m", now).await;
    assert!(matches!(nothing, Err(ReminderRequestError::NothingToDelay)));

    book.schedule_once(&requester(), "stretch", now + TimeDelta::hours(1), now)
        .await
        .unwrap();
    let fired_at = now + TimeDelta::hours(1);
    book.announce_due(fired_at, &RecordingChannel::new(Outcome::Delivered))
        .await;

    let delayed = book.delay_last(&requester(), "10m", fired_at).await.unwrap();

    assert_eq!(delayed.text, "stretch");
    assert_eq!(delayed.timestamp, fired_at + TimeDelta::minutes(10));
    assert!(!delayed.is_periodic());
}

#[tokio::test]
async fn list_is_sorted_and_categorized() {
    let (mut book, _) = empty_book().await;
    let now = lisbon_utc("02/02/2025 10:00");
    book.schedule_once(&requester(), "later", lisbon_utc("10/02/2025 09:00"), now)
        .await
        .unwrap();
    book.schedule_once(&requester(), "soon", lisbon_utc("02/02/2025 11:00"), now)
        .await
        .unwrap();

    let page = book.list_page(now, 1);

    assert_eq!(page.count, 1);
    assert_eq!(
        page.text,
        "Today:\n\
         ➜ 'soon' at Sunday, February 2nd 2025, 11:00 (in 1 hour)\n\
         Later:\n\
         ➜ 'later' at Monday, February 10th 2025, 09:00 (in 7 days)"
    );
}
