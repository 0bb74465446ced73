//! Re-arming of periodic reminders after they were announced.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::reminder::{Reminder, ReminderKind};
use crate::time::UnitValues;

/// Subtracted from every renewed due time so the next firing is never missed by a check that
/// runs a moment early.
pub const SAFETY_MARGIN_SECS: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Renewal {
    Renewed(Reminder),
    Exhausted,
}

/// Computes the next occurrence of a reminder that was just announced.
///
/// One-off reminders and periodic reminders whose last occurrence just fired are
/// [`Renewal::Exhausted`]. Unknown unit keys in the stored schedule are skipped.
pub fn renew(mut reminder: Reminder, now: DateTime<Utc>, tz: Tz) -> Renewal {
    let ReminderKind::Periodic(schedule) = &mut reminder.kind else {
        return Renewal::Exhausted;
    };

    if schedule.remaining_occurrences.is_some_and(|remaining| remaining <= 1) {
        log::info!(
            "Periodic reminder ran out of occurrences. [reminder_id = {}, name = {}]",
            reminder.id,
            schedule.name
        );
        return Renewal::Exhausted;
    }

    let (unit_values, skipped) = UnitValues::from_stored_lossy(&schedule.unit_values);
    if !skipped.is_empty() {
        log::warn!(
            "Skipping unusable units while renewing reminder. [reminder_id = {}, units = {:?}]",
            reminder.id,
            skipped
        );
    }

    if unit_values.is_empty() {
        log::warn!(
            "Periodic reminder has no usable units left, dropping it. [reminder_id = {}]",
            reminder.id
        );
        return Renewal::Exhausted;
    }

    let Some(next_due) = unit_values.apply(now.with_timezone(&tz)) else {
        log::warn!(
            "Next occurrence is out of range, dropping reminder. [reminder_id = {}]",
            reminder.id
        );
        return Renewal::Exhausted;
    };

    schedule.remaining_occurrences = schedule.remaining_occurrences.map(|remaining| remaining - 1);
    reminder.timestamp = next_due.with_timezone(&Utc) - TimeDelta::seconds(SAFETY_MARGIN_SECS);

    Renewal::Renewed(reminder)
}
