use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

use super::CalendarUnit;

/// Long form used in replies, e.g. `Sunday, February 9th 2025, 11:05`.
pub fn format_long(at: DateTime<Tz>) -> String {
    format!(
        "{}{} {}",
        at.format("%A, %B %-d"),
        ordinal_suffix(at.day()),
        at.format("%Y, %H:%M")
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Describes how far `to` is from `from`, e.g. `1 day and 2 hours` or `3 months`.
///
/// Months and days follow the calendar in `tz`; only the two most significant parts are
/// spelled out, except for short spans of one or two days where minutes are kept too.
pub fn humanize_until(from: DateTime<Utc>, to: DateTime<Utc>, tz: Tz) -> String {
    let cursor = from.with_timezone(&tz);
    let target = to.with_timezone(&tz);

    let (months, cursor) = whole_units_between(CalendarUnit::Month, cursor, target);
    let (days, cursor) = whole_units_between(CalendarUnit::Day, cursor, target);
    let remainder = target.signed_duration_since(cursor);
    let hours = remainder.num_hours().max(0);
    let minutes = (remainder.num_minutes() - hours * 60).max(0);

    let days_text = plural("day", i64::from(days));
    let hours_text = plural("hour", hours);
    let minutes_text = plural("minute", minutes);

    if let Some(months_text) = plural("month", i64::from(months)) {
        return match days_text {
            Some(days_text) => format!("{months_text} and {days_text}"),
            None => months_text,
        };
    }

    if let Some(days_text) = days_text {
        if days > 2 {
            return days_text;
        }
        return match (hours_text, minutes_text) {
            (None, None) => days_text,
            (Some(hours_text), None) => format!("{days_text} and {hours_text}"),
            (None, Some(minutes_text)) => format!("{days_text} and {minutes_text}"),
            (Some(hours_text), Some(minutes_text)) => {
                format!("{days_text}, {hours_text} and {minutes_text}")
            }
        };
    }

    match (hours_text, minutes_text) {
        (Some(hours_text), Some(minutes_text)) => format!("{hours_text} and {minutes_text}"),
        (Some(hours_text), None) => hours_text,
        (None, Some(minutes_text)) => minutes_text,
        (None, None) => "less than a minute".to_string(),
    }
}

/// Largest count of `unit` that can be added to `from` without passing `to`, and the
/// instant reached.
fn whole_units_between(
    unit: CalendarUnit,
    from: DateTime<Tz>,
    to: DateTime<Tz>,
) -> (u32, DateTime<Tz>) {
    let estimate = match unit {
        CalendarUnit::Month => {
            (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
        }
        _ => to.signed_duration_since(from).num_days() as i32 + 1,
    };

    let mut count = u32::try_from(estimate).unwrap_or(0);
    while count > 0 {
        if let Some(reached) = unit.add_to(from, count).filter(|reached| *reached <= to) {
            return (count, reached);
        }
        count -= 1;
    }

    (0, from)
}

fn plural(word: &str, amount: i64) -> Option<String> {
    match amount {
        amount if amount <= 0 => None,
        1 => Some(format!("1 {word}")),
        amount => Some(format!("{amount} {word}s")),
    }
}
