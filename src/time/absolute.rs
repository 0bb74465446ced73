use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use super::{TimeParseError, resolve_local};

/// Clock time used when the user only gives a date.
pub const DEFAULT_TIME: &str = "06:00";

const CANONICAL_FORMAT: &str = "%d/%m/%Y %H:%M";

static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})$").expect("Short date pattern is valid."));
static LONG_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("Long date pattern is valid.")
});
static SHORT_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[hH]$").expect("Short time pattern is valid."));
static LONG_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("Long time pattern is valid."));
static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}$").expect("Canonical pattern is valid.")
});

#[derive(Debug, Clone, PartialEq)]
pub struct AbsoluteTime {
    pub instant: DateTime<Tz>,
    /// `false` when [`DEFAULT_TIME`] was substituted. Callers use it to decide whether the
    /// token after the date was a time or the start of the message.
    pub time_was_explicit: bool,
}

/// Parses a date token (`fri`, `today`, `3/2`, `31/01/2030`) and an optional time token
/// (`8h`, `14H`, `7:15`) relative to `now` in `tz`.
pub fn parse_absolute(
    date_token: &str,
    time_token: Option<&str>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<AbsoluteTime, TimeParseError> {
    let today = now.with_timezone(&tz).date_naive();
    let date = normalize_date(date_token, today)
        .ok_or_else(|| TimeParseError::AmbiguousOrMissingDate(date_token.to_string()))?;

    let (time, time_was_explicit) = match time_token.and_then(normalize_time) {
        Some(time) => (time, true),
        None => (DEFAULT_TIME.to_string(), false),
    };

    let canonical = format!("{date} {time}");
    if !CANONICAL.is_match(&canonical) {
        return Err(TimeParseError::InvalidFormat(canonical));
    }

    let local = NaiveDateTime::parse_from_str(&canonical, CANONICAL_FORMAT)
        .map_err(|_| TimeParseError::AmbiguousOrMissingDate(canonical.clone()))?;
    let instant = resolve_local(&tz, local)
        .ok_or_else(|| TimeParseError::AmbiguousOrMissingDate(canonical.clone()))?;

    Ok(AbsoluteTime {
        instant,
        time_was_explicit,
    })
}

/// Turns a date token into `DD/MM/YYYY`.
fn normalize_date(token: &str, today: NaiveDate) -> Option<String> {
    if token.chars().all(|c| c.is_ascii_alphabetic()) {
        return resolve_date_word(token, today).map(|date| date.format("%d/%m/%Y").to_string());
    }

    if let Some(captures) = SHORT_DATE.captures(token) {
        return Some(format!(
            "{}/{}/{}",
            zero_pad(&captures[1])?,
            zero_pad(&captures[2])?,
            today.year()
        ));
    }

    if let Some(captures) = LONG_DATE.captures(token) {
        return Some(format!(
            "{}/{}/{}",
            zero_pad(&captures[1])?,
            zero_pad(&captures[2])?,
            &captures[3]
        ));
    }

    None
}

/// Resolves `today`, `tomorrow` and weekday names.
///
/// A weekday always lands in the future: naming the current weekday gives the same weekday
/// next week.
fn resolve_date_word(word: &str, today: NaiveDate) -> Option<NaiveDate> {
    let target = match word.to_ascii_lowercase().as_str() {
        "today" => return Some(today),
        "tomorrow" | "tmrw" => return today.succ_opt(),
        "sun" | "sunday" => Weekday::Sun,
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        _ => return None,
    };

    let current = today.weekday().num_days_from_sunday();
    let target = target.num_days_from_sunday();
    let days_ahead = if target > current {
        target - current
    } else {
        target + 7 - current
    };

    today.checked_add_days(Days::new(u64::from(days_ahead)))
}

/// Turns a time token into `HH:MM`. Unrecognized tokens yield `None`.
fn normalize_time(token: &str) -> Option<String> {
    if let Some(captures) = SHORT_TIME.captures(token) {
        return Some(format!("{}:00", zero_pad(&captures[1])?));
    }

    if let Some(captures) = LONG_TIME.captures(token) {
        return Some(format!("{}:{}", zero_pad(&captures[1])?, &captures[2]));
    }

    None
}

fn zero_pad(digits: &str) -> Option<String> {
    digits.parse::<u32>().ok().map(|value| format!("{value:02}"))
}
