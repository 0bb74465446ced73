//! Parsing of user supplied time expressions ("1d10h20m", "fri 11:05", "31/01/2030 00:45")
//! and the timezone-aware calendar arithmetic shared by the parsers and the renewal engine.
//!
//! Everything in here is a pure function of its inputs: callers pass the "now" anchor and the
//! timezone explicitly.

mod absolute;
mod humanize;
mod relative;
mod unit;

#[cfg(test)]
mod tests;

pub use absolute::{AbsoluteTime, DEFAULT_TIME, parse_absolute};
pub use humanize::{format_long, humanize_until};
pub use relative::{RelativeTime, parse_relative};
pub use unit::{CalendarUnit, UnitValues};

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Malformed time expression: {0}")]
    InvalidFormat(String),

    #[error("Time unit used more than once: {0}")]
    DuplicateUnit(String),

    #[error("Unknown time unit: {0}")]
    UnknownUnit(String),

    #[error("Amount must be a positive integer: {0}")]
    NonPositiveMagnitude(String),

    #[error("Could not resolve a date from: {0}")]
    AmbiguousOrMissingDate(String),
}

/// Interprets a wall-clock time in `tz`.
///
/// Ambiguous times (clocks going back) resolve to the earlier instant. Times that fall into a
/// gap (clocks going forward) are moved forward by the length of the gap, so 01:30 in a
/// 01:00 -> 02:00 gap becomes 02:30.
pub(crate) fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(resolved) => Some(resolved),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let before_gap = tz
                .offset_from_local_datetime(&local.checked_sub_signed(TimeDelta::days(1))?)
                .earliest()?;
            let utc = local.checked_sub_signed(TimeDelta::seconds(i64::from(
                before_gap.fix().local_minus_utc(),
            )))?;

            Some(tz.from_utc_datetime(&utc))
        }
    }
}
