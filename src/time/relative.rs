use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;

use super::{CalendarUnit, TimeParseError, UnitValues};

static DURATION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+|[A-Za-z]+").expect("Duration token pattern is valid."));

/// A duration expression applied to a base instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeTime {
    pub instant: DateTime<Tz>,
    pub unit_values: UnitValues,
}

/// Parses a duration such as `3d2h1m` or `1week2day` and applies it to `base` in `tz`.
///
/// The returned instant carries no safety margin; that is the renewal engine's business.
pub fn parse_relative(
    base: DateTime<Utc>,
    duration: &str,
    tz: Tz,
) -> Result<RelativeTime, TimeParseError> {
    let unit_values = parse_unit_values(duration)?;
    let instant = unit_values
        .apply(base.with_timezone(&tz))
        .ok_or_else(|| TimeParseError::InvalidFormat(format!("{duration} is out of range")))?;

    Ok(RelativeTime {
        instant,
        unit_values,
    })
}

/// Splits a duration into (amount, unit) pairs without applying it.
pub(crate) fn parse_unit_values(duration: &str) -> Result<UnitValues, TimeParseError> {
    let tokens: Vec<&str> = DURATION_TOKEN
        .find_iter(duration)
        .map(|token| token.as_str())
        .collect();

    if tokens.is_empty() {
        return Err(TimeParseError::InvalidFormat(duration.to_string()));
    }

    let mut unit_values = UnitValues::new();
    for pair in tokens.chunks(2) {
        let [amount, unit] = pair else {
            return Err(TimeParseError::InvalidFormat(duration.to_string()));
        };

        let magnitude = parse_magnitude(amount)?;
        let unit = unit.parse::<CalendarUnit>()?;
        unit_values.insert(unit, magnitude)?;
    }

    Ok(unit_values)
}

fn parse_magnitude(amount: &str) -> Result<u32, TimeParseError> {
    if !amount.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(TimeParseError::InvalidFormat(amount.to_string()));
    }

    match amount.parse::<u32>() {
        Ok(0) => Err(TimeParseError::NonPositiveMagnitude(amount.to_string())),
        Ok(magnitude) => Ok(magnitude),
        Err(_) => Err(TimeParseError::InvalidFormat(amount.to_string())),
    }
}
