use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, NaiveDateTime, TimeDelta};
use chrono_tz::Tz;

use super::{TimeParseError, resolve_local};

/// Calendar granularity of a duration component.
///
/// The declaration order is the order in which units are applied, so ordered collections of
/// units (see [`UnitValues`]) always iterate year -> month -> week -> day -> hour -> minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalendarUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
}

/// Canonical key and long alias of every unit.
const UNIT_ALIASES: [(CalendarUnit, &str, &str); 6] = [
    (CalendarUnit::Year, "y", "year"),
    (CalendarUnit::Month, "mo", "month"),
    (CalendarUnit::Week, "w", "week"),
    (CalendarUnit::Day, "d", "day"),
    (CalendarUnit::Hour, "h", "hour"),
    (CalendarUnit::Minute, "m", "minute"),
];

impl CalendarUnit {
    pub fn key(self) -> &'static str {
        self.aliases().0
    }

    pub fn name(self) -> &'static str {
        self.aliases().1
    }

    fn aliases(self) -> (&'static str, &'static str) {
        UNIT_ALIASES
            .iter()
            .find(|(unit, _, _)| *unit == self)
            .map(|(_, key, name)| (*key, *name))
            .unwrap_or_default()
    }

    /// Looks a unit up by its canonical key or long name, ignoring case.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        UNIT_ALIASES
            .iter()
            .find(|(_, key, name)| *key == token || *name == token)
            .map(|(unit, _, _)| *unit)
    }

    /// Adds `magnitude` of this unit to `at`.
    ///
    /// Years, months, weeks and days move the local calendar date and keep the wall-clock
    /// time (month ends clamp, e.g. Jan 31 + 1 month = Feb 28). Hours and minutes add elapsed
    /// time. Returns `None` when the result is out of range.
    pub fn add_to(self, at: DateTime<Tz>, magnitude: u32) -> Option<DateTime<Tz>> {
        match self {
            CalendarUnit::Year => shift_local(at, |local| {
                local.checked_add_months(Months::new(magnitude.checked_mul(12)?))
            }),
            CalendarUnit::Month => {
                shift_local(at, |local| local.checked_add_months(Months::new(magnitude)))
            }
            CalendarUnit::Week => shift_local(at, |local| {
                local.checked_add_days(Days::new(u64::from(magnitude) * 7))
            }),
            CalendarUnit::Day => {
                shift_local(at, |local| local.checked_add_days(Days::new(u64::from(magnitude))))
            }
            CalendarUnit::Hour => {
                at.checked_add_signed(TimeDelta::try_hours(i64::from(magnitude))?)
            }
            CalendarUnit::Minute => {
                at.checked_add_signed(TimeDelta::try_minutes(i64::from(magnitude))?)
            }
        }
    }
}

fn shift_local(
    at: DateTime<Tz>,
    shift: impl FnOnce(NaiveDateTime) -> Option<NaiveDateTime>,
) -> Option<DateTime<Tz>> {
    let shifted = shift(at.naive_local())?;
    resolve_local(&at.timezone(), shifted)
}

impl FromStr for CalendarUnit {
    type Err = TimeParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::from_token(token).ok_or_else(|| TimeParseError::UnknownUnit(token.to_string()))
    }
}

impl fmt::Display for CalendarUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unit -> magnitude pairs of one duration expression.
///
/// Every unit appears at most once and every magnitude is positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitValues(BTreeMap<CalendarUnit, u32>);

impl UnitValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: CalendarUnit, magnitude: u32) -> Result<(), TimeParseError> {
        if magnitude == 0 {
            return Err(TimeParseError::NonPositiveMagnitude(format!("0{unit}")));
        }
        if self.0.contains_key(&unit) {
            return Err(TimeParseError::DuplicateUnit(unit.name().to_string()));
        }

        self.0.insert(unit, magnitude);
        Ok(())
    }

    pub fn get(&self, unit: CalendarUnit) -> Option<u32> {
        self.0.get(&unit).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Units in application order.
    pub fn iter(&self) -> impl Iterator<Item = (CalendarUnit, u32)> + '_ {
        self.0.iter().map(|(unit, magnitude)| (*unit, *magnitude))
    }

    /// Applies every unit to `base` in the fixed unit order.
    pub fn apply(&self, base: DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.iter()
            .try_fold(base, |at, (unit, magnitude)| unit.add_to(at, magnitude))
    }

    /// String-keyed form used for persistence.
    pub fn to_stored(&self) -> BTreeMap<String, u32> {
        self.iter()
            .map(|(unit, magnitude)| (unit.key().to_string(), magnitude))
            .collect()
    }

    /// Rebuilds unit values from persisted data, accepting long aliases.
    ///
    /// Keys that are unknown, zero or that duplicate an already seen unit are returned in the
    /// second element instead of failing the whole conversion.
    pub fn from_stored_lossy(stored: &BTreeMap<String, u32>) -> (Self, Vec<String>) {
        let mut unit_values = Self::new();
        let mut skipped = Vec::new();

        for (key, magnitude) in stored {
            let inserted = CalendarUnit::from_token(key)
                .map(|unit| unit_values.insert(unit, *magnitude).is_ok())
                .unwrap_or(false);

            if !inserted {
                skipped.push(key.clone());
            }
        }

        (unit_values, skipped)
    }
}

/// Canonical spelling, e.g. `3y1mo2w6d12h36m`.
impl fmt::Display for UnitValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (unit, magnitude) in self.iter() {
            write!(f, "{magnitude}{unit}")?;
        }
        Ok(())
    }
}
