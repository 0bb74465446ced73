
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub(super) const LISBON: Tz = chrono_tz::Europe::Lisbon;

/// `DD/MM/YYYY HH:mm` in Europe/Lisbon.
pub(super) fn lisbon(text: &str) -> DateTime<Tz> {
    let local = NaiveDateTime::parse_from_str(text, "%d/%m/%Y %H:%M").unwrap();
    LISBON.from_local_datetime(&local).single().unwrap()
}

pub(super) fn lisbon_utc(text: &str) -> DateTime<Utc> {
    lisbon(text).with_timezone(&Utc)
}
