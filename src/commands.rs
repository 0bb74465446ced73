//! Command argument handling, independent of the chat transport.
//!
//! Every handler returns the reply to show the user. Validation problems become replies;
//! only storage failures are returned as errors.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::book::{ReminderBook, ReminderRequestError, Requester};
use crate::delivery::ReminderDeliveryChannel;
use crate::reminder::Reminder;
use crate::time::{format_long, humanize_until, parse_absolute, parse_relative};

static OCCURRENCES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[xX]([0-9]+)$").expect("Occurrence pattern is valid."));

const REMIND_USAGE: &str = "/remind in 1d10h20m It is time!\n\
    /remind at 31/01/2030 00:45 It is time!\n\
    /remind at fri 11:05 It is time!\n\
    Durations use the units year/y, month/mo, week/w, day/d, hour/h and minute/m. \
    Dates can be a weekday, today, tomorrow, D/M or D/M/YYYY; the time defaults to 06:00.";

const PERIODIC_USAGE: &str = "/periodic plants 2d x10 Water the plants!\n\
    The name should be one word. The optional xN limits how many times it repeats.";

const DELAY_USAGE: &str = "/delay 1h30m";

const CLEAR_USAGE: &str = "/clear plants\n\
    The name should be the one word name of a periodic reminder. Use /list to check all names.";

pub const HELP: &str = "These commands are supported:\n\
    /help - show this text\n\
    /remind in <duration> <text> - remind once after a duration\n\
    /remind at <date> [time] <text> - remind once at a date\n\
    /periodic <name> <duration> [xN] <text> - remind every <duration>\n\
    /delay <duration> - repeat the last announced reminder later\n\
    /list [page] - show all reminders\n\
    /clear <name> - delete a periodic reminder\n\
    /timezone [name] - show or change the timezone\n\
    /check - announce due reminders now (owner only)\n\
    /reload - reload reminders from storage (owner only)";

pub const OWNER_ONLY: &str = "You must be the bot owner to use this command!";

/// The context a command runs in.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub requester: Requester,
    pub now: DateTime<Utc>,
}

pub async fn remind(
    book: &mut ReminderBook,
    invocation: &Invocation,
    args: &str,
) -> anyhow::Result<String> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let tz = book.timezone();

    let parsed = match tokens.as_slice() {
        [mode, duration, text @ ..] if mode.eq_ignore_ascii_case("in") && !text.is_empty() => {
            parse_relative(invocation.now, duration, tz)
                .map(|relative| (relative.instant.with_timezone(&Utc), text.join(" ")))
        }
        [mode, date, rest @ ..] if mode.eq_ignore_ascii_case("at") && !rest.is_empty() => {
            parse_absolute(date, rest.first().copied(), invocation.now, tz).map(|absolute| {
                let text = if absolute.time_was_explicit { &rest[1..] } else { rest };
                (absolute.instant.with_timezone(&Utc), text.join(" "))
            })
        }
        _ => return Ok(usage_reply("To set a reminder, you can type", REMIND_USAGE)),
    };

    let (due, text) = match parsed {
        Ok((_, text)) if text.is_empty() => {
            return Ok(usage_reply("To set a reminder, you can type", REMIND_USAGE));
        }
        Ok(parsed) => parsed,
        Err(error) => {
            return Ok(invalid_time_reply(
                &ReminderRequestError::from(error),
                REMIND_USAGE,
            ));
        }
    };

    let result = book
        .schedule_once(&invocation.requester, &text, due, invocation.now)
        .await;
    settle(result, REMIND_USAGE, |reminder| {
        format!(
            "Your reminder has been set for {}! (in {})",
            format_long(reminder.timestamp.with_timezone(&tz)),
            humanize_until(invocation.now, reminder.timestamp, tz)
        )
    })
}

pub async fn periodic(
    book: &mut ReminderBook,
    invocation: &Invocation,
    args: &str,
) -> anyhow::Result<String> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    let [name, duration, rest @ ..] = tokens.as_slice() else {
        return Ok(usage_reply("To set a periodic reminder, you can type", PERIODIC_USAGE));
    };

    let (occurrences, text) = match rest.split_first() {
        Some((first, text)) if OCCURRENCES.is_match(first) => {
            match first[1..].parse::<u32>() {
                Ok(count) if count > 0 => (Some(count), text),
                _ => {
                    return Ok(usage_reply(
                        "The repeat count must be a positive number, for example",
                        PERIODIC_USAGE,
                    ));
                }
            }
        }
        _ => (None, rest),
    };

    if text.is_empty() {
        return Ok(usage_reply("To set a periodic reminder, you can type", PERIODIC_USAGE));
    }

    let result = book
        .schedule_periodic(
            &invocation.requester,
            name,
            duration,
            occurrences,
            &text.join(" "),
            invocation.now,
        )
        .await;
    settle(result, PERIODIC_USAGE, |_| match occurrences {
        Some(count) => {
            format!("Your reminder named '{name}' will repeat every {duration}, {count} times!")
        }
        None => format!("Your reminder named '{name}' will repeat every {duration}!"),
    })
}

pub async fn delay(
    book: &mut ReminderBook,
    invocation: &Invocation,
    args: &str,
) -> anyhow::Result<String> {
    let Some(duration) = args.split_whitespace().next() else {
        return Ok(usage_reply("To delay a reminder, you can type", DELAY_USAGE));
    };

    let tz = book.timezone();
    let result = book
        .delay_last(&invocation.requester, duration, invocation.now)
        .await;
    settle(result, DELAY_USAGE, |reminder| {
        format!(
            "Your reminder '{}' has been set for {}!",
            reminder.text,
            format_long(reminder.timestamp.with_timezone(&tz))
        )
    })
}

pub fn list(book: &ReminderBook, invocation: &Invocation, args: &str) -> String {
    let requested = args
        .split_whitespace()
        .next()
        .and_then(|page| page.parse::<usize>().ok())
        .unwrap_or(1);

    let page = book.list_page(invocation.now, requested);
    match page.count {
        0 => "There are no reminders.".to_string(),
        1 => page.text,
        count => format!("{}\n\nPage {}/{}", page.text, page.index, count),
    }
}

pub async fn clear(book: &mut ReminderBook, args: &str) -> anyhow::Result<String> {
    let Some(name) = args.split_whitespace().next() else {
        return Ok(usage_reply("To clear a reminder, you can type", CLEAR_USAGE));
    };

    Ok(match book.clear_periodic(name).await? {
        Some(_) => format!("Deleted the reminder named '{name}'."),
        None => "Did not find a reminder with that name. Use /list to check all names.".to_string(),
    })
}

pub async fn timezone(book: &mut ReminderBook, args: &str) -> anyhow::Result<String> {
    let Some(name) = args.split_whitespace().next() else {
        return Ok(format!("The current timezone is {}.", book.timezone()));
    };

    match name.parse::<Tz>() {
        Ok(tz) => {
            book.set_timezone(tz).await?;
            Ok(format!("Timezone set to {tz}."))
        }
        Err(_) => Ok(format!(
            "Unknown timezone '{name}'. Use an IANA name such as Europe/Lisbon."
        )),
    }
}

/// Runs an announcement pass right away.
pub async fn check(
    book: &mut ReminderBook,
    delivery: &dyn ReminderDeliveryChannel,
    invocation: &Invocation,
) -> String {
    let handled = book.announce_due(invocation.now, delivery).await;
    format!("'check' done, {handled} due reminder(s) announced.")
}

/// Drops the in-memory state and reads it back from storage.
pub async fn reload(book: &mut ReminderBook) -> anyhow::Result<String> {
    let count = book.reload().await?;
    Ok(format!("'reload' done, {count} reminder(s) loaded."))
}

fn usage_reply(lead: &str, usage: &str) -> String {
    format!("{lead}:\n{usage}")
}

fn invalid_time_reply(error: &ReminderRequestError, usage: &str) -> String {
    format!("This time seems to be invalid ({error}). Try something like:\n{usage}")
}

/// Turns a scheduling result into a reply, letting storage failures through.
fn settle(
    result: Result<Reminder, ReminderRequestError>,
    usage: &str,
    on_success: impl FnOnce(&Reminder) -> String,
) -> anyhow::Result<String> {
    match result {
        Ok(reminder) => Ok(on_success(&reminder)),
        Err(ReminderRequestError::Storage(error)) => Err(error),
        Err(error @ ReminderRequestError::InvalidTime(_)) => Ok(invalid_time_reply(&error, usage)),
        Err(error) => Ok(error.to_string()),
    }
}
