//! Rendering of the reminder list into size-limited pages.

use chrono::{DateTime, Days, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::reminder::{Reminder, ReminderKind};
use crate::time::{format_long, humanize_until};

/// Soft size limit of one page, in characters. Leaves room for a page footer below
/// Telegram's message limit.
pub const PAGE_CHAR_LIMIT: usize = 1950;

const TRUNCATION_MARKER: &str = " (...)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCategory {
    pub label: String,
    /// Entries due strictly before this instant belong here. The last category is unbounded.
    pub upper_bound: Option<DateTime<Utc>>,
}

impl ListCategory {
    pub fn new(label: impl Into<String>, upper_bound: Option<DateTime<Utc>>) -> Self {
        Self {
            label: label.into(),
            upper_bound,
        }
    }

    fn contains(&self, due: DateTime<Utc>) -> bool {
        self.upper_bound.is_none_or(|bound| due < bound)
    }

    fn banner(&self) -> String {
        format!("{}:", self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub due: DateTime<Utc>,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    /// 1-based, 0 when there is nothing to show.
    pub index: usize,
    pub count: usize,
}

/// Today / Tomorrow / Later split at local midnights in `tz`.
pub fn day_categories(now: DateTime<Utc>, tz: Tz) -> Vec<ListCategory> {
    let today = now.with_timezone(&tz).date_naive();
    let midnight_after = |days: u64| {
        today
            .checked_add_days(Days::new(days))
            .and_then(|date| crate::time::resolve_local(&tz, date.and_time(NaiveTime::MIN)))
            .map(|instant| instant.with_timezone(&Utc))
    };

    vec![
        ListCategory::new("Today", midnight_after(1)),
        ListCategory::new("Tomorrow", midnight_after(2)),
        ListCategory::new("Later", None),
    ]
}

/// One line describing a reminder, relative to `now`.
pub fn describe(reminder: &Reminder, now: DateTime<Utc>, tz: Tz) -> ListEntry {
    let relative = humanize_until(now, reminder.timestamp, tz);
    let line = match &reminder.kind {
        ReminderKind::OneOff => format!(
            "➜ '{}' at {} (in {relative})",
            reminder.text,
            format_long(reminder.timestamp.with_timezone(&tz))
        ),
        ReminderKind::Periodic(schedule) => {
            let mut line = format!(
                "➜ {}: '{}' every {} (next up in {relative})",
                schedule.name, reminder.text, schedule.raw_time
            );
            if let Some(remaining) = schedule.remaining_occurrences {
                line.push_str(&format!(" ({remaining} left)"));
            }
            line
        }
    };

    ListEntry {
        due: reminder.timestamp,
        line,
    }
}

/// Splits chronologically sorted entries into pages and returns the requested one.
///
/// Each category banner is placed once, right before the first entry of its category, and
/// always lands on the same page as that entry. `requested_page` is 1-based and clamped.
pub fn paginate(entries: &[ListEntry], categories: &[ListCategory], requested_page: usize) -> Page {
    let pages = split_pages(&blocks(entries, categories));
    if pages.is_empty() {
        return Page {
            text: String::new(),
            index: 0,
            count: 0,
        };
    }

    let count = pages.len();
    let index = requested_page.clamp(1, count);

    Page {
        text: pages[index - 1].clone(),
        index,
        count,
    }
}

/// Lines with their banners attached, each truncated to fit one page.
fn blocks(entries: &[ListEntry], categories: &[ListCategory]) -> Vec<String> {
    let mut announced: Option<usize> = None;
    let mut blocks = Vec::with_capacity(entries.len());

    for entry in entries {
        let category = categories
            .iter()
            .position(|category| category.contains(entry.due));

        let block = match category {
            Some(index) if announced.is_none_or(|last| index > last) => {
                announced = Some(index);
                format!("{}\n{}", categories[index].banner(), entry.line)
            }
            _ => entry.line.clone(),
        };

        blocks.push(truncate(block));
    }

    blocks
}

fn truncate(block: String) -> String {
    if block.chars().count() <= PAGE_CHAR_LIMIT {
        return block;
    }

    let keep = PAGE_CHAR_LIMIT - TRUNCATION_MARKER.chars().count();
    let mut truncated: String = block.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

fn split_pages(blocks: &[String]) -> Vec<String> {
    let mut pages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for block in blocks {
        let block_len = block.chars().count();

        if current.is_empty() {
            current.push_str(block);
            current_len = block_len;
        } else if current_len + 1 + block_len <= PAGE_CHAR_LIMIT {
            current.push('\n');
            current.push_str(block);
            current_len += 1 + block_len;
        } else {
            pages.push(std::mem::take(&mut current));
            current.push_str(block);
            current_len = block_len;
        }
    }

    if !current.is_empty() {
        pages.push(current);
    }

    pages
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use proptest::prelude::*;

    use super::*;
    use crate::reminder::PeriodicSchedule;
    use crate::testing::{LISBON, lisbon_utc};

    fn entry(due: DateTime<Utc>, line: &str) -> ListEntry {
        ListEntry {
            due,
            line: line.to_string(),
        }
    }

    fn categories() -> Vec<ListCategory> {
        day_categories(lisbon_utc("02/02/2025 10:00"), LISBON)
    }

    #[test]
    fn day_categories_split_at_local_midnight() {
        let categories = categories();

        assert_eq!(categories.len(), 3);
        assert_eq!(categories[0].upper_bound, Some(lisbon_utc("03/02/2025 00:00")));
        assert_eq!(categories[1].upper_bound, Some(lisbon_utc("04/02/2025 00:00")));
        assert_eq!(categories[2].upper_bound, None);
    }

    #[test]
    fn banners_precede_first_entry_of_each_non_empty_category() {
        let entries = vec![
            entry(lisbon_utc("02/02/2025 12:00"), "a"),
            entry(lisbon_utc("02/02/2025 13:00"), "b"),
            entry(lisbon_utc("10/02/2025 13:00"), "c"),
        ];

        let page = paginate(&entries, &categories(), 1);

        assert_eq!(page.text, "Today:\na\nb\nLater:\nc");
        assert_eq!((page.index, page.count), (1, 1));
    }

    #[test]
    fn empty_list_has_zero_pages() {
        let page = paginate(&[], &categories(), 3);

        assert_eq!(
            page,
            Page {
                text: String::new(),
                index: 0,
                count: 0
            }
        );
    }

    #[test]
    fn requested_page_is_clamped() {
        let line = "x".repeat(1000);
        let entries: Vec<_> = (0..3)
            .map(|hour| entry(lisbon_utc("10/02/2025 10:00") + TimeDelta::hours(hour), &line))
            .collect();

        let first = paginate(&entries, &categories(), 0);
        let last = paginate(&entries, &categories(), 99);

        assert_eq!((first.index, first.count), (1, 3));
        assert_eq!((last.index, last.count), (3, 3));
        assert_eq!(last.text, line);
    }

    #[test]
    fn banner_moves_to_next_page_with_its_first_line() {
        let filler = "x".repeat(1930);
        let entries = vec![
            entry(lisbon_utc("02/02/2025 12:00"), &filler),
            entry(lisbon_utc("03/02/2025 12:00"), "tomorrow's"),
        ];

        let first = paginate(&entries, &categories(), 1);
        let second = paginate(&entries, &categories(), 2);

        assert_eq!(first.text, format!("Today:\n{filler}"));
        assert_eq!(second.text, "Tomorrow:\ntomorrow's");
    }

    #[test]
    fn oversized_lines_are_truncated() {
        let entries = vec![entry(lisbon_utc("10/02/2025 12:00"), &"é".repeat(3000))];

        let page = paginate(&entries, &categories(), 1);

        assert_eq!(page.text.chars().count(), PAGE_CHAR_LIMIT);
        assert!(page.text.starts_with("Later:\né"));
        assert!(page.text.ends_with(" (...)"));
    }

    #[test]
    fn describes_one_off_and_periodic_reminders() {
        let now = lisbon_utc("02/02/2025 10:00");
        let mut reminder = Reminder {
            id: 1,
            text: "stretch".to_string(),
            timestamp: lisbon_utc("02/02/2025 12:30"),
            author: "ana".to_string(),
            chat_id: 1,
            kind: ReminderKind::OneOff,
        };

        assert_eq!(
            describe(&reminder, now, LISBON).line,
            "➜ 'stretch' at Sunday, February 2nd 2025, 12:30 (in 2 hours and 30 minutes)"
        );

        reminder.kind = ReminderKind::Periodic(PeriodicSchedule {
            name: "back".to_string(),
            raw_time: "1d".to_string(),
            unit_values: [("d".to_string(), 1)].into(),
            remaining_occurrences: Some(3),
        });

        assert_eq!(
            describe(&reminder, now, LISBON).line,
            "➜ back: 'stretch' every 1d (next up in 2 hours and 30 minutes) (3 left)"
        );
    }

    proptest! {
        #[test]
        fn pages_reconstruct_the_listing(
            lines in prop::collection::vec("[a-z ]{1,400}", 0..40),
            hour_offsets in prop::collection::vec(0i64..96, 0..40),
        ) {
            let now = lisbon_utc("02/02/2025 10:00");
            let categories = day_categories(now, LISBON);
            let mut offsets: Vec<i64> = hour_offsets.into_iter().take(lines.len()).collect();
            offsets.resize(lines.len(), 0);
            offsets.sort();
            let entries: Vec<ListEntry> = lines
                .iter()
                .zip(&offsets)
                .map(|(line, hours)| entry(now + TimeDelta::hours(*hours), line))
                .collect();

            let first = paginate(&entries, &categories, 1);
            let pages: Vec<String> = (1..=first.count)
                .map(|index| paginate(&entries, &categories, index).text)
                .collect();

            let expected = blocks(&entries, &categories).join("\n");
            prop_assert_eq!(pages.join("\n"), expected);
            for page in &pages {
                prop_assert!(page.chars().count() <= PAGE_CHAR_LIMIT);
            }
            let lines_on_pages: usize = pages
                .iter()
                .map(|page| page.lines().filter(|line| !line.ends_with(':')).count())
                .sum();
            prop_assert_eq!(lines_on_pages, entries.len());
        }
    }
}
