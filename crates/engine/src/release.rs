//! Release filter.
//!
//! The content source renders release dates as display text, not timestamps:
//! "Opened December 25, 2024", "Premieres Mar 3", "Latest Episode: Jan 5".
//! The filter parses that text, keeps items whose date is today or earlier,
//! and drops anything the ledger has already announced. Text that fails to
//! parse excludes the item instead of guessing; the next cycle gets another
//! look at it.

use chrono::{Datelike, NaiveDate};

use marquee_common::types::MediaItem;

/// Labels the source prefixes onto its date text, matched case-insensitively
/// at the start of the string. "premieres" sorts before "premiere" so the
/// longer label wins.
const DATE_LABELS: &[&str] = &[
    "latest episode:",
    "re-released",
    "premieres",
    "premiere",
    "streaming",
    "opened",
];

/// Formats tried against label-stripped text that carries a year.
/// `%B` also accepts abbreviated month names when parsing.
const DATED_FORMATS: &[&str] = &[
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%Y-%m-%d",
    "%m/%d/%Y",
];

/// Formats tried after appending ", {year}" to year-less text.
const YEARLESS_FORMATS: &[&str] = &["%B %d, %Y", "%d %B, %Y", "%m/%d, %Y"];

/// Strip one leading label, returning the remainder without label, colon,
/// and surrounding whitespace.
fn strip_label(text: &str) -> Option<&str> {
    for label in DATE_LABELS {
        if text.is_char_boundary(label.len()) && text[..label.len()].eq_ignore_ascii_case(label) {
            return Some(text[label.len()..].trim_start_matches([' ', ':']));
        }
    }
    None
}

fn strip_labels(text: &str) -> &str {
    let mut rest = text.trim();
    while let Some(stripped) = strip_label(rest) {
        rest = stripped;
    }
    rest
}

/// True if the text contains a run of four or more digits.
fn has_year(text: &str) -> bool {
    let mut run = 0;
    for b in text.bytes() {
        if b.is_ascii_digit() {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Parse the source's release date text into a calendar date.
///
/// Text without a four-digit year is assumed to mean the current year; that
/// is what the source itself means by "Premieres Mar 3". Around New Year
/// this mislabels a late-December text fetched in January (and vice versa),
/// a wrinkle inherited from the listing format itself.
pub fn parse_release_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = strip_labels(text);
    if cleaned.is_empty() {
        return None;
    }

    if has_year(cleaned) {
        DATED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
    } else {
        let candidate = format!("{}, {}", cleaned, today.year());
        YEARLESS_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&candidate, fmt).ok())
    }
}

/// Keep the items that are released and not yet announced, in listing order.
/// Same-day releases count: the cutoff compares calendar dates, so "today"
/// stays released until midnight.
///
/// `already_notified` is the ledger's verdict for an item URL, pre-fetched by
/// the caller so the filter itself stays synchronous. The parsed year is
/// written back onto each surviving item for later disambiguation.
pub fn filter_new<F>(items: Vec<MediaItem>, already_notified: F, today: NaiveDate) -> Vec<MediaItem>
where
    F: Fn(&str) -> bool,
{
    items
        .into_iter()
        .filter(|item| !already_notified(&item.url))
        .filter_map(|mut item| {
            let date = parse_release_date(&item.release_text, today)?;
            if date > today {
                return None;
            }
            item.release_year = Some(date.year());
            Some(item)
        })
        .collect()
}
