//! Record normalization: titles, state codes, free-form dates.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::model::{NormalizedRecord, SourceRecord};
use crate::states::StateTable;

/// Date layouts tried in order. Two-digit years come before four-digit ones
/// so that `6/21/25` is not read as the year 25.
///
/// Parsed dates outside `PLAUSIBLE_YEARS` are discarded.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%A %B %d, %Y",
    "%a %b %d, %Y",
    "%a %b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

const RANGE_SEPARATORS: &[&str] = &[" - ", " – ", "–", " to "];

/// Lower-case and trim. Punctuation and inner whitespace are kept as-is.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Parse a free-form date. Returns `None` rather than failing.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_single(s).or_else(|| parse_range_start(s))
}

fn parse_single(s: &str) -> Option<NaiveDate> {
    parse_any(s).filter(|d| PLAUSIBLE_YEARS.contains(&d.year()))
}

fn parse_any(s: &str) -> Option<NaiveDate> {
    for fmt in DATE_FORMATS {
        match NaiveDate::parse_from_str(s, fmt) {
            Ok(d) if PLAUSIBLE_YEARS.contains(&d.year()) => return Some(d),
            _ => {}
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // ISO prefix with a trailing time or zone we do not model ("2025-06-21T08:00:00Z")
    if s.len() > 10 {
        if let Some(prefix) = s.get(..10) {
            if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
                return Some(d);
            }
        }
    }
    None
}

/// "June 21 - 22, 2025" → 2025-06-21; "6/21/2025 - 6/22/2025" → 2025-06-21.
fn parse_range_start(s: &str) -> Option<NaiveDate> {
    let (first, rest) = RANGE_SEPARATORS
        .iter()
        .find_map(|sep| s.split_once(sep))?;
    let first = first.trim();
    if let Some(d) = parse_single(first) {
        return Some(d);
    }
    let year = trailing_year(rest)?;
    parse_single(&format!("{first}, {year}")).or_else(|| parse_single(&format!("{first} {year}")))
}

fn trailing_year(s: &str) -> Option<i32> {
    let s = s.trim_end();
    let tail = s.get(s.len().checked_sub(4)?..)?;
    if tail.chars().all(|c| c.is_ascii_digit()) {
        tail.parse().ok()
    } else {
        None
    }
}

/// Derive the normalized view of a record. Pure: normalizing the same record
/// twice yields the same value.
pub fn normalize_record(record: &SourceRecord, states: &StateTable) -> NormalizedRecord {
    let date = parse_date(&record.date);
    NormalizedRecord {
        record: record.clone(),
        title_norm: normalize_title(&record.title),
        state_code: states.lookup(&record.state),
        date,
        month: date.map(|d| d.month()),
        year: date.map(|d| d.year()),
    }
}
