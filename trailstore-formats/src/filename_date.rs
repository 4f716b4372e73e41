//! Recording dates embedded in file names such as `15_Jan_2024_09_30.gpx`.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use regex::Regex;

static STAMP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})_([a-z]{3})_(\d{4})_(\d{1,2})_(\d{1,2})").ok()
});

/// English and Spanish month abbreviations.
const MONTHS: [(&str, u32); 16] = [
    ("jan", 1),
    ("ene", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("abr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("ago", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
    ("dic", 12),
];

fn month_number(abbreviation: &str) -> Option<u32> {
    let lower = abbreviation.to_ascii_lowercase();
    MONTHS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, number)| *number)
}

/// Parse a `DD_Mon_YYYY_HH_MM` stamp anywhere in `file_name`.
///
/// Stamps naming an impossible date or time yield `None`.
#[must_use]
pub fn date_from_file_name(file_name: &str) -> Option<DateTime<Utc>> {
    let captures = STAMP.as_ref()?.captures(file_name)?;
    let number = |index: usize| captures.get(index)?.as_str().parse::<u32>().ok();
    let month = month_number(captures.get(2)?.as_str())?;
    let year = captures.get(3)?.as_str().parse::<i32>().ok()?;
    let parsed = NaiveDate::from_ymd_opt(year, month, number(1)?)
        .and_then(|date| date.and_hms_opt(number(4)?, number(5)?, 0))
        .map(|naive| naive.and_utc());
    if parsed.is_none() {
        debug!("ignoring impossible date stamp in {file_name}");
    }
    parsed
}
