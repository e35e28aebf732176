use crate::error::{DonorInsightsError, Result};
use chrono::{Datelike, Days, NaiveDate};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Spreadsheet serial day 0. Serial 60 is the phantom 1900-02-29, so
/// counting from Dec 30 keeps every serial after Feb 1900 aligned.
const SPREADSHEET_EPOCH: (i32, u32, u32) = (1899, 12, 30);
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;

/// Full English name for a 1-based month, or "Unknown" outside 1..=12.
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
        .unwrap_or("Unknown")
}

/// Resolves a month name or any prefix of one ("Sep", "sept", "SEPTEMBER")
/// to its 1-based month number. Prefixes shorter than three letters are
/// ambiguous ("ma", "ju") and never match.
pub fn month_from_name(text: &str) -> Option<u32> {
    let lowered = text.trim().trim_end_matches('.').to_lowercase();
    if lowered.len() < 3 {
        return None;
    }

    MONTH_NAMES
        .iter()
        .position(|name| name.to_lowercase().starts_with(&lowered))
        .map(|idx| idx as u32 + 1)
}

pub fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        DonorInsightsError::DateError(format!("No calendar month {}-{:02}", year, month))
    })
}

/// The (year, month) immediately before the given one.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Converts a spreadsheet serial day number (fractional part = time of day)
/// to a calendar date.
pub fn spreadsheet_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SPREADSHEET_SERIAL).contains(&serial) {
        return None;
    }

    let (year, month, day) = SPREADSHEET_EPOCH;
    NaiveDate::from_ymd_opt(year, month, day)?.checked_add_days(Days::new(serial.trunc() as u64))
}
