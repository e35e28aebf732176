use crate::config::{AnalyticsConfig, DateFallback};
use crate::mapping::CellValue;
use crate::utils::{month_from_name, month_start, spreadsheet_serial_to_date};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use log::warn;

/// Explicit patterns, tried in order. chrono's `%m`/`%d` accept one or two
/// digits, so `M/d/yyyy` is covered by `MM/dd/yyyy` and `%b` reads both
/// abbreviated and full month names.
const DATE_PATTERNS: [&str; 8] = [
    "%m/%d/%Y", // MM/dd/yyyy, M/d/yyyy
    "%m-%d-%Y", // MM-dd-yyyy, M-d-yyyy
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

const LOOSE_DATE_PATTERNS: [&str; 5] = [
    "%B %d %Y",
    "%d %B, %Y",
    "%b %d %Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
];

const LOOSE_DATETIME_PATTERNS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Keeps digits, `.` and `-`; anything unparseable is zero.
pub fn parse_currency(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub fn parse_amount(cell: &CellValue) -> f64 {
    match cell {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Number(_) => 0.0,
        CellValue::Text(text) => parse_currency(text),
    }
}

/// Parses a date string against the explicit patterns, then the looser
/// generic forms. Returns `None` when nothing reads as a calendar date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    DATE_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDate::parse_from_str(trimmed, pattern).ok())
        .or_else(|| parse_generic_date(trimmed))
}

fn parse_generic_date(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.date_naive());
    }

    LOOSE_DATETIME_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            LOOSE_DATE_PATTERNS
                .iter()
                .find_map(|pattern| NaiveDate::parse_from_str(text, pattern).ok())
        })
}

pub fn parse_date_cell(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Number(serial) => spreadsheet_serial_to_date(*serial),
        CellValue::Text(text) => parse_date(text),
    }
}

/// Reads a month cell ("Sep", "September 2024", "2024-09") as the first day
/// of that month. Without a four-digit year the month falls in
/// `default_year`.
pub fn parse_month(text: &str, default_year: i32) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d") {
        return Some(date);
    }

    let tokens: Vec<&str> = trimmed
        .split(|c: char| c.is_whitespace() || c == ',' || c == '-' || c == '/')
        .filter(|t| !t.is_empty())
        .collect();

    let month = tokens.iter().find_map(|token| month_from_name(token))?;
    let year = tokens
        .iter()
        .find(|token| token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()))
        .and_then(|token| token.parse::<i32>().ok())
        .unwrap_or(default_year);

    month_start(year, month).ok()
}

/// How a row's date was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDate {
    Parsed(NaiveDate),
    FromMonth(NaiveDate),
    Defaulted(NaiveDate),
}

impl ResolvedDate {
    pub fn date(self) -> NaiveDate {
        match self {
            ResolvedDate::Parsed(d) | ResolvedDate::FromMonth(d) | ResolvedDate::Defaulted(d) => d,
        }
    }
}

/// Resolves the date of one row from its date and month cells, applying the
/// configured fallback when neither is usable.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    fallback: DateFallback,
    today: NaiveDate,
}

impl DateNormalizer {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            fallback: config.date_fallback,
            today: config.today(),
        }
    }

    pub fn resolve(
        &self,
        date: Option<&CellValue>,
        month: Option<&CellValue>,
    ) -> Option<ResolvedDate> {
        if let Some(parsed) = date.and_then(parse_date_cell) {
            return Some(ResolvedDate::Parsed(parsed));
        }

        if let Some(from_month) = month.and_then(|cell| self.month_cell(cell)) {
            return Some(ResolvedDate::FromMonth(from_month));
        }

        match self.fallback {
            DateFallback::Reject => None,
            DateFallback::Today => {
                warn!(
                    "No usable date or month on row; defaulting to {}",
                    self.today
                );
                Some(ResolvedDate::Defaulted(self.today))
            }
        }
    }

    fn month_cell(&self, cell: &CellValue) -> Option<NaiveDate> {
        match cell {
            CellValue::Number(n) if (1.0..=12.0).contains(n) && n.fract() == 0.0 => {
                month_start(self.today.year(), *n as u32).ok()
            }
            CellValue::Number(_) => None,
            CellValue::Text(text) => match text.trim().parse::<u32>() {
                Ok(month) if (1..=12).contains(&month) => {
                    month_start(self.today.year(), month).ok()
                }
                Ok(_) => None,
                Err(_) => parse_month(text, self.today.year()),
            },
        }
    }
}
