//! Maps arbitrary spreadsheet headers onto the canonical donation fields.
//!
//! Resolution runs in three passes over the row's columns:
//!
//! 1. exact match of a normalized header against each field's synonym list,
//! 2. substring containment (either direction) against the same list,
//!    accepted only when the cell fits the field (names are not numbers or
//!    dates, amounts look numeric, emails contain `@`),
//! 3. value-aware heuristics for names and amounts.
//!
//! A column claimed by one field is never handed to another.

use crate::normalize::parse_date;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A spreadsheet cell as delivered by the file reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Trimmed text form; numbers are rendered without a trailing ".0".
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(text) => text.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.trim().is_empty())
    }

    /// True for numbers and for text that reads as a money amount.
    pub fn looks_numeric(&self) -> bool {
        match self {
            CellValue::Number(n) => n.is_finite(),
            CellValue::Text(text) => {
                let cleaned: String = text
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | ' ' | '€' | '£'))
                    .collect();
                !cleaned.is_empty() && cleaned.parse::<f64>().is_ok()
            }
        }
    }

    fn is_textual(&self) -> bool {
        matches!(self, CellValue::Text(_)) && !self.is_blank() && !self.looks_numeric()
    }

    /// Text that is neither a number nor a date.
    fn is_name_like(&self) -> bool {
        self.is_textual() && parse_date(&self.as_text()).is_none()
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// One data row keyed by its original header text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, header: &str, value: impl Into<CellValue>) -> Self {
        self.cells.push((header.to_string(), value.into()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    FirstName,
    LastName,
    Amount,
    Date,
    Month,
    Email,
    Phone,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 7] = [
        CanonicalField::FirstName,
        CanonicalField::LastName,
        CanonicalField::Amount,
        CanonicalField::Date,
        CanonicalField::Month,
        CanonicalField::Email,
        CanonicalField::Phone,
    ];

    /// Known header spellings, most specific first, already normalized.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            CanonicalField::FirstName => &[
                "first_name",
                "firstname",
                "first",
                "fname",
                "given_name",
                "donor_first_name",
            ],
            CanonicalField::LastName => &[
                "last_name",
                "lastname",
                "last",
                "lname",
                "surname",
                "family_name",
                "donor_last_name",
            ],
            CanonicalField::Amount => &[
                "amount",
                "donation_amount",
                "gift_amount",
                "total_amount",
                "amount_donated",
                "donation",
                "gift",
                "contribution",
                "total",
            ],
            CanonicalField::Date => &[
                "date",
                "donation_date",
                "gift_date",
                "transaction_date",
                "payment_date",
                "received_date",
                "date_received",
                "created_date",
            ],
            CanonicalField::Month => &["month", "donation_month", "gift_month", "period"],
            CanonicalField::Email => &["email", "email_address", "e_mail", "donor_email"],
            CanonicalField::Phone => &[
                "phone",
                "phone_number",
                "telephone",
                "mobile",
                "cell",
                "contact_number",
            ],
        }
    }
}

/// Canonical view of one row. `name` is an unsplit full-name column, only
/// filled when first or last name could not be resolved on their own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    pub first_name: Option<CellValue>,
    pub last_name: Option<CellValue>,
    pub name: Option<CellValue>,
    pub amount: Option<CellValue>,
    pub date: Option<CellValue>,
    pub month: Option<CellValue>,
    pub email: Option<CellValue>,
    pub phone: Option<CellValue>,
}

impl MappedRow {
    pub fn get(&self, field: CanonicalField) -> Option<&CellValue> {
        match field {
            CanonicalField::FirstName => self.first_name.as_ref(),
            CanonicalField::LastName => self.last_name.as_ref(),
            CanonicalField::Amount => self.amount.as_ref(),
            CanonicalField::Date => self.date.as_ref(),
            CanonicalField::Month => self.month.as_ref(),
            CanonicalField::Email => self.email.as_ref(),
            CanonicalField::Phone => self.phone.as_ref(),
        }
    }

    fn slot(&mut self, field: CanonicalField) -> &mut Option<CellValue> {
        match field {
            CanonicalField::FirstName => &mut self.first_name,
            CanonicalField::LastName => &mut self.last_name,
            CanonicalField::Amount => &mut self.amount,
            CanonicalField::Date => &mut self.date,
            CanonicalField::Month => &mut self.month,
            CanonicalField::Email => &mut self.email,
            CanonicalField::Phone => &mut self.phone,
        }
    }
}

/// Lower-cases, collapses whitespace runs to `_`, and drops everything that
/// is not a word character.
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Headers such as "Name", "Donor" or "Donor Name" that hold a whole name.
fn is_full_name_header(normalized: &str) -> bool {
    if normalized == "donor" || normalized == "contact" {
        return true;
    }
    normalized.contains("name")
        && !["first", "last", "surname", "fund", "batch", "given", "family"]
            .iter()
            .any(|excluded| normalized.contains(excluded))
}

const AMOUNT_HINTS: [&str; 7] = ["amount", "donation", "gift", "total", "amt", "paid", "usd"];

#[derive(Debug, Clone, Default)]
pub struct FieldMapper;

impl FieldMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map_row(&self, row: &RawRow) -> MappedRow {
        let columns: Vec<(String, &CellValue)> = row
            .cells
            .iter()
            .map(|(header, value)| (normalize_header(header), value))
            .filter(|(header, _)| !header.is_empty())
            .collect();

        let mut mapped = MappedRow::default();
        let mut claimed: HashSet<usize> = HashSet::new();

        for field in CanonicalField::ALL {
            if let Some(idx) = find_exact(field, &columns, &claimed) {
                claimed.insert(idx);
                *mapped.slot(field) = Some(columns[idx].1.clone());
            }
        }

        for field in CanonicalField::ALL {
            if mapped.get(field).is_some() {
                continue;
            }
            if let Some(idx) = find_contained(field, &columns, &claimed) {
                debug!(
                    "Mapped header '{}' to {:?} by substring match",
                    columns[idx].0, field
                );
                claimed.insert(idx);
                *mapped.slot(field) = Some(columns[idx].1.clone());
            }
        }

        self.apply_name_heuristics(&columns, &mut claimed, &mut mapped);
        self.apply_amount_heuristic(&columns, &mut claimed, &mut mapped);

        mapped
    }

    fn apply_name_heuristics(
        &self,
        columns: &[(String, &CellValue)],
        claimed: &mut HashSet<usize>,
        mapped: &mut MappedRow,
    ) {
        if mapped.first_name.is_none() {
            if let Some(idx) = find_textual(columns, claimed, |h| h.contains("first")) {
                claimed.insert(idx);
                mapped.first_name = Some(columns[idx].1.clone());
            }
        }

        if mapped.last_name.is_none() {
            if let Some(idx) = find_textual(columns, claimed, |h| {
                h.contains("last") || h.contains("surname")
            }) {
                claimed.insert(idx);
                mapped.last_name = Some(columns[idx].1.clone());
            }
        }

        if mapped.first_name.is_none() || mapped.last_name.is_none() {
            if let Some(idx) = find_textual(columns, claimed, is_full_name_header) {
                debug!("Using '{}' as a combined name column", columns[idx].0);
                claimed.insert(idx);
                mapped.name = Some(columns[idx].1.clone());
            }
        }
    }

    fn apply_amount_heuristic(
        &self,
        columns: &[(String, &CellValue)],
        claimed: &mut HashSet<usize>,
        mapped: &mut MappedRow,
    ) {
        if mapped.amount.is_some() {
            return;
        }

        let found = columns.iter().enumerate().find(|(idx, (header, value))| {
            !claimed.contains(idx)
                && AMOUNT_HINTS.iter().any(|hint| header.contains(hint))
                && value.looks_numeric()
        });

        if let Some((idx, (_, value))) = found {
            claimed.insert(idx);
            mapped.amount = Some((*value).clone());
        }
    }
}

fn find_exact(
    field: CanonicalField,
    columns: &[(String, &CellValue)],
    claimed: &HashSet<usize>,
) -> Option<usize> {
    field.synonyms().iter().find_map(|pattern| {
        columns
            .iter()
            .enumerate()
            .find(|(idx, (header, _))| !claimed.contains(idx) && header == pattern)
            .map(|(idx, _)| idx)
    })
}

fn find_contained(
    field: CanonicalField,
    columns: &[(String, &CellValue)],
    claimed: &HashSet<usize>,
) -> Option<usize> {
    field.synonyms().iter().find_map(|pattern| {
        columns
            .iter()
            .enumerate()
            .find(|(idx, (header, value))| {
                if claimed.contains(idx) {
                    return false;
                }
                // "name" sits inside "first_name" and "donor" inside
                // "donor_email"; whole-name columns belong to the combined
                // name heuristic.
                if is_full_name_header(header) {
                    return false;
                }
                (header.contains(pattern) || pattern.contains(header.as_str()))
                    && value_fits(field, value)
            })
            .map(|(idx, _)| idx)
    })
}

/// Whether a loosely matched column holds the kind of value `field` expects.
/// Blank cells fit anything.
fn value_fits(field: CanonicalField, value: &CellValue) -> bool {
    if value.is_blank() {
        return true;
    }
    match field {
        CanonicalField::FirstName | CanonicalField::LastName => value.is_name_like(),
        CanonicalField::Amount => value.looks_numeric(),
        CanonicalField::Email => value.as_text().contains('@'),
        CanonicalField::Date | CanonicalField::Month | CanonicalField::Phone => true,
    }
}

fn find_textual(
    columns: &[(String, &CellValue)],
    claimed: &HashSet<usize>,
    matches_header: impl Fn(&str) -> bool,
) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .find(|(idx, (header, value))| {
            !claimed.contains(idx) && matches_header(header) && value.is_name_like()
        })
        .map(|(idx, _)| idx)
}
