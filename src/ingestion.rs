use crate::config::AnalyticsConfig;
use crate::error::{DonorInsightsError, Result};
use crate::mapping::{CellValue, FieldMapper, MappedRow, RawRow};
use crate::normalize::{parse_amount, DateNormalizer, ResolvedDate};
use crate::schema::Donation;
use crate::utils::month_name;
use chrono::Datelike;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use uuid::Uuid;

/// Why a row was dropped. Rejections are row-level defects, never import
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    MissingName,
    NonPositiveAmount,
    MissingDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionCounts {
    pub missing_name: usize,
    pub non_positive_amount: usize,
    pub missing_date: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,
    pub records_processed: usize,
    pub rows_rejected: usize,
    pub rejections: RejectionCounts,
    /// Accepted rows dated by the "today" fallback.
    pub dates_defaulted: usize,
}

impl ImportSummary {
    fn record_rejection(&mut self, reason: RowRejection) {
        self.rows_rejected += 1;
        match reason {
            RowRejection::MissingName => self.rejections.missing_name += 1,
            RowRejection::NonPositiveAmount => self.rejections.non_positive_amount += 1,
            RowRejection::MissingDate => self.rejections.missing_date += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub donations: Vec<Donation>,
    pub summary: ImportSummary,
}

/// Turns one mapped row into a donation, or the reason it was rejected.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    dates: DateNormalizer,
}

impl RecordBuilder {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            dates: DateNormalizer::new(config),
        }
    }

    pub fn build(&self, row: &MappedRow) -> std::result::Result<Donation, RowRejection> {
        self.build_resolved(row).map(|(donation, _)| donation)
    }

    fn build_resolved(
        &self,
        row: &MappedRow,
    ) -> std::result::Result<(Donation, ResolvedDate), RowRejection> {
        let (first_name, last_name) = resolve_names(row).ok_or(RowRejection::MissingName)?;

        let amount = row.amount.as_ref().map(parse_amount).unwrap_or(0.0);
        if amount <= 0.0 {
            return Err(RowRejection::NonPositiveAmount);
        }

        let resolved = self
            .dates
            .resolve(row.date.as_ref(), row.month.as_ref())
            .ok_or(RowRejection::MissingDate)?;
        let date = resolved.date();

        let donation = Donation {
            id: Uuid::new_v4().to_string(),
            first_name,
            last_name,
            amount,
            date,
            month: month_name(date.month()).to_string(),
            year: date.year(),
            email: optional_text(row.email.as_ref()),
            phone: optional_text(row.phone.as_ref()),
            donor_id: None,
        };

        Ok((donation, resolved))
    }
}

fn optional_text(cell: Option<&CellValue>) -> Option<String> {
    cell.map(CellValue::as_text).filter(|text| !text.is_empty())
}

/// First/last name from their own columns, with gaps filled by splitting
/// the combined name column: first token is the first name, the rest the
/// last name.
fn resolve_names(row: &MappedRow) -> Option<(String, String)> {
    let mut first = optional_text(row.first_name.as_ref()).unwrap_or_default();
    let mut last = optional_text(row.last_name.as_ref()).unwrap_or_default();

    if let Some(full) = optional_text(row.name.as_ref()) {
        let mut tokens = full.split_whitespace();
        let split_first = tokens.next().unwrap_or_default().to_string();
        let split_last = tokens.collect::<Vec<_>>().join(" ");

        if first.is_empty() {
            first = split_first;
        }
        if last.is_empty() {
            last = split_last;
        }
    }

    if first.is_empty() && last.is_empty() {
        None
    } else {
        Some((first, last))
    }
}

pub struct DonationImporter {
    mapper: FieldMapper,
    builder: RecordBuilder,
}

impl DonationImporter {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            mapper: FieldMapper::new(),
            builder: RecordBuilder::new(config),
        }
    }

    /// Imports a delimited export from disk. The delimiter follows the file
    /// extension; `.txt` files are sniffed from their header line.
    pub fn import_path(&self, path: impl AsRef<Path>) -> Result<ImportBatch> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        let content = match extension.as_str() {
            "csv" | "tsv" | "tab" | "txt" => std::fs::read_to_string(path)?,
            _ => {
                return Err(DonorInsightsError::UnsupportedFormat(
                    path.display().to_string(),
                ))
            }
        };

        let delimiter = match extension.as_str() {
            "csv" => b',',
            "tsv" | "tab" => b'\t',
            _ => sniff_delimiter(&content),
        };

        info!("Importing donations from {}", path.display());
        self.import_reader(content.as_bytes(), delimiter)
    }

    pub fn import_reader<R: Read>(&self, reader: R, delimiter: u8) -> Result<ImportBatch> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                if idx == 0 {
                    header.trim_start_matches('\u{feff}').to_string()
                } else {
                    header.to_string()
                }
            })
            .collect();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(DonorInsightsError::MissingHeader(
                "the first line has no column names".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let cells = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.clone(), CellValue::Text(cell.to_string())))
                .collect();
            rows.push(RawRow { cells });
        }

        if rows.is_empty() {
            return Err(DonorInsightsError::EmptyFile(
                "the export has a header row but no data rows".to_string(),
            ));
        }

        Ok(self.import_rows(&rows))
    }

    /// Imports rows a collaborator has already read from the file.
    pub fn import_rows(&self, rows: &[RawRow]) -> ImportBatch {
        let mut batch = ImportBatch::default();
        batch.summary.total_rows = rows.len();

        for (idx, row) in rows.iter().enumerate() {
            let mapped = self.mapper.map_row(row);
            match self.builder.build_resolved(&mapped) {
                Ok((donation, resolved)) => {
                    if matches!(resolved, ResolvedDate::Defaulted(_)) {
                        batch.summary.dates_defaulted += 1;
                    }
                    batch.donations.push(donation);
                }
                Err(reason) => {
                    debug!("Skipping row {}: {:?}", idx + 1, reason);
                    batch.summary.record_rejection(reason);
                }
            }
        }

        batch.summary.records_processed = batch.donations.len();
        info!(
            "Imported {} of {} rows ({} rejected)",
            batch.summary.records_processed, batch.summary.total_rows, batch.summary.rows_rejected
        );

        batch
    }
}

fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    [b',', b'\t', b';', b'|']
        .into_iter()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .filter(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}
