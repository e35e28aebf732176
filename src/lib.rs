//! # Donor Insights
//!
//! A library for turning donor-contribution spreadsheet exports into a
//! canonical donor/donation model and the analytics built on it.
//!
//! ## Pipeline
//!
//! - **Field mapping**: arbitrary column headers are matched to canonical
//!   fields (first/last name, amount, date, month, email, phone)
//! - **Normalization**: currency strings and heterogeneous date formats are
//!   parsed into amounts and calendar dates
//! - **Record building**: incomplete rows are dropped, valid ones become
//!   [`Donation`]s
//! - **Aggregation**: donations are grouped into [`Donor`]s by normalized
//!   name; re-imports merge into the same [`DonorLedger`]
//! - **Analytics**: monthly trends, retention, a linear forecast, and
//!   correlation against external economic indicators
//!
//! ## Example
//!
//! ```rust,ignore
//! use donor_insights::*;
//!
//! let config = AnalyticsConfig::default();
//! let importer = DonationImporter::new(&config);
//!
//! let batch = importer.import_path("donations.csv")?;
//! let mut ledger = DonorLedger::new();
//! ledger.merge(batch.donations);
//!
//! let analysis = ledger.analyze(&config);
//! println!("{} donors gave {:.2}", analysis.total_donors, analysis.total_amount);
//! ```

pub mod aggregator;
pub mod config;
pub mod correlation;
pub mod error;
pub mod forecast;
pub mod ingestion;
pub mod mapping;
pub mod normalize;
pub mod retention;
pub mod schema;
pub mod trends;
pub mod utils;

pub use aggregator::{group_donations, DonorLedger};
pub use config::{AnalyticsConfig, DateFallback};
pub use correlation::{
    correlate, pearson, rank_indicators, CorrelationDirection, CorrelationResult,
    CorrelationStrength, Significance,
};
pub use error::{DonorInsightsError, Result};
pub use forecast::{fit_linear, forecast, LinearFit};
pub use ingestion::*;
pub use mapping::{normalize_header, CanonicalField, CellValue, FieldMapper, MappedRow, RawRow};
pub use normalize::{parse_amount, parse_currency, parse_date, parse_month, DateNormalizer};
pub use retention::compute_retention;
pub use schema::*;
pub use trends::monthly_trends;

use log::info;

pub struct DonationAnalyzer {
    config: AnalyticsConfig,
}

impl DonationAnalyzer {
    pub fn new(config: AnalyticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn analyze(&self, donors: &[Donor]) -> AnalysisResult {
        analyze(donors, &self.config)
    }

    pub fn correlate(
        &self,
        trends: &[MonthlyTrend],
        indicator: &EconomicIndicator,
    ) -> Option<CorrelationResult> {
        correlate(trends, indicator, self.config.min_correlation_points)
    }

    pub fn rank_indicators(
        &self,
        trends: &[MonthlyTrend],
        indicators: &[EconomicIndicator],
    ) -> Vec<CorrelationResult> {
        rank_indicators(trends, indicators, self.config.min_correlation_points)
    }
}

/// Recomputes the full analysis snapshot from the current donor set.
pub fn analyze(donors: &[Donor], config: &AnalyticsConfig) -> AnalysisResult {
    let total_amount: f64 = donors.iter().map(|d| d.total_amount).sum();
    let donation_count: usize = donors.iter().map(|d| d.donation_count).sum();

    let monthly_trends = monthly_trends(donors);
    let donor_retention = compute_retention(donors);
    let forecast = forecast(&monthly_trends, config);

    info!(
        "Analyzed {} donors, {} donations across {} months",
        donors.len(),
        donation_count,
        monthly_trends.len()
    );

    AnalysisResult {
        total_donors: donors.len(),
        total_amount,
        average_donation: if donation_count > 0 {
            total_amount / donation_count as f64
        } else {
            0.0
        },
        donation_count,
        top_donors: top_donors(donors, config.top_donor_count),
        monthly_trends,
        donor_retention,
        forecast,
    }
}

/// The `limit` donors with the highest total giving. Ties keep ledger order.
pub fn top_donors(donors: &[Donor], limit: usize) -> Vec<Donor> {
    let mut ranked: Vec<&Donor> = donors.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_amount
            .partial_cmp(&a.total_amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.into_iter().take(limit).cloned().collect()
}
