use crate::error::{DonorInsightsError, Result};
use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a row that carries neither a parseable date nor a month name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub enum DateFallback {
    /// Drop the row as a row-level defect.
    #[default]
    Reject,
    /// Date the row on the reference date ("now"). Silently mis-dates records,
    /// so it has to be switched on explicitly.
    Today,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsConfig {
    #[schemars(description = "Policy for rows without any usable date or month information")]
    pub date_fallback: DateFallback,

    #[schemars(
        description = "Date treated as 'today' for the date fallback and for month-only rows. Defaults to the current UTC date."
    )]
    pub reference_date: Option<NaiveDate>,

    #[schemars(description = "Maximum number of trailing months fed into the linear forecast")]
    pub forecast_window: usize,

    #[schemars(description = "Months of history required before a forecast is attempted")]
    pub min_forecast_history: usize,

    #[schemars(description = "Absolute slope above which the forecast trend is reported as up or down")]
    pub trend_slope_threshold: f64,

    #[schemars(description = "Number of donors reported in the top donor list")]
    pub top_donor_count: usize,

    #[schemars(description = "Aligned months required before a correlation is reported")]
    pub min_correlation_points: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            date_fallback: DateFallback::Reject,
            reference_date: None,
            forecast_window: 6,
            min_forecast_history: 3,
            trend_slope_threshold: 0.1,
            top_donor_count: 10,
            min_correlation_points: 3,
        }
    }
}

impl AnalyticsConfig {
    pub fn with_date_fallback(mut self, fallback: DateFallback) -> Self {
        self.date_fallback = fallback;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// The configured reference date, or today's UTC date.
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_forecast_history < 2 {
            return Err(invalid(
                "minForecastHistory",
                format!(
                    "a line needs at least 2 points, got {}",
                    self.min_forecast_history
                ),
            ));
        }

        if self.forecast_window < self.min_forecast_history {
            return Err(invalid(
                "forecastWindow",
                format!(
                    "window of {} months is smaller than the required history of {}",
                    self.forecast_window, self.min_forecast_history
                ),
            ));
        }

        if !self.trend_slope_threshold.is_finite() || self.trend_slope_threshold < 0.0 {
            return Err(invalid(
                "trendSlopeThreshold",
                format!(
                    "must be a finite non-negative number, got {}",
                    self.trend_slope_threshold
                ),
            ));
        }

        // n - 2 degrees of freedom must stay positive for the t statistic
        if self.min_correlation_points < 3 {
            return Err(invalid(
                "minCorrelationPoints",
                format!("must be at least 3, got {}", self.min_correlation_points),
            ));
        }

        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

fn invalid(field: &str, details: String) -> DonorInsightsError {
    DonorInsightsError::InvalidConfig {
        field: field.to_string(),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.date_fallback, DateFallback::Reject);
        assert_eq!(config.forecast_window, 6);
        assert_eq!(config.min_forecast_history, 3);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = AnalyticsConfig::from_json_str(
            r#"{ "dateFallback": "today", "referenceDate": "2024-10-15", "topDonorCount": 3 }"#,
        )
        .unwrap();

        assert_eq!(config.date_fallback, DateFallback::Today);
        assert_eq!(
            config.today(),
            NaiveDate::from_ymd_opt(2024, 10, 15).unwrap()
        );
        assert_eq!(config.top_donor_count, 3);
        assert_eq!(config.forecast_window, 6);
    }

    #[test]
    fn test_window_smaller_than_history_is_rejected() {
        let err = AnalyticsConfig::from_json_str(r#"{ "forecastWindow": 2 }"#).unwrap_err();
        match err {
            DonorInsightsError::InvalidConfig { field, .. } => assert_eq!(field, "forecastWindow"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_correlation_points_below_three_rejected() {
        let config = AnalyticsConfig {
            min_correlation_points: 2,
            ..AnalyticsConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
