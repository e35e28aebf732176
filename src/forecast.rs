use crate::config::AnalyticsConfig;
use crate::schema::{ForecastData, MonthlyTrend, TrendDirection};
use log::debug;

/// Ordinary least-squares line over equally spaced points `x = 0, 1, ..`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, clamped to [0, 1]; 0 when the series is
    /// constant.
    pub r_squared: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits `values` against their index. `None` for fewer than two points.
pub fn fit_linear(values: &[f64]) -> Option<LinearFit> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let mean_y = sum_y / n;
    let (mut ss_tot, mut ss_res) = (0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let fitted = intercept + slope * i as f64;
        ss_tot += (y - mean_y).powi(2);
        ss_res += (y - fitted).powi(2);
    }

    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Projects the next month and the following quarter from the trailing
/// monthly totals.
pub fn forecast(trends: &[MonthlyTrend], config: &AnalyticsConfig) -> ForecastData {
    if trends.len() < config.min_forecast_history {
        debug!(
            "Only {} months of history; forecast needs {}",
            trends.len(),
            config.min_forecast_history
        );
        return ForecastData::flat();
    }

    let window = config.forecast_window.max(config.min_forecast_history);
    let start = trends.len().saturating_sub(window);
    let values: Vec<f64> = trends[start..].iter().map(|t| t.amount).collect();

    let Some(fit) = fit_linear(&values) else {
        return ForecastData::flat();
    };

    let n = values.len() as f64;
    let next_month = fit.predict(n).max(0.0);
    let next_quarter = (1..=3)
        .map(|offset| fit.predict(n + offset as f64).max(0.0))
        .sum::<f64>()
        / 3.0;

    let trend = if fit.slope > config.trend_slope_threshold {
        TrendDirection::Up
    } else if fit.slope < -config.trend_slope_threshold {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    ForecastData {
        next_month,
        next_quarter,
        confidence: fit.r_squared,
        trend,
        slope: fit.slope,
        months_used: values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trends(amounts: &[f64]) -> Vec<MonthlyTrend> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &amount)| MonthlyTrend {
                year: 2024,
                month: crate::utils::month_name(i as u32 + 1).to_string(),
                month_index: i as u32 + 1,
                amount,
                donor_count: 1,
                donation_count: 1,
                average_donation: amount,
            })
            .collect()
    }

    #[test]
    fn test_short_history_is_flat() {
        let config = AnalyticsConfig::default();
        for amounts in [&[][..], &[100.0][..], &[100.0, 200.0][..]] {
            let result = forecast(&trends(amounts), &config);
            assert_eq!(result.next_month, 0.0);
            assert_eq!(result.confidence, 0.0);
            assert_eq!(result.trend, TrendDirection::Stable);
        }
    }

    #[test]
    fn test_perfect_line() {
        let result = forecast(&trends(&[100.0, 200.0, 300.0]), &AnalyticsConfig::default());
        assert!((result.next_month - 400.0).abs() < 1e-9);
        // months 4, 5, 6 past the window: 500, 600, 700
        assert!((result.next_quarter - 600.0).abs() < 1e-9);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.trend, TrendDirection::Up);
        assert!((result.slope - 100.0).abs() < 1e-9);
        assert_eq!(result.months_used, 3);
    }

    #[test]
    fn test_uses_only_last_six_months() {
        let result = forecast(
            &trends(&[9000.0, 9000.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0]),
            &AnalyticsConfig::default(),
        );
        assert_eq!(result.months_used, 6);
        assert!((result.next_month - 70.0).abs() < 1e-9);
        assert!((result.slope - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_declining_series_clamped_at_zero() {
        let result = forecast(&trends(&[300.0, 200.0, 100.0]), &AnalyticsConfig::default());
        assert_eq!(result.next_month, 0.0);
        assert_eq!(result.next_quarter, 0.0);
        assert_eq!(result.trend, TrendDirection::Down);
    }

    #[test]
    fn test_constant_series_has_zero_confidence() {
        let result = forecast(&trends(&[50.0, 50.0, 50.0, 50.0]), &AnalyticsConfig::default());
        assert!((result.next_month - 50.0).abs() < 1e-9);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_noisy_series_confidence_in_unit_range() {
        let result = forecast(
            &trends(&[120.0, 80.0, 150.0, 90.0, 160.0]),
            &AnalyticsConfig::default(),
        );
        assert!(result.confidence > 0.0 && result.confidence < 1.0);
    }

    #[test]
    fn test_fit_linear_needs_two_points() {
        assert!(fit_linear(&[1.0]).is_none());
        let fit = fit_linear(&[1.0, 3.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
    }
}
