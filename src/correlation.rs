use crate::schema::{EconomicIndicator, MonthlyTrend};
use crate::utils::month_key;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CorrelationStrength {
    #[serde(rename = "Very Strong")]
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    #[serde(rename = "Very Weak")]
    VeryWeak,
}

impl CorrelationStrength {
    pub fn from_coefficient(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude >= 0.8 {
            Self::VeryStrong
        } else if magnitude >= 0.6 {
            Self::Strong
        } else if magnitude >= 0.4 {
            Self::Moderate
        } else if magnitude >= 0.2 {
            Self::Weak
        } else {
            Self::VeryWeak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Significance {
    #[serde(rename = "Highly Significant")]
    HighlySignificant,
    Significant,
    #[serde(rename = "Not Significant")]
    NotSignificant,
}

impl Significance {
    pub fn from_p_value(p: f64) -> Self {
        if p < 0.01 {
            Self::HighlySignificant
        } else if p < 0.05 {
            Self::Significant
        } else {
            Self::NotSignificant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlignedPoint {
    pub year: i32,
    pub month: u32,
    pub donations: f64,
    pub indicator: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub indicator_name: String,
    pub coefficient: f64,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
    #[schemars(
        description = "Two-tailed p-value from a normal approximation of the t statistic; indicative only"
    )]
    pub approximate_p_value: f64,
    pub significance: Significance,
    pub sample_size: usize,
    pub points: Vec<AlignedPoint>,
}

/// Pearson's r by the sum-of-products formula, clamped to [-1, 1] and
/// snapped to exactly ±1 for collinear series. Zero when either series is
/// constant or the lengths differ.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.is_empty() {
        return 0.0;
    }

    let n = xs.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx, mut sum_yy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
        sum_yy += y * y;
    }

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_xx - sum_x * sum_x) * (n * sum_yy - sum_y * sum_y)).sqrt();

    if !(denominator > 0.0 && denominator.is_finite()) {
        return 0.0;
    }

    let r = numerator / denominator;
    // collinear inputs can land a few ulps short of ±1
    if 1.0 - r.abs() < 1e-12 {
        r.signum()
    } else {
        r.clamp(-1.0, 1.0)
    }
}

/// Approximate two-tailed p-value for r over n pairs: t = r·√((n−2)/(1−r²))
/// read against a standard normal. Overstates significance for small n; it
/// is a ranking aid, not a statistical test.
pub fn approximate_p_value(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let r_squared = r * r;
    if r_squared >= 1.0 {
        return 0.0;
    }

    let t = r.abs() * ((n as f64 - 2.0) / (1.0 - r_squared)).sqrt();
    (2.0 * (1.0 - standard_normal_cdf(t))).clamp(0.0, 1.0)
}

// Abramowitz & Stegun 26.2.17, |error| < 7.5e-8.
fn standard_normal_cdf(x: f64) -> f64 {
    let k = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let poly = k
        * (0.319_381_530
            + k * (-0.356_563_782 + k * (1.781_477_937 + k * (-1.821_255_978 + k * 1.330_274_429))));
    let tail = (-x * x / 2.0).exp() / (2.0 * std::f64::consts::PI).sqrt() * poly;
    if x >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Pairs monthly donation totals with the indicator values of the same
/// (year, month). Indicator points sharing a month are averaged; months
/// present on only one side are dropped.
pub fn align(trends: &[MonthlyTrend], indicator: &EconomicIndicator) -> Vec<AlignedPoint> {
    let mut by_month: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for point in &indicator.data {
        let entry = by_month.entry(month_key(point.date)).or_insert((0.0, 0));
        entry.0 += point.value;
        entry.1 += 1;
    }

    let donations: HashMap<(i32, u32), f64> = trends
        .iter()
        .map(|t| ((t.year, t.month_index), t.amount))
        .collect();

    by_month
        .into_iter()
        .filter_map(|((year, month), (sum, count))| {
            donations.get(&(year, month)).map(|&amount| AlignedPoint {
                year,
                month,
                donations: amount,
                indicator: sum / count as f64,
            })
        })
        .collect()
}

/// Correlates donation trends with one indicator. `None` when fewer than
/// `min_points` months line up.
pub fn correlate(
    trends: &[MonthlyTrend],
    indicator: &EconomicIndicator,
    min_points: usize,
) -> Option<CorrelationResult> {
    let points = align(trends, indicator);
    if points.len() < min_points.max(3) {
        debug!(
            "No correlation available for '{}': {} aligned months",
            indicator.name,
            points.len()
        );
        return None;
    }

    let xs: Vec<f64> = points.iter().map(|p| p.donations).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.indicator).collect();
    let r = pearson(&xs, &ys);
    let p = approximate_p_value(r, points.len());

    let direction = if r > 0.0 {
        CorrelationDirection::Positive
    } else if r < 0.0 {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    };

    Some(CorrelationResult {
        indicator_name: indicator.name.clone(),
        coefficient: r,
        strength: CorrelationStrength::from_coefficient(r),
        direction,
        approximate_p_value: p,
        significance: Significance::from_p_value(p),
        sample_size: points.len(),
        points,
    })
}

/// Correlates every indicator and orders the available results by |r|,
/// strongest first.
pub fn rank_indicators(
    trends: &[MonthlyTrend],
    indicators: &[EconomicIndicator],
    min_points: usize,
) -> Vec<CorrelationResult> {
    let mut results: Vec<CorrelationResult> = indicators
        .iter()
        .filter_map(|indicator| correlate(trends, indicator, min_points))
        .collect();

    results.sort_by(|a, b| {
        b.coefficient
            .abs()
            .partial_cmp(&a.coefficient.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EconomicDataPoint;
    use chrono::NaiveDate;

    fn trend(year: i32, month: u32, amount: f64) -> MonthlyTrend {
        MonthlyTrend {
            year,
            month: crate::utils::month_name(month).to_string(),
            month_index: month,
            amount,
            donor_count: 1,
            donation_count: 1,
            average_donation: amount,
        }
    }

    fn indicator(name: &str, points: &[(i32, u32, u32, f64)]) -> EconomicIndicator {
        EconomicIndicator {
            name: name.to_string(),
            data: points
                .iter()
                .map(|&(y, m, d, value)| EconomicDataPoint {
                    date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    value,
                })
                .collect(),
            current_value: 0.0,
            trend: "stable".to_string(),
            correlation: 0.0,
        }
    }

    #[test]
    fn test_pearson_perfect_and_negated() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert_eq!(pearson(&xs, &ys), 1.0);

        let negated: Vec<f64> = ys.iter().map(|y| -y).collect();
        assert_eq!(pearson(&xs, &negated), -1.0);
    }

    #[test]
    fn test_pearson_sign_flips_with_negation() {
        let xs = [3.0, 1.0, 4.0, 1.0, 5.0];
        let ys = [9.0, 2.0, 6.0, 5.0, 3.0];
        let r = pearson(&xs, &ys);
        let negated: Vec<f64> = ys.iter().map(|y| -y).collect();
        assert!((pearson(&xs, &negated) + r).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_exact_for_fractional_collinear_series() {
        // y = 0.01x + 0.1
        let xs = [100.0, 250.0, 310.0, 475.0];
        let ys = [1.1, 2.6, 3.2, 4.85];
        assert_eq!(pearson(&xs, &ys), 1.0);

        let negated: Vec<f64> = ys.iter().map(|y| -y).collect();
        assert_eq!(pearson(&xs, &negated), -1.0);

        let xs = [0.1, 0.2, 0.3, 0.4, 0.5];
        let ys = [0.7, 1.3, 1.9, 2.5, 3.1];
        assert_eq!(pearson(&xs, &ys), 1.0);
    }

    #[test]
    fn test_pearson_orthogonal_series_is_zero() {
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[1.0, 0.0, 1.0]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0, 3.0, 4.0], &[1.0, -1.0, -1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_pearson_constant_series_is_zero() {
        assert_eq!(pearson(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(pearson(&[], &[]), 0.0);
    }

    #[test]
    fn test_strength_bands() {
        assert_eq!(CorrelationStrength::from_coefficient(0.85), CorrelationStrength::VeryStrong);
        assert_eq!(CorrelationStrength::from_coefficient(-0.8), CorrelationStrength::VeryStrong);
        assert_eq!(CorrelationStrength::from_coefficient(0.6), CorrelationStrength::Strong);
        assert_eq!(CorrelationStrength::from_coefficient(-0.45), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::from_coefficient(0.2), CorrelationStrength::Weak);
        assert_eq!(CorrelationStrength::from_coefficient(0.05), CorrelationStrength::VeryWeak);
    }

    #[test]
    fn test_significance_buckets() {
        assert_eq!(Significance::from_p_value(0.001), Significance::HighlySignificant);
        assert_eq!(Significance::from_p_value(0.03), Significance::Significant);
        assert_eq!(Significance::from_p_value(0.2), Significance::NotSignificant);
    }

    #[test]
    fn test_p_value_shrinks_with_stronger_correlation() {
        let weak = approximate_p_value(0.2, 12);
        let strong = approximate_p_value(0.9, 12);
        assert!(strong < weak);
        assert_eq!(approximate_p_value(1.0, 12), 0.0);
        assert!((approximate_p_value(0.0, 12) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_alignment_drops_unmatched_months() {
        let trends = vec![
            trend(2024, 1, 100.0),
            trend(2024, 2, 200.0),
            trend(2024, 3, 300.0),
            trend(2024, 5, 500.0),
        ];
        let cpi = indicator(
            "CPI",
            &[
                (2023, 12, 1, 1.0),
                (2024, 1, 1, 2.0),
                (2024, 2, 1, 4.0),
                (2024, 2, 15, 6.0),
                (2024, 3, 1, 6.0),
                (2024, 4, 1, 8.0),
            ],
        );

        let points = align(&trends, &cpi);
        let months: Vec<u32> = points.iter().map(|p| p.month).collect();
        assert_eq!(months, vec![1, 2, 3]);
        assert!((points[1].indicator - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlate_requires_three_points() {
        let trends = vec![trend(2024, 1, 100.0), trend(2024, 2, 200.0)];
        let gdp = indicator("GDP", &[(2024, 1, 1, 1.0), (2024, 2, 1, 2.0)]);
        assert!(correlate(&trends, &gdp, 3).is_none());
    }

    #[test]
    fn test_correlate_inverse_series() {
        let trends = vec![
            trend(2024, 1, 100.0),
            trend(2024, 2, 200.0),
            trend(2024, 3, 300.0),
            trend(2024, 4, 400.0),
        ];
        let unemployment = indicator(
            "Unemployment",
            &[
                (2024, 1, 1, 8.0),
                (2024, 2, 1, 6.0),
                (2024, 3, 1, 4.0),
                (2024, 4, 1, 2.0),
            ],
        );

        let result = correlate(&trends, &unemployment, 3).unwrap();
        assert_eq!(result.coefficient, -1.0);
        assert_eq!(result.direction, CorrelationDirection::Negative);
        assert_eq!(result.strength, CorrelationStrength::VeryStrong);
        assert_eq!(result.significance, Significance::HighlySignificant);
        assert_eq!(result.sample_size, 4);
    }

    #[test]
    fn test_rank_indicators_orders_by_magnitude() {
        let trends = vec![
            trend(2024, 1, 100.0),
            trend(2024, 2, 180.0),
            trend(2024, 3, 150.0),
            trend(2024, 4, 260.0),
        ];
        let indicators = vec![
            indicator("Flat", &[(2024, 1, 1, 1.0), (2024, 2, 1, 1.0), (2024, 3, 1, 1.0)]),
            indicator("Sparse", &[(2024, 1, 1, 1.0)]),
            indicator(
                "Tracking",
                &[(2024, 1, 1, 10.0), (2024, 2, 1, 18.0), (2024, 3, 1, 15.0), (2024, 4, 1, 26.0)],
            ),
        ];

        let ranked = rank_indicators(&trends, &indicators, 3);
        let names: Vec<&str> = ranked.iter().map(|r| r.indicator_name.as_str()).collect();
        assert_eq!(names, vec!["Tracking", "Flat"]);
        assert_eq!(ranked[1].coefficient, 0.0);
        assert_eq!(ranked[1].direction, CorrelationDirection::None);
    }
}
