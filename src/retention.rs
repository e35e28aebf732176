//! New vs. returning donors between the latest month and the one before it.
//!
//! When either month has no donors the cohort comparison is meaningless,
//! which is common in sparse exports. In that case the counts fall back to
//! frequency classes: regular and frequent donors are "returning", one-time
//! donors are "new", and the rate is returning over all donors. That
//! heuristic ignores timing entirely and is an approximation, not a cohort
//! retention measure; `RetentionData::mode` says which one was used.

use crate::schema::{DonationFrequency, Donor, RetentionData, RetentionMode};
use crate::utils::{month_key, previous_month};
use log::debug;
use std::collections::HashSet;

pub fn compute_retention(donors: &[Donor]) -> RetentionData {
    let latest = donors
        .iter()
        .flat_map(|d| d.donations.iter())
        .map(|donation| month_key(donation.date))
        .max();

    let Some(current) = latest else {
        return frequency_heuristic(donors);
    };
    let previous = previous_month(current.0, current.1);

    let current_set = donors_active_in(donors, current);
    let previous_set = donors_active_in(donors, previous);

    if current_set.is_empty() || previous_set.is_empty() {
        debug!(
            "No donors in {}-{:02}; using frequency heuristic for retention",
            previous.0, previous.1
        );
        return frequency_heuristic(donors);
    }

    let returning = current_set.intersection(&previous_set).count();
    let retention_rate = returning as f64 / previous_set.len() as f64;

    RetentionData {
        new_donors: current_set.len() - returning,
        returning_donors: returning,
        retention_rate,
        churn_rate: 1.0 - retention_rate,
        mode: RetentionMode::Cohort {
            current_year: current.0,
            current_month: current.1,
            previous_year: previous.0,
            previous_month: previous.1,
        },
    }
}

fn donors_active_in(donors: &[Donor], month: (i32, u32)) -> HashSet<&str> {
    donors
        .iter()
        .filter(|donor| donor.donations.iter().any(|d| month_key(d.date) == month))
        .map(|donor| donor.id.as_str())
        .collect()
}

fn frequency_heuristic(donors: &[Donor]) -> RetentionData {
    let returning = donors
        .iter()
        .filter(|d| {
            matches!(
                d.frequency,
                DonationFrequency::Regular | DonationFrequency::Frequent
            )
        })
        .count();
    let new = donors
        .iter()
        .filter(|d| d.frequency == DonationFrequency::OneTime)
        .count();

    let retention_rate = if donors.is_empty() {
        0.0
    } else {
        returning as f64 / donors.len() as f64
    };

    RetentionData {
        new_donors: new,
        returning_donors: returning,
        retention_rate,
        churn_rate: 1.0 - retention_rate,
        mode: RetentionMode::FrequencyHeuristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::group_donations;
    use crate::schema::Donation;
    use chrono::NaiveDate;

    fn donation(first: &str, y: i32, m: u32, d: u32) -> Donation {
        Donation {
            id: format!("{}-{}-{}-{}", first, y, m, d),
            first_name: first.to_string(),
            last_name: "Giver".to_string(),
            amount: 10.0,
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            month: crate::utils::month_name(m).to_string(),
            year: y,
            email: None,
            phone: None,
            donor_id: None,
        }
    }

    #[test]
    fn test_cohort_retention() {
        let donors = group_donations(vec![
            donation("A", 2024, 8, 1),
            donation("B", 2024, 8, 2),
            donation("C", 2024, 8, 3),
            donation("D", 2024, 8, 4),
            donation("A", 2024, 9, 1),
            donation("B", 2024, 9, 5),
            donation("E", 2024, 9, 9),
        ]);

        let retention = compute_retention(&donors);
        assert_eq!(retention.returning_donors, 2);
        assert_eq!(retention.new_donors, 1);
        assert!((retention.retention_rate - 0.5).abs() < 1e-9);
        assert!((retention.churn_rate - 0.5).abs() < 1e-9);
        assert_eq!(
            retention.mode,
            RetentionMode::Cohort {
                current_year: 2024,
                current_month: 9,
                previous_year: 2024,
                previous_month: 8,
            }
        );
    }

    #[test]
    fn test_cohort_spans_year_boundary() {
        let donors = group_donations(vec![
            donation("A", 2023, 12, 20),
            donation("A", 2024, 1, 3),
        ]);

        let retention = compute_retention(&donors);
        assert_eq!(retention.returning_donors, 1);
        assert_eq!(retention.new_donors, 0);
        assert!((retention.retention_rate - 1.0).abs() < 1e-9);
        assert!(retention.churn_rate.abs() < 1e-9);
    }

    #[test]
    fn test_gap_month_switches_to_frequency_heuristic() {
        let mut rows: Vec<Donation> = (1..=4).map(|d| donation("Reg", 2024, 3, d)).collect();
        rows.push(donation("Once", 2024, 3, 10));
        rows.push(donation("Twice", 2024, 3, 11));
        rows.push(donation("Twice", 2024, 6, 11));

        let donors = group_donations(rows);
        let retention = compute_retention(&donors);

        assert_eq!(retention.mode, RetentionMode::FrequencyHeuristic);
        assert_eq!(retention.returning_donors, 1);
        assert_eq!(retention.new_donors, 1);
        assert!((retention.retention_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((retention.churn_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_donors() {
        let retention = compute_retention(&[]);
        assert_eq!(retention.new_donors, 0);
        assert_eq!(retention.returning_donors, 0);
        assert_eq!(retention.retention_rate, 0.0);
        assert_eq!(retention.churn_rate, 1.0);
    }
}
