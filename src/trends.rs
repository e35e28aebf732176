use crate::schema::{Donor, MonthlyTrend};
use crate::utils::{month_key, month_name};
use std::collections::{BTreeMap, HashSet};

#[derive(Default)]
struct MonthBucket<'a> {
    amount: f64,
    donations: usize,
    donors: HashSet<&'a str>,
}

/// Buckets every donation by calendar month. The result is ordered by
/// (year, month of year) and has one entry per month that saw a gift.
pub fn monthly_trends(donors: &[Donor]) -> Vec<MonthlyTrend> {
    let mut buckets: BTreeMap<(i32, u32), MonthBucket<'_>> = BTreeMap::new();

    for donor in donors {
        for donation in &donor.donations {
            let bucket = buckets.entry(month_key(donation.date)).or_default();
            bucket.amount += donation.amount;
            bucket.donations += 1;
            bucket.donors.insert(donor.id.as_str());
        }
    }

    buckets
        .into_iter()
        .map(|((year, month), bucket)| {
            let donor_count = bucket.donors.len();
            MonthlyTrend {
                year,
                month: month_name(month).to_string(),
                month_index: month,
                amount: bucket.amount,
                donor_count,
                donation_count: bucket.donations,
                average_donation: if donor_count > 0 {
                    bucket.amount / donor_count as f64
                } else {
                    0.0
                },
            }
        })
        .collect()
}
