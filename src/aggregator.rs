use crate::config::AnalyticsConfig;
use crate::schema::{donor_key, AnalysisResult, Donation, DonationFrequency, Donor};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// The in-memory donor set for one session.
///
/// Donors are keyed by lower-cased "first_last" name and kept in the order
/// their key was first seen. Re-imports append to existing donors instead
/// of creating duplicates; there is no matching on email or phone.
#[derive(Debug, Clone, Default)]
pub struct DonorLedger {
    donors: Vec<Donor>,
    index: HashMap<String, usize>,
}

impl DonorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends donations to their donors, creating donors for unseen keys,
    /// then refreshes the derived statistics of every donor touched.
    pub fn merge(&mut self, donations: impl IntoIterator<Item = Donation>) {
        let mut touched: HashSet<usize> = HashSet::new();
        let mut created = 0usize;

        for mut donation in donations {
            let key = donation.donor_key();
            let idx = match self.index.get(&key) {
                Some(&idx) => idx,
                None => {
                    let idx = self.donors.len();
                    self.donors.push(new_donor(key.clone(), &donation));
                    self.index.insert(key, idx);
                    created += 1;
                    idx
                }
            };

            let donor = &mut self.donors[idx];
            donation.donor_id = Some(donor.id.clone());
            absorb(donor, donation);
            touched.insert(idx);
        }

        for idx in &touched {
            finalize(&mut self.donors[*idx]);
        }

        info!(
            "Merged donations into {} donors ({} new, {} total)",
            touched.len(),
            created,
            self.donors.len()
        );
    }

    pub fn donors(&self) -> &[Donor] {
        &self.donors
    }

    pub fn into_donors(self) -> Vec<Donor> {
        self.donors
    }

    pub fn donor_by_key(&self, key: &str) -> Option<&Donor> {
        self.index.get(key).map(|&idx| &self.donors[idx])
    }

    pub fn donor_by_name(&self, first_name: &str, last_name: &str) -> Option<&Donor> {
        self.donor_by_key(&donor_key(first_name, last_name))
    }

    pub fn len(&self) -> usize {
        self.donors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.donors.is_empty()
    }

    pub fn donation_count(&self) -> usize {
        self.donors.iter().map(|d| d.donation_count).sum()
    }

    pub fn analyze(&self, config: &AnalyticsConfig) -> AnalysisResult {
        crate::analyze(&self.donors, config)
    }
}

/// Groups one import's donations into donors.
pub fn group_donations(donations: impl IntoIterator<Item = Donation>) -> Vec<Donor> {
    let mut ledger = DonorLedger::new();
    ledger.merge(donations);
    ledger.into_donors()
}

fn new_donor(key: String, seed: &Donation) -> Donor {
    debug!("New donor '{}'", key);
    Donor {
        id: Uuid::new_v4().to_string(),
        key,
        first_name: seed.first_name.clone(),
        last_name: seed.last_name.clone(),
        email: None,
        phone: None,
        donations: Vec::new(),
        total_amount: 0.0,
        donation_count: 0,
        average_donation: 0.0,
        first_donation: seed.date,
        last_donation: seed.date,
        frequency: DonationFrequency::OneTime,
    }
}

fn absorb(donor: &mut Donor, donation: Donation) {
    if donor.email.is_none() {
        donor.email = donation.email.clone();
    }
    if donor.phone.is_none() {
        donor.phone = donation.phone.clone();
    }

    donor.total_amount += donation.amount;
    donor.donation_count += 1;
    donor.first_donation = donor.first_donation.min(donation.date);
    donor.last_donation = donor.last_donation.max(donation.date);
    donor.donations.push(donation);
}

fn finalize(donor: &mut Donor) {
    donor.average_donation = if donor.donation_count > 0 {
        donor.total_amount / donor.donation_count as f64
    } else {
        0.0
    };
    donor.frequency = DonationFrequency::from_count(donor.donation_count);
}
