use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One monetary gift, built from a single spreadsheet row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[schemars(description = "Full English month name derived from the date, e.g. 'August'")]
    pub month: String,
    pub year: i32,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schemars(description = "Identifier of the owning donor; empty until the donation is grouped")]
    pub donor_id: Option<String>,
}

impl Donation {
    /// Lower-cased "first_last" identity shared by every gift from one donor.
    pub fn donor_key(&self) -> String {
        donor_key(&self.first_name, &self.last_name)
    }
}

pub fn donor_key(first_name: &str, last_name: &str) -> String {
    format!(
        "{}_{}",
        first_name.trim().to_lowercase(),
        last_name.trim().to_lowercase()
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DonationFrequency {
    #[schemars(description = "Exactly one donation")]
    OneTime,
    #[schemars(description = "Two or three donations")]
    Occasional,
    #[schemars(description = "Four to six donations")]
    Regular,
    #[schemars(description = "Seven or more donations")]
    Frequent,
}

impl DonationFrequency {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 | 1 => Self::OneTime,
            2..=3 => Self::Occasional,
            4..=6 => Self::Regular,
            _ => Self::Frequent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Donor {
    pub id: String,
    #[schemars(description = "Normalized 'first_last' identity used to merge imports")]
    pub key: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schemars(description = "Owned donations in encounter order")]
    pub donations: Vec<Donation>,
    pub total_amount: f64,
    pub donation_count: usize,
    pub average_donation: f64,
    pub first_donation: NaiveDate,
    pub last_donation: NaiveDate,
    pub frequency: DonationFrequency,
}

impl Donor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTrend {
    pub year: i32,
    #[schemars(description = "Full English month name")]
    pub month: String,
    #[schemars(description = "Calendar month, January = 1")]
    pub month_index: u32,
    pub amount: f64,
    #[schemars(description = "Distinct donors who gave during the month")]
    pub donor_count: usize,
    #[schemars(description = "Number of gifts made during the month")]
    pub donation_count: usize,
    #[schemars(description = "Amount divided by distinct donor count")]
    pub average_donation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RetentionMode {
    #[schemars(description = "Exact cohort comparison of the latest month against the month before it")]
    #[serde(rename_all = "camelCase")]
    Cohort {
        current_year: i32,
        current_month: u32,
        previous_year: i32,
        previous_month: u32,
    },
    #[schemars(
        description = "Approximation used when either month has no donors: regular/frequent donors count as returning, one-time donors as new"
    )]
    FrequencyHeuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetentionData {
    pub new_donors: usize,
    pub returning_donors: usize,
    pub retention_rate: f64,
    pub churn_rate: f64,
    pub mode: RetentionMode,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastData {
    pub next_month: f64,
    #[schemars(description = "Average predicted monthly amount over the three months after next month")]
    pub next_quarter: f64,
    #[schemars(description = "R-squared of the fitted line, between 0 and 1")]
    pub confidence: f64,
    pub trend: TrendDirection,
    pub slope: f64,
    pub months_used: usize,
}

impl ForecastData {
    /// The forecast reported when there is too little history to fit a line.
    pub fn flat() -> Self {
        Self {
            next_month: 0.0,
            next_quarter: 0.0,
            confidence: 0.0,
            trend: TrendDirection::Stable,
            slope: 0.0,
            months_used: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct EconomicDataPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// An external series supplied by an indicator collaborator. Only `data` is
/// consumed by the correlation engine; the other fields are display values
/// owned by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EconomicIndicator {
    pub name: String,
    pub data: Vec<EconomicDataPoint>,
    #[serde(default)]
    pub current_value: f64,
    #[serde(default)]
    pub trend: String,
    #[serde(default)]
    #[schemars(description = "Pre-declared coefficient for display; not recomputed")]
    pub correlation: f64,
}

impl EconomicIndicator {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub total_donors: usize,
    pub total_amount: f64,
    #[schemars(description = "Total amount divided by number of donations")]
    pub average_donation: f64,
    pub donation_count: usize,
    #[schemars(description = "Donors with the highest total giving, largest first")]
    pub top_donors: Vec<Donor>,
    pub monthly_trends: Vec<MonthlyTrend>,
    pub donor_retention: RetentionData,
    pub forecast: ForecastData,
}

impl AnalysisResult {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisResult)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_thresholds() {
        assert_eq!(DonationFrequency::from_count(1), DonationFrequency::OneTime);
        assert_eq!(DonationFrequency::from_count(2), DonationFrequency::Occasional);
        assert_eq!(DonationFrequency::from_count(3), DonationFrequency::Occasional);
        assert_eq!(DonationFrequency::from_count(4), DonationFrequency::Regular);
        assert_eq!(DonationFrequency::from_count(6), DonationFrequency::Regular);
        assert_eq!(DonationFrequency::from_count(7), DonationFrequency::Frequent);
        assert_eq!(DonationFrequency::from_count(40), DonationFrequency::Frequent);
    }

    #[test]
    fn test_frequency_is_monotonic_in_count() {
        let mut previous = DonationFrequency::from_count(1);
        for count in 2..30 {
            let current = DonationFrequency::from_count(count);
            assert!(current >= previous, "count {} went backwards", count);
            previous = current;
        }
    }

    #[test]
    fn test_donor_key_normalizes_case_and_whitespace() {
        assert_eq!(donor_key(" John ", "SMITH"), "john_smith");
        assert_eq!(donor_key("Ana", ""), "ana_");
    }

    #[test]
    fn test_frequency_serializes_kebab_case() {
        let json = serde_json::to_string(&DonationFrequency::OneTime).unwrap();
        assert_eq!(json, "\"one-time\"");
    }

    #[test]
    fn test_indicator_from_collaborator_json() {
        let json = r#"{
            "name": "Unemployment Rate",
            "data": [
                { "date": "2024-01-01", "value": 3.7 },
                { "date": "2024-02-01", "value": 3.9 }
            ],
            "currentValue": 3.9,
            "trend": "up",
            "correlation": -0.42
        }"#;

        let indicator = EconomicIndicator::from_json(json).unwrap();
        assert_eq!(indicator.name, "Unemployment Rate");
        assert_eq!(indicator.data.len(), 2);
        assert_eq!(
            indicator.data[1].date,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
        assert!((indicator.correlation + 0.42).abs() < 1e-12);
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = AnalysisResult::schema_as_json().unwrap();
        assert!(schema_json.contains("totalDonors"));
        assert!(schema_json.contains("monthlyTrends"));
        assert!(schema_json.contains("donorRetention"));
    }
}
