use donor_insights::*;
use std::env;

const SAMPLE_EXPORT: &str = "\
Donor Name,Gift Amount,Gift Date,Email
Alice Park,$120.00,01/15/2024,alice@example.org
Ben Ortiz,45,2024-01-20,
Alice Park,$130.00,02/14/2024,
Cara Singh,\"1,000.00\",\"Feb 28, 2024\",cara@example.org
Ben Ortiz,50,2024-03-03,ben@example.org
Alice Park,$140.00,03/15/2024,
Ben Ortiz,55,2024-04-05,
Alice Park,$150.00,04/15/2024,
";

fn main() -> anyhow::Result<()> {
    let config = match env::var("DONOR_INSIGHTS_CONFIG") {
        Ok(path) => AnalyticsConfig::from_path(path)?,
        Err(_) => AnalyticsConfig::default(),
    };
    let importer = DonationImporter::new(&config);

    let batch = match env::args().nth(1) {
        Some(path) => importer.import_path(path)?,
        None => importer.import_reader(SAMPLE_EXPORT.as_bytes(), b',')?,
    };

    println!(
        "Imported {} of {} rows ({} rejected)",
        batch.summary.records_processed, batch.summary.total_rows, batch.summary.rows_rejected
    );

    let mut ledger = DonorLedger::new();
    ledger.merge(batch.donations);

    let analyzer = DonationAnalyzer::new(config)?;
    let analysis = analyzer.analyze(ledger.donors());

    println!(
        "{} donors, {} gifts, total {:.2}, average {:.2}",
        analysis.total_donors,
        analysis.donation_count,
        analysis.total_amount,
        analysis.average_donation
    );

    println!("\nTop donors:");
    for donor in &analysis.top_donors {
        println!(
            " - {} ({:?}): {:.2} over {} gifts",
            donor.full_name(),
            donor.frequency,
            donor.total_amount,
            donor.donation_count
        );
    }

    println!("\nMonthly trends:");
    for trend in &analysis.monthly_trends {
        println!(
            " - {} {}: {:.2} from {} donors",
            trend.month, trend.year, trend.amount, trend.donor_count
        );
    }

    let retention = &analysis.donor_retention;
    println!(
        "\nRetention {:.1}% (churn {:.1}%), {} returning / {} new [{:?}]",
        retention.retention_rate * 100.0,
        retention.churn_rate * 100.0,
        retention.returning_donors,
        retention.new_donors,
        retention.mode
    );

    let forecast = &analysis.forecast;
    println!(
        "Forecast: next month {:.2}, next quarter avg {:.2}, confidence {:.2}, trend {:?}",
        forecast.next_month, forecast.next_quarter, forecast.confidence, forecast.trend
    );

    let indicator = EconomicIndicator {
        name: "Consumer Confidence".to_string(),
        data: analysis
            .monthly_trends
            .iter()
            .enumerate()
            .filter_map(|(i, t)| {
                utils::month_start(t.year, t.month_index)
                    .ok()
                    .map(|date| EconomicDataPoint {
                        date,
                        value: 95.0 + i as f64 * 1.5,
                    })
            })
            .collect(),
        current_value: 0.0,
        trend: "up".to_string(),
        correlation: 0.0,
    };

    match analyzer.correlate(&analysis.monthly_trends, &indicator) {
        Some(result) => println!(
            "Correlation with {}: r = {:.3} ({:?}, {:?}, p ~ {:.3})",
            result.indicator_name,
            result.coefficient,
            result.strength,
            result.direction,
            result.approximate_p_value
        ),
        None => println!("No correlation available for {}", indicator.name),
    }

    Ok(())
}
