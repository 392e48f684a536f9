use anyhow::Context;
use financial_statement_analyzer::{Analyzer, AnalyzerConfig, RawTable, RatioCategory};
use std::env;

const SAMPLE: &str = "\
Account,2021,2022,2023
Revenue,\"800,000\",\"880,000\",\"950,000\"
Cost of goods sold,\"480,000\",\"520,000\",\"555,000\"
Gross profit,\"320,000\",\"360,000\",\"395,000\"
Operating income,\"90,000\",\"104,000\",\"118,000\"
Interest expense,\"8,000\",\"7,500\",\"7,000\"
Net income,\"60,000\",\"70,000\",\"80,000\"
";

fn read_table(source: Option<&str>) -> anyhow::Result<RawTable> {
    let mut reader = match source {
        Some(path) => {
            let file = std::fs::File::open(path).with_context(|| format!("opening {}", path))?;
            csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(Box::new(file) as Box<dyn std::io::Read>)
        }
        None => csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(Box::new(SAMPLE.as_bytes()) as Box<dyn std::io::Read>),
    };

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.context("reading CSV record")?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(RawTable::from_records(records))
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let path = args.first().map(String::as_str);
    let industry = args.get(1).map(String::as_str);
    let config_path = env::var("ANALYZER_CONFIG").ok();

    let config = match config_path {
        Some(path) => AnalyzerConfig::from_path(&path)?,
        None => AnalyzerConfig::default(),
    };
    let analyzer = Analyzer::new(config)?;
    let table = read_table(path)?;

    println!("📊 Analyzing {}...", path.unwrap_or("built-in sample"));
    let report = analyzer.analyze(&table, industry);

    println!(
        "🧾 Statement: {} ({:.0}% confidence)",
        report.classification.statement_type,
        report.classification.confidence * 100.0
    );
    println!(
        "✅ Quality score: {:.1}/100 (completeness {:.0}%)",
        report.quality.score,
        report.quality.completeness * 100.0
    );
    for row in &report.unmapped {
        println!("⚠️  Unmapped row {}: '{}'", row.row_index, row.label);
    }

    for category in RatioCategory::ALL {
        println!("\n{}:", category);
        for row in report.ratios.by_category(category) {
            match report.ratios.latest_defined(&row.name) {
                Some((period, value)) => println!("  {:<28} {:>10.3}  ({})", row.name, value, period),
                None => println!("  {:<28} {:>10}", row.name, "n/a"),
            }
        }
    }

    if let Some(overall) = report.strength.overall {
        println!("\n💪 Financial strength vs {}: {:.0}/100", report.industry, overall);
    }

    if env::var("REPORT_JSON").is_ok() {
        println!("\n{}", report.to_json()?);
    }
    Ok(())
}
