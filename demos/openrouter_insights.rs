use dotenv::dotenv;
use financial_statement_analyzer::{
    request_insights, Analyzer, AnalyzerConfig, InsightGenerator, OfflineInsightGenerator,
    OpenRouterClient, RawTable,
};

fn sample_balance_sheet() -> RawTable {
    RawTable::from_records(vec![
        vec!["Account", "2022", "2023"],
        vec!["Cash and cash equivalents", "52,000", "61,000"],
        vec!["Accounts receivable", "33,000", "35,000"],
        vec!["Inventories", "50,000", "54,000"],
        vec!["Total current assets", "200,000", "225,000"],
        vec!["Total assets", "530,000", "570,000"],
        vec!["Total current liabilities", "62,000", "65,000"],
        vec!["Total liabilities", "197,000", "195,000"],
        vec!["Total shareholders' equity", "333,000", "375,000"],
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AnalyzerConfig::default();
    let insight_config = config.insights.clone();
    let analyzer = Analyzer::new(config)?;

    let report = analyzer.analyze(&sample_balance_sheet(), Some("manufacturing"));
    let request = report.insight_request(insight_config.trend_threshold_pct);

    let offline = OfflineInsightGenerator::new();
    let remote = match std::env::var("OPENROUTER_API_KEY") {
        Ok(key) => Some(OpenRouterClient::new(key, &insight_config)?),
        Err(_) => {
            println!("ℹ️  OPENROUTER_API_KEY not set, using offline insights only");
            None
        }
    };
    let generator: &dyn InsightGenerator = match &remote {
        Some(client) => client,
        None => &offline,
    };

    println!("🤖 Requesting insights from '{}'...", generator.name());
    let outcome = request_insights(generator, &request, insight_config.timeout()).await;
    match outcome.text() {
        Some(text) => println!("\n{}", text),
        None => {
            println!("❌ {:?}\nFalling back to offline insights:\n", outcome);
            for line in offline.insights(&request.summary) {
                println!("- {}", line);
            }
        }
    }
    Ok(())
}
