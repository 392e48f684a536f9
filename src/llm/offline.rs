use crate::accounts::{AccountKey, StatementType};
use crate::benchmark::BenchmarkPosition;
use crate::diagnostics::ZScoreZone;
use crate::error::InsightError;
use crate::llm::types::{InsightRequest, InsightSummary};
use crate::llm::InsightGenerator;
use crate::ratios::RatioCategory;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Rule-based insights computed from the summary alone. Always available.
#[derive(Debug, Clone, Default)]
pub struct OfflineInsightGenerator;

impl OfflineInsightGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn insights(&self, summary: &InsightSummary) -> Vec<String> {
        let mut insights = Vec::new();

        match summary.overall_strength {
            Some(score) if score >= 80.0 => insights.push(
                "Strong overall financial health with good performance across key metrics".to_string(),
            ),
            Some(score) if score >= 60.0 => insights
                .push("Moderate financial health with some areas for improvement".to_string()),
            Some(_) => insights.push(
                "Financial health needs attention; review the weaker categories below".to_string(),
            ),
            None => insights.push(
                "No ratios could be benchmarked; overall strength is not available".to_string(),
            ),
        }

        let weak = |category: RatioCategory| {
            summary
                .category_strength
                .get(&category)
                .map_or(false, |s| *s < 60.0)
        };
        if weak(RatioCategory::Liquidity) {
            insights.push("Liquidity may be a concern; monitor cash flow and the current ratio".to_string());
        }
        if weak(RatioCategory::Profitability) {
            insights.push("Profitability could be improved; review cost structure and pricing".to_string());
        }
        if weak(RatioCategory::Leverage) {
            insights.push("Debt levels may be high; consider debt reduction strategies".to_string());
        }
        if weak(RatioCategory::Efficiency) {
            insights.push("Asset efficiency lags the benchmark; review working capital management".to_string());
        }

        let below: Vec<&str> = summary
            .ratios_at(BenchmarkPosition::Below)
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        if !below.is_empty() {
            insights.push(format!("Below the industry range: {}", below.join(", ")));
        }

        if !summary.declining_accounts.is_empty() {
            insights.push(format!(
                "Declining trends detected in: {}",
                account_list(&summary.declining_accounts)
            ));
        }
        if !summary.improving_accounts.is_empty() {
            insights.push(format!(
                "Positive trends observed in: {}",
                account_list(&summary.improving_accounts)
            ));
        }

        if let (Some(score), Some(zone)) = (summary.z_score, summary.z_score_zone) {
            insights.push(match zone {
                ZScoreZone::Distress => format!(
                    "Z-score of {:.2} indicates elevated financial distress risk",
                    score
                ),
                ZScoreZone::Safe => {
                    format!("Z-score of {:.2} indicates low financial distress risk", score)
                }
                ZScoreZone::Grey => format!("Z-score of {:.2} falls in the grey zone", score),
            });
        }

        if summary.quality_score < 80.0 {
            insights.push(format!(
                "Data quality score is {:.1}; consider validating the input",
                summary.quality_score
            ));
        }

        let focus = match summary.statement_type {
            StatementType::BalanceSheet => Some("Focus on asset efficiency and debt management"),
            StatementType::IncomeStatement => Some("Monitor revenue growth and cost control"),
            StatementType::CashFlowStatement => {
                Some("Ensure positive operating cash flow and disciplined capital allocation")
            }
            StatementType::Unknown => None,
        };
        if let Some(focus) = focus {
            insights.push(focus.to_string());
        }

        insights
    }
}

fn account_list(accounts: &[AccountKey]) -> String {
    accounts
        .iter()
        .take(3)
        .map(|a| a.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl InsightGenerator for OfflineInsightGenerator {
    fn name(&self) -> &str {
        "offline"
    }

    fn generate<'a>(
        &'a self,
        request: &'a InsightRequest,
    ) -> BoxFuture<'a, Result<String, InsightError>> {
        let text = self
            .insights(&request.summary)
            .into_iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n");
        futures::future::ready(Ok(text)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::RatioSnapshot;
    use std::collections::BTreeMap;

    fn summary() -> InsightSummary {
        let mut category_strength = BTreeMap::new();
        category_strength.insert(RatioCategory::Liquidity, 40.0);
        category_strength.insert(RatioCategory::Profitability, 100.0);

        InsightSummary {
            statement_type: StatementType::IncomeStatement,
            classification_confidence: 0.86,
            industry: "general".to_string(),
            periods: vec!["2022".to_string(), "2023".to_string()],
            quality_score: 64.0,
            completeness: 0.8,
            missing_accounts: vec![AccountKey::OperatingIncome],
            anomaly_count: 0,
            key_ratios: vec![RatioSnapshot {
                name: "current_ratio".to_string(),
                category: RatioCategory::Liquidity,
                value: 0.9,
                period: "2023".to_string(),
                position: BenchmarkPosition::Below,
            }],
            category_strength,
            overall_strength: Some(70.0),
            declining_accounts: vec![AccountKey::NetIncome],
            improving_accounts: Vec::new(),
            z_score: None,
            z_score_zone: None,
        }
    }

    #[test]
    fn test_rules_cover_weak_areas() {
        let insights = OfflineInsightGenerator::new().insights(&summary());

        assert!(insights[0].starts_with("Moderate financial health"));
        assert!(insights.iter().any(|i| i.starts_with("Liquidity may be a concern")));
        assert!(!insights.iter().any(|i| i.starts_with("Profitability could be improved")));
        assert!(insights.iter().any(|i| i == "Below the industry range: current_ratio"));
        assert!(insights.iter().any(|i| i.contains("Declining trends detected in: Net Income")));
        assert!(insights.iter().any(|i| i.contains("Data quality score is 64.0")));
        assert_eq!(
            insights.last().map(String::as_str),
            Some("Monitor revenue growth and cost control")
        );
    }

    #[test]
    fn test_summary_schema_mentions_fields() {
        let schema = InsightSummary::schema_as_json().unwrap();
        assert!(schema.contains("quality_score"));
        assert!(schema.contains("key_ratios"));
    }
}
