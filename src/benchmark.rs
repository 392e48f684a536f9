use crate::error::{AnalyzerError, Result};
use crate::ratios::{RatioCategory, RatioResult};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BenchmarkRange {
    pub low: f64,
    pub typical: f64,
    pub high: f64,
}

impl BenchmarkRange {
    pub fn new(low: f64, typical: f64, high: f64) -> Self {
        Self { low, typical, high }
    }

    pub fn position(&self, value: f64) -> BenchmarkPosition {
        if value < self.low {
            BenchmarkPosition::Below
        } else if value > self.high {
            BenchmarkPosition::Above
        } else {
            BenchmarkPosition::Within
        }
    }

    /// Coarse percentile of `value` within the industry, reading `low`, `typical` and
    /// `high` as the 25th, 50th and 75th percentiles. Values past `high` rank at 90.
    pub fn percentile_rank(&self, value: f64) -> f64 {
        if value <= self.low {
            25.0
        } else if value <= self.typical {
            50.0
        } else if value <= self.high {
            75.0
        } else {
            90.0
        }
    }
}

/// Industry key → ratio name → expected range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct BenchmarkTable {
    pub industries: BTreeMap<String, BTreeMap<String, BenchmarkRange>>,
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BenchmarkTable {
    pub fn builtin() -> Self {
        let industry = |ranges: &[(&str, f64, f64, f64)]| -> BTreeMap<String, BenchmarkRange> {
            ranges
                .iter()
                .map(|(name, low, typical, high)| {
                    (name.to_string(), BenchmarkRange::new(*low, *typical, *high))
                })
                .collect()
        };

        let mut industries = BTreeMap::new();
        industries.insert(
            "technology".to_string(),
            industry(&[
                ("gross_margin", 60.0, 72.0, 85.0),
                ("operating_margin", 15.0, 25.0, 35.0),
                ("current_ratio", 2.0, 3.0, 4.0),
                ("debt_to_equity", 0.1, 0.25, 0.4),
            ]),
        );
        industries.insert(
            "manufacturing".to_string(),
            industry(&[
                ("gross_margin", 20.0, 30.0, 40.0),
                ("operating_margin", 5.0, 10.0, 15.0),
                ("current_ratio", 1.2, 1.8, 2.5),
                ("debt_to_equity", 0.3, 0.5, 0.7),
            ]),
        );
        industries.insert(
            "retail".to_string(),
            industry(&[
                ("gross_margin", 25.0, 37.0, 50.0),
                ("operating_margin", 3.0, 7.0, 12.0),
                ("current_ratio", 1.0, 1.5, 2.0),
                ("debt_to_equity", 0.4, 0.6, 0.8),
            ]),
        );
        industries.insert(
            "financial_services".to_string(),
            industry(&[
                ("net_margin", 15.0, 22.0, 30.0),
                ("roe", 10.0, 15.0, 20.0),
                ("debt_to_equity", 3.0, 5.5, 8.0),
            ]),
        );
        industries.insert(
            "general".to_string(),
            industry(&[
                ("current_ratio", 1.5, 2.25, 3.0),
                ("quick_ratio", 1.0, 1.25, 1.5),
                ("cash_ratio", 0.1, 0.15, 0.2),
                ("gross_margin", 20.0, 50.0, 80.0),
                ("operating_margin", 5.0, 15.0, 25.0),
                ("net_margin", 3.0, 11.5, 20.0),
                ("roa", 5.0, 10.0, 15.0),
                ("roe", 10.0, 17.5, 25.0),
                ("debt_to_equity", 0.3, 0.45, 0.6),
                ("debt_to_assets", 0.2, 0.3, 0.4),
                ("interest_coverage", 2.5, 8.0, 50.0),
                ("asset_turnover", 0.5, 1.25, 2.0),
                ("inventory_turnover", 4.0, 8.0, 12.0),
                ("receivables_turnover", 6.0, 9.0, 12.0),
            ]),
        );
        Self { industries }
    }

    pub fn industry(&self, key: &str) -> Option<&BTreeMap<String, BenchmarkRange>> {
        self.industries.get(key)
    }

    /// Percentile rank of a ratio value against one industry. `None` when the industry
    /// or the ratio has no configured range.
    pub fn percentile(&self, industry: &str, ratio: &str, value: f64) -> Option<f64> {
        self.industry(industry)?
            .get(ratio)
            .map(|range| range.percentile_rank(value))
    }

    pub fn industry_keys(&self) -> Vec<&str> {
        self.industries.keys().map(String::as_str).collect()
    }

    /// Looks up an industry, failing when it is not configured.
    pub fn require_industry(&self, key: &str) -> Result<&BTreeMap<String, BenchmarkRange>> {
        self.industry(key)
            .ok_or_else(|| AnalyzerError::UnknownIndustry(key.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (industry, ranges) in &self.industries {
            if industry.trim().is_empty() {
                return Err(AnalyzerError::config("benchmarks", "industry key must not be empty"));
            }
            for (ratio, range) in ranges {
                let finite = range.low.is_finite() && range.typical.is_finite() && range.high.is_finite();
                if !finite || range.low > range.typical || range.typical > range.high {
                    return Err(AnalyzerError::config(
                        "benchmarks",
                        format!(
                            "{}/{}: expected finite low <= typical <= high, got {} / {} / {}",
                            industry, ratio, range.low, range.typical, range.high
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkPosition {
    Below,
    Within,
    Above,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub ratio: String,
    pub category: RatioCategory,
    pub value: Option<f64>,
    /// Period the compared value comes from.
    pub period: Option<String>,
    pub range: Option<BenchmarkRange>,
    pub position: BenchmarkPosition,
    /// Percentage distance from the typical value.
    pub deviation_from_typical: Option<f64>,
    pub percentile: Option<f64>,
}

impl BenchmarkEntry {
    pub fn interpretation(&self) -> RatioInterpretation {
        match self.value {
            Some(value) => interpret_ratio(value, self.range.as_ref()),
            None => RatioInterpretation::unknown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub industry: String,
    pub industry_known: bool,
    pub entries: Vec<BenchmarkEntry>,
}

impl BenchmarkComparison {
    pub fn get(&self, ratio: &str) -> Option<&BenchmarkEntry> {
        self.entries.iter().find(|e| e.ratio == ratio)
    }

    pub fn count(&self, position: BenchmarkPosition) -> usize {
        self.entries.iter().filter(|e| e.position == position).count()
    }
}

pub struct BenchmarkComparator<'a> {
    table: &'a BenchmarkTable,
}

impl<'a> BenchmarkComparator<'a> {
    pub fn new(table: &'a BenchmarkTable) -> Self {
        Self { table }
    }

    /// Places each ratio's latest defined value against the industry range.
    /// An unknown industry is not an error: every entry is simply unavailable.
    pub fn compare(&self, ratios: &RatioResult, industry: &str) -> BenchmarkComparison {
        let ranges = self.table.industry(industry);
        if ranges.is_none() {
            warn!("No benchmarks configured for industry '{}'", industry);
        }

        let entries = ratios
            .ratios
            .iter()
            .map(|row| {
                let latest = ratios.latest_defined(&row.name);
                let range = ranges.and_then(|r| r.get(&row.name)).copied();
                let (position, deviation) = match (latest, range) {
                    (Some((_, value)), Some(range)) => {
                        let deviation = (range.typical != 0.0)
                            .then(|| (value - range.typical) / range.typical.abs() * 100.0);
                        (range.position(value), deviation)
                    }
                    _ => (BenchmarkPosition::Unavailable, None),
                };
                BenchmarkEntry {
                    ratio: row.name.clone(),
                    category: row.category,
                    value: latest.map(|(_, v)| v),
                    period: latest.map(|(p, _)| p.to_string()),
                    range,
                    position,
                    deviation_from_typical: deviation,
                    percentile: latest
                        .zip(range)
                        .map(|((_, value), range)| range.percentile_rank(value)),
                }
            })
            .collect();

        let comparison = BenchmarkComparison {
            industry: industry.to_string(),
            industry_known: ranges.is_some(),
            entries,
        };
        debug!(
            "Benchmarked against '{}': {} below, {} within, {} above",
            industry,
            comparison.count(BenchmarkPosition::Below),
            comparison.count(BenchmarkPosition::Within),
            comparison.count(BenchmarkPosition::Above)
        );
        comparison
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationStatus {
    Good,
    Low,
    High,
    Unknown,
}

/// Plain-language reading of one ratio value against its healthy range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioInterpretation {
    pub status: InterpretationStatus,
    pub message: String,
    pub recommendation: String,
}

impl RatioInterpretation {
    fn unknown() -> Self {
        Self {
            status: InterpretationStatus::Unknown,
            message: "No interpretation available".to_string(),
            recommendation: "Monitor this metric".to_string(),
        }
    }
}

/// Reads `value` against `range` (inclusive at both ends). Without a range the status
/// is unknown.
pub fn interpret_ratio(value: f64, range: Option<&BenchmarkRange>) -> RatioInterpretation {
    let Some(range) = range else {
        return RatioInterpretation::unknown();
    };
    let (status, message, recommendation) = match range.position(value) {
        BenchmarkPosition::Below => (
            InterpretationStatus::Low,
            format!("Value ({:.2}) is below the recommended range", value),
            "Consider strategies to improve this metric",
        ),
        BenchmarkPosition::Above => (
            InterpretationStatus::High,
            format!("Value ({:.2}) is above the recommended range", value),
            "Evaluate whether this level is sustainable and optimal",
        ),
        _ => (
            InterpretationStatus::Good,
            format!("Value ({:.2}) is within the healthy range", value),
            "Maintain current performance",
        ),
    };
    RatioInterpretation {
        status,
        message,
        recommendation: recommendation.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStrength {
    pub category: RatioCategory,
    pub score: Option<f64>,
    pub ratios_scored: usize,
}

/// Per-category 0–100 health scores derived from benchmark positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStrength {
    pub categories: Vec<CategoryStrength>,
    pub overall: Option<f64>,
}

impl FinancialStrength {
    pub fn category(&self, category: RatioCategory) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .and_then(|c| c.score)
    }

    pub fn assess(comparison: &BenchmarkComparison) -> Self {
        let categories: Vec<CategoryStrength> = RatioCategory::ALL
            .iter()
            .map(|category| {
                let scores: Vec<f64> = comparison
                    .entries
                    .iter()
                    .filter(|e| e.category == *category)
                    .filter_map(|e| position_score(*category, e.position))
                    .collect();
                CategoryStrength {
                    category: *category,
                    score: crate::utils::mean(&scores),
                    ratios_scored: scores.len(),
                }
            })
            .collect();

        let available: Vec<f64> = categories.iter().filter_map(|c| c.score).collect();
        Self {
            overall: crate::utils::mean(&available),
            categories,
        }
    }
}

fn position_score(category: RatioCategory, position: BenchmarkPosition) -> Option<f64> {
    use BenchmarkPosition::*;

    let score = match (category, position) {
        (_, Unavailable) => return None,
        (_, Within) => 100.0,
        (RatioCategory::Liquidity, Below) => 40.0,
        (RatioCategory::Liquidity, Above) => 70.0,
        (RatioCategory::Profitability, Below) => 30.0,
        (RatioCategory::Profitability, Above) => 80.0,
        (RatioCategory::Leverage, Above) => 40.0,
        (RatioCategory::Leverage, Below) => 70.0,
        (RatioCategory::Efficiency, Below) => 50.0,
        (RatioCategory::Efficiency, Above) => 85.0,
    };
    Some(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountKey, StatementType};
    use crate::ratios::{builtin_ratio_definitions, RatioEngine};
    use crate::record::NormalizedRecord;

    fn ratios() -> RatioResult {
        let record = NormalizedRecord::new(vec!["2022".to_string(), "2023".to_string()])
            .with_account(AccountKey::CurrentAssets, vec![Some(300.0), Some(500.0)])
            .with_account(AccountKey::CurrentLiabilities, vec![Some(100.0), Some(100.0)])
            .with_account(AccountKey::TotalLiabilities, vec![Some(20.0), None])
            .with_account(AccountKey::TotalEquity, vec![Some(100.0), Some(100.0)]);
        let definitions = builtin_ratio_definitions();
        RatioEngine::new(&definitions).compute(&record, StatementType::BalanceSheet)
    }

    #[test]
    fn test_builtin_table_is_valid() {
        let table = BenchmarkTable::builtin();
        table.validate().unwrap();
        assert_eq!(
            table.industry_keys(),
            vec!["financial_services", "general", "manufacturing", "retail", "technology"]
        );
    }

    #[test]
    fn test_compare_uses_latest_defined_value() {
        let table = BenchmarkTable::builtin();
        let comparison = BenchmarkComparator::new(&table).compare(&ratios(), "general");

        let current = comparison.get("current_ratio").unwrap();
        assert_eq!(current.value, Some(5.0));
        assert_eq!(current.period.as_deref(), Some("2023"));
        assert_eq!(current.position, BenchmarkPosition::Above);

        let leverage = comparison.get("debt_to_equity").unwrap();
        assert_eq!(leverage.period.as_deref(), Some("2022"));
        assert_eq!(leverage.position, BenchmarkPosition::Below);

        assert_eq!(comparison.get("net_margin").unwrap().position, BenchmarkPosition::Unavailable);
    }

    #[test]
    fn test_unknown_industry_is_unavailable() {
        let table = BenchmarkTable::builtin();
        let comparison = BenchmarkComparator::new(&table).compare(&ratios(), "aerospace");
        assert!(!comparison.industry_known);
        assert!(comparison
            .entries
            .iter()
            .all(|e| e.position == BenchmarkPosition::Unavailable));
        assert!(matches!(
            table.require_industry("aerospace"),
            Err(AnalyzerError::UnknownIndustry(_))
        ));
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut table = BenchmarkTable::builtin();
        table
            .industries
            .get_mut("general")
            .unwrap()
            .insert("current_ratio".to_string(), BenchmarkRange::new(3.0, 2.0, 1.0));
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_percentile_rank() {
        let table = BenchmarkTable::builtin();
        // general current_ratio: 1.5 / 2.25 / 3.0
        assert_eq!(table.percentile("general", "current_ratio", 1.5), Some(25.0));
        assert_eq!(table.percentile("general", "current_ratio", 2.0), Some(50.0));
        assert_eq!(table.percentile("general", "current_ratio", 2.9), Some(75.0));
        assert_eq!(table.percentile("general", "current_ratio", 5.0), Some(90.0));
        assert_eq!(table.percentile("general", "ebitda_margin", 5.0), None);
        assert_eq!(table.percentile("aerospace", "current_ratio", 2.0), None);

        let comparison = BenchmarkComparator::new(&table).compare(&ratios(), "general");
        assert_eq!(comparison.get("current_ratio").unwrap().percentile, Some(90.0));
        assert_eq!(comparison.get("net_margin").unwrap().percentile, None);
    }

    #[test]
    fn test_ratio_interpretation() {
        let range = BenchmarkRange::new(1.5, 2.25, 3.0);

        let good = interpret_ratio(3.0, Some(&range));
        assert_eq!(good.status, InterpretationStatus::Good);
        assert_eq!(good.message, "Value (3.00) is within the healthy range");

        let low = interpret_ratio(0.8, Some(&range));
        assert_eq!(low.status, InterpretationStatus::Low);
        assert_eq!(low.recommendation, "Consider strategies to improve this metric");

        assert_eq!(interpret_ratio(4.0, Some(&range)).status, InterpretationStatus::High);
        assert_eq!(interpret_ratio(4.0, None).status, InterpretationStatus::Unknown);

        let table = BenchmarkTable::builtin();
        let comparison = BenchmarkComparator::new(&table).compare(&ratios(), "general");
        let leverage = comparison.get("debt_to_equity").unwrap().interpretation();
        assert_eq!(leverage.status, InterpretationStatus::Low);
        assert_eq!(
            comparison.get("net_margin").unwrap().interpretation().status,
            InterpretationStatus::Unknown
        );
    }

    #[test]
    fn test_financial_strength() {
        let table = BenchmarkTable::builtin();
        let comparison = BenchmarkComparator::new(&table).compare(&ratios(), "general");
        let strength = FinancialStrength::assess(&comparison);

        // current ratio above (70); quick ratio unavailable (no inventory); cash ratio unavailable
        assert_eq!(strength.category(RatioCategory::Liquidity), Some(70.0));
        // debt to equity 0.2 below the range (70)
        assert_eq!(strength.category(RatioCategory::Leverage), Some(70.0));
        assert_eq!(strength.category(RatioCategory::Profitability), None);
        assert_eq!(strength.overall, Some(70.0));
    }
}
