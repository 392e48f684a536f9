use crate::accounts::{AccountKey, StatementType};
use crate::benchmark::BenchmarkPosition;
use crate::diagnostics::ZScoreZone;
use crate::ratios::RatioCategory;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioSnapshot {
    pub name: String,
    pub category: RatioCategory,
    #[schemars(description = "Latest defined value of the ratio")]
    pub value: f64,
    pub period: String,
    #[schemars(description = "Position of the value relative to the industry range")]
    pub position: BenchmarkPosition,
}

/// Structured digest of an analysis run handed to an insight generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InsightSummary {
    pub statement_type: StatementType,
    pub classification_confidence: f64,
    pub industry: String,
    pub periods: Vec<String>,

    #[schemars(description = "Data quality score from 0 to 100")]
    pub quality_score: f64,
    pub completeness: f64,
    pub missing_accounts: Vec<AccountKey>,
    pub anomaly_count: usize,

    pub key_ratios: Vec<RatioSnapshot>,

    #[schemars(description = "Financial strength per ratio category, 0 to 100")]
    pub category_strength: BTreeMap<RatioCategory, f64>,
    pub overall_strength: Option<f64>,

    #[schemars(description = "Accounts whose average period-over-period change is strongly negative")]
    pub declining_accounts: Vec<AccountKey>,
    pub improving_accounts: Vec<AccountKey>,

    pub z_score: Option<f64>,
    pub z_score_zone: Option<ZScoreZone>,
}

impl InsightSummary {
    pub fn ratios_at(&self, position: BenchmarkPosition) -> Vec<&RatioSnapshot> {
        self.key_ratios
            .iter()
            .filter(|r| r.position == position)
            .collect()
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(InsightSummary))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub summary: InsightSummary,
    /// Rendered user prompt for text-generating services.
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightOutcome {
    Generated { provider: String, text: String },
    Unavailable { reason: String },
}

impl InsightOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            InsightOutcome::Generated { text, .. } => Some(text),
            InsightOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, InsightOutcome::Generated { .. })
    }
}
