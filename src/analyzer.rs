use crate::accounts::{AccountKey, StatementType};
use crate::benchmark::{BenchmarkComparator, BenchmarkComparison, FinancialStrength};
use crate::classifier::{Classification, StatementClassifier};
use crate::config::AnalyzerConfig;
use crate::diagnostics::{altman_z_score, dupont_analysis, AltmanZScore, DuPontBreakdown};
use crate::error::Result;
use crate::ingestion::RawTable;
use crate::llm::prompts::build_user_prompt;
use crate::llm::{
    request_insights, InsightGenerator, InsightOutcome, InsightRequest, InsightSummary,
    RatioSnapshot,
};
use crate::normalizer::{AliasIndex, SchemaNormalizer, UnmappedRow};
use crate::quality::{QualityReport, QualityScorer};
use crate::ratios::{RatioEngine, RatioResult};
use crate::record::NormalizedRecord;
use crate::scenarios::{analyze_scenarios, Scenario, ScenarioOutcome};
use crate::seasonality::{seasonality_by_account, SeasonalityProfile};
use crate::trends::{analyze_trends, TrendReport};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Everything derived from one statement table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub industry: String,
    pub record: NormalizedRecord,
    pub unmapped: Vec<UnmappedRow>,
    pub classification: Classification,
    pub quality: QualityReport,
    pub ratios: RatioResult,
    pub benchmarks: BenchmarkComparison,
    pub strength: FinancialStrength,
    pub trends: TrendReport,
    /// Only populated for quarterly, half-yearly or monthly periods.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub seasonality: BTreeMap<AccountKey, SeasonalityProfile>,
    pub dupont: Vec<DuPontBreakdown>,
    pub z_score: Option<AltmanZScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insights: Option<InsightOutcome>,
}

/// Per-table results of a combined run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementAnalysis {
    pub classification: Classification,
    pub quality: QualityReport,
    pub unmapped: Vec<UnmappedRow>,
}

/// Several statements of one company merged into a single record, so that cross-statement
/// ratios (ROA, cash flow to debt) become computable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedReport {
    pub industry: String,
    pub statements: Vec<StatementAnalysis>,
    pub record: NormalizedRecord,
    pub ratios: RatioResult,
    pub benchmarks: BenchmarkComparison,
    pub strength: FinancialStrength,
    pub trends: TrendReport,
    pub dupont: Vec<DuPontBreakdown>,
    pub z_score: Option<AltmanZScore>,
}

impl AnalysisReport {
    pub fn insight_summary(&self, trend_threshold_pct: f64) -> InsightSummary {
        let key_ratios = self
            .benchmarks
            .entries
            .iter()
            .filter_map(|entry| {
                let value = entry.value?;
                let period = entry.period.clone()?;
                Some(RatioSnapshot {
                    name: entry.ratio.clone(),
                    category: entry.category,
                    value,
                    period,
                    position: entry.position,
                })
            })
            .collect();

        let category_strength = self
            .strength
            .categories
            .iter()
            .filter_map(|c| c.score.map(|s| (c.category, s)))
            .collect();

        InsightSummary {
            statement_type: self.classification.statement_type,
            classification_confidence: self.classification.confidence,
            industry: self.industry.clone(),
            periods: self.record.periods.clone(),
            quality_score: self.quality.score,
            completeness: self.quality.completeness,
            missing_accounts: self.quality.missing_accounts.clone(),
            anomaly_count: self.quality.anomalies.len(),
            key_ratios,
            category_strength,
            overall_strength: self.strength.overall,
            declining_accounts: self.trends.declining(trend_threshold_pct),
            improving_accounts: self.trends.improving(trend_threshold_pct),
            z_score: self.z_score.as_ref().map(|z| z.score),
            z_score_zone: self.z_score.as_ref().map(|z| z.zone),
        }
    }

    pub fn insight_request(&self, trend_threshold_pct: f64) -> InsightRequest {
        let summary = self.insight_summary(trend_threshold_pct);
        let prompt = build_user_prompt(&summary);
        InsightRequest { summary, prompt }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Validated configuration plus the alias index built from it. Cheap to clone and
/// safe to share across threads.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    index: Arc<AliasIndex>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let index = config.alias_index()?;
        info!(
            "Analyzer ready: {} aliases, {} ratio definitions, {} benchmark industries",
            index.len(),
            config.ratios.len(),
            config.benchmarks.industries.len()
        );
        Ok(Self {
            config: Arc::new(config),
            index: Arc::new(index),
        })
    }

    /// Analyzer over the built-in tables, built once and shared.
    pub fn builtin() -> Result<Self> {
        static BUILTIN: OnceLock<Analyzer> = OnceLock::new();
        if let Some(analyzer) = BUILTIN.get() {
            return Ok(analyzer.clone());
        }
        let analyzer = Analyzer::new(AnalyzerConfig::builtin().clone())?;
        Ok(BUILTIN.get_or_init(|| analyzer).clone())
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn normalize(&self, table: &RawTable) -> (NormalizedRecord, Vec<UnmappedRow>) {
        SchemaNormalizer::new(&self.index, &self.config.matching).normalize(table)
    }

    pub fn classify(&self, record: &NormalizedRecord) -> Classification {
        StatementClassifier::new(&self.config.classification).classify(record)
    }

    pub fn compute_ratios(
        &self,
        record: &NormalizedRecord,
        statement_type: StatementType,
    ) -> RatioResult {
        RatioEngine::new(&self.config.ratios).compute(record, statement_type)
    }

    pub fn score(
        &self,
        table: &RawTable,
        record: &NormalizedRecord,
        unmapped: &[UnmappedRow],
    ) -> QualityReport {
        QualityScorer::new(&self.config.quality, &self.config.classification)
            .score(table, record, unmapped)
    }

    pub fn compare(&self, ratios: &RatioResult, industry: &str) -> BenchmarkComparison {
        BenchmarkComparator::new(&self.config.benchmarks).compare(ratios, industry)
    }

    /// Ratios recomputed under each what-if shock, compared with the unshocked values.
    pub fn scenarios(
        &self,
        record: &NormalizedRecord,
        statement_type: StatementType,
        scenarios: &[Scenario],
    ) -> Result<Vec<ScenarioOutcome>> {
        analyze_scenarios(record, statement_type, &self.config.ratios, scenarios)
    }

    fn industry_or_default<'b>(&'b self, industry: Option<&'b str>) -> &'b str {
        industry.unwrap_or(self.config.default_industry.as_str())
    }

    /// Runs the whole synchronous pipeline over one table.
    pub fn analyze(&self, table: &RawTable, industry: Option<&str>) -> AnalysisReport {
        let industry = self.industry_or_default(industry);
        let (record, unmapped) = self.normalize(table);
        let classification = self.classify(&record);
        let quality = QualityScorer::new(&self.config.quality, &self.config.classification)
            .score_classified(table, &record, &unmapped, &classification);
        let ratios = self.compute_ratios(&record, classification.statement_type);
        let benchmarks = self.compare(&ratios, industry);
        let strength = FinancialStrength::assess(&benchmarks);

        info!(
            "Analyzed {} ({:.0}% confidence): {} accounts over {} periods, quality {:.1}",
            classification.statement_type,
            classification.confidence * 100.0,
            record.accounts.len(),
            record.period_count(),
            quality.score
        );

        AnalysisReport {
            industry: industry.to_string(),
            trends: analyze_trends(&record),
            seasonality: seasonality_by_account(&record),
            dupont: dupont_analysis(&record),
            z_score: altman_z_score(&record),
            record,
            unmapped,
            classification,
            quality,
            ratios,
            benchmarks,
            strength,
            insights: None,
        }
    }

    /// Analyzes each table on its own, then computes ratios over the merged record.
    pub fn analyze_combined(&self, tables: &[RawTable], industry: Option<&str>) -> CombinedReport {
        let industry = self.industry_or_default(industry);
        let scorer = QualityScorer::new(&self.config.quality, &self.config.classification);

        let mut merged = NormalizedRecord::default();
        let mut statements = Vec::with_capacity(tables.len());
        for table in tables {
            let (record, unmapped) = self.normalize(table);
            let classification = self.classify(&record);
            let quality = scorer.score_classified(table, &record, &unmapped, &classification);
            merged = merged.merge(&record);
            statements.push(StatementAnalysis {
                classification,
                quality,
                unmapped,
            });
        }

        let ratios = self.compute_ratios(&merged, StatementType::Unknown);
        let benchmarks = self.compare(&ratios, industry);
        let strength = FinancialStrength::assess(&benchmarks);
        info!(
            "Combined {} statements into {} accounts over {} periods",
            statements.len(),
            merged.accounts.len(),
            merged.period_count()
        );

        CombinedReport {
            industry: industry.to_string(),
            statements,
            trends: analyze_trends(&merged),
            dupont: dupont_analysis(&merged),
            z_score: altman_z_score(&merged),
            record: merged,
            ratios,
            benchmarks,
            strength,
        }
    }

    /// [`analyze`](Self::analyze) followed by a bounded insight request. The analytical
    /// results are identical whether or not the generator succeeds.
    pub async fn analyze_with_insights(
        &self,
        table: &RawTable,
        industry: Option<&str>,
        generator: &dyn InsightGenerator,
    ) -> AnalysisReport {
        let mut report = self.analyze(table, industry);
        if !self.config.insights.enabled {
            return report;
        }
        let request = report.insight_request(self.config.insights.trend_threshold_pct);
        let outcome = request_insights(generator, &request, self.config.insights.timeout()).await;
        report.insights = Some(outcome);
        report
    }
}
