//! # Financial Statement Analyzer
//!
//! Turns loosely structured financial statement tables into a canonical account schema
//! and derives analytics from it.
//!
//! ## Core Concepts
//!
//! - **Raw table**: a header row of period labels plus rows of line items, as exported
//!   from a spreadsheet. Labels vary ("Sales", "Turnover", "Revenue from operations").
//! - **Normalized record**: canonical accounts × periods, built by exact and fuzzy alias
//!   matching. Rows that cannot be mapped are reported, never guessed.
//! - **Classification**: balance sheet, income statement or cash flow statement, inferred
//!   from the weighted signature accounts present, with a confidence.
//! - **Ratios**: 27 liquidity, profitability, leverage and efficiency ratios per period.
//!   Missing inputs and zero denominators give an explicit `Undefined` value.
//! - **Quality**: completeness, mapping coverage and anomalies rolled into a 0–100 score.
//! - **Benchmarks**: latest ratio values placed against industry ranges, with a
//!   percentile rank and a plain-language interpretation.
//! - **Seasonality and scenarios**: within-year patterns of quarterly or monthly data,
//!   and ratios recomputed under revenue shocks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_analyzer::*;
//!
//! let table = RawTable::from_records(vec![
//!     vec!["Account", "2022", "2023"],
//!     vec!["Total current assets", "200000", "225000"],
//!     vec!["Total current liabilities", "60000", "65000"],
//! ]);
//!
//! let analyzer = Analyzer::builtin()?;
//! let report = analyzer.analyze(&table, Some("manufacturing"));
//! let current = report.ratios.value_for("current_ratio", "2023");
//! ```

pub mod accounts;
pub mod analyzer;
pub mod benchmark;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ingestion;
pub mod llm;
pub mod normalizer;
pub mod quality;
pub mod ratios;
pub mod record;
pub mod scenarios;
pub mod seasonality;
pub mod trends;
pub mod utils;

pub use accounts::{default_aliases, AccountKey, StatementType};
pub use analyzer::{AnalysisReport, Analyzer, CombinedReport, StatementAnalysis};
pub use benchmark::*;
pub use classifier::{Classification, ClassificationConfig, SignatureAccount, StatementClassifier};
pub use config::AnalyzerConfig;
pub use diagnostics::*;
pub use error::{AnalyzerError, InsightError, Result};
pub use ingestion::*;
pub use llm::{
    request_insights, request_insights_cancellable, InsightConfig, InsightGenerator,
    InsightOutcome, InsightRequest, InsightSummary, OfflineInsightGenerator, RatioSnapshot,
};
pub use normalizer::{
    AliasIndex, MatchingConfig, Resolution, SchemaNormalizer, TableLayout, UnmappedReason,
    UnmappedRow,
};
pub use quality::*;
pub use ratios::*;
pub use record::*;
pub use scenarios::*;
pub use seasonality::*;
pub use trends::*;

#[cfg(feature = "openrouter")]
pub use llm::OpenRouterClient;

/// Maps a raw table onto canonical accounts using the built-in aliases.
pub fn normalize(table: &RawTable) -> Result<(NormalizedRecord, Vec<UnmappedRow>)> {
    Ok(Analyzer::builtin()?.normalize(table))
}

pub fn classify(record: &NormalizedRecord) -> Classification {
    StatementClassifier::new(&AnalyzerConfig::builtin().classification).classify(record)
}

pub fn compute_ratios(record: &NormalizedRecord, statement_type: StatementType) -> RatioResult {
    RatioEngine::new(&AnalyzerConfig::builtin().ratios).compute(record, statement_type)
}

pub fn score(table: &RawTable, record: &NormalizedRecord, unmapped: &[UnmappedRow]) -> QualityReport {
    let config = AnalyzerConfig::builtin();
    QualityScorer::new(&config.quality, &config.classification).score(table, record, unmapped)
}

pub fn compare(ratios: &RatioResult, industry: &str) -> BenchmarkComparison {
    BenchmarkComparator::new(&AnalyzerConfig::builtin().benchmarks).compare(ratios, industry)
}

/// Full pipeline over one table with the built-in configuration.
pub fn analyze(table: &RawTable, industry: Option<&str>) -> Result<AnalysisReport> {
    Ok(Analyzer::builtin()?.analyze(table, industry))
}
