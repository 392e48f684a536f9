use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid configuration in section '{section}': {details}")]
    InvalidConfig { section: String, details: String },

    #[error("Unknown industry '{0}': no benchmark table is configured for it")]
    UnknownIndustry(String),

    #[error("Invalid seasonality input: {0}")]
    InvalidSeasonality(String),

    #[error("Invalid scenario '{name}': {details}")]
    InvalidScenario { name: String, details: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    pub(crate) fn config(section: &str, details: impl Into<String>) -> Self {
        AnalyzerError::InvalidConfig {
            section: section.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Failures at the narrative-insight boundary. These never escape into the
/// analytical results; the pipeline turns them into an unavailable outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsightError {
    #[error("Insight generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Insight service error: {0}")]
    Service(String),

    #[error("Insight service unavailable: {0}")]
    Unavailable(String),

    #[error("Insight generation was cancelled")]
    Cancelled,
}
