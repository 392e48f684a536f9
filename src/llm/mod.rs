#[cfg(feature = "openrouter")]
pub mod client;
pub mod offline;
pub mod prompts;
pub mod types;

#[cfg(feature = "openrouter")]
pub use client::*;
pub use offline::*;
pub use types::*;

use crate::error::{AnalyzerError, InsightError, Result};
use futures::future::BoxFuture;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// A source of narrative insights. Object-safe so the pipeline can hold any
/// implementation behind `&dyn InsightGenerator`.
pub trait InsightGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate<'a>(
        &'a self,
        request: &'a InsightRequest,
    ) -> BoxFuture<'a, std::result::Result<String, InsightError>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InsightConfig {
    #[schemars(description = "Whether the pipeline requests narrative insights at all")]
    pub enabled: bool,

    #[schemars(description = "Upper bound on a single insight request, in seconds")]
    pub timeout_secs: u64,

    #[schemars(
        description = "Average percentage change beyond which an account counts as improving or declining"
    )]
    pub trend_threshold_pct: f64,

    #[schemars(description = "Model identifier passed to the chat-completions service")]
    pub model: String,

    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            trend_threshold_pct: 10.0,
            model: "microsoft/phi-4-reasoning-plus".to_string(),
            max_tokens: 1000,
            temperature: 0.2,
        }
    }
}

impl InsightConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(AnalyzerError::config("insights", "timeout_secs must be positive"));
        }
        if !self.trend_threshold_pct.is_finite() || self.trend_threshold_pct < 0.0 {
            return Err(AnalyzerError::config(
                "insights",
                format!(
                    "trend_threshold_pct must be a non-negative number, got {}",
                    self.trend_threshold_pct
                ),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AnalyzerError::config(
                "insights",
                format!("temperature must be within [0, 2], got {}", self.temperature),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(AnalyzerError::config("insights", "model must not be empty"));
        }
        Ok(())
    }
}

/// Runs the generator under a timeout. Failures become an unavailable outcome.
pub async fn request_insights(
    generator: &dyn InsightGenerator,
    request: &InsightRequest,
    timeout: Duration,
) -> InsightOutcome {
    let result = match tokio::time::timeout(timeout, generator.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(InsightError::Timeout(timeout)),
    };
    into_outcome(generator.name(), result)
}

/// Like [`request_insights`], but abandons the call as soon as `cancel` resolves.
pub async fn request_insights_cancellable<C>(
    generator: &dyn InsightGenerator,
    request: &InsightRequest,
    timeout: Duration,
    cancel: C,
) -> InsightOutcome
where
    C: Future<Output = ()>,
{
    let result = tokio::select! {
        outcome = tokio::time::timeout(timeout, generator.generate(request)) => match outcome {
            Ok(result) => result,
            Err(_) => Err(InsightError::Timeout(timeout)),
        },
        _ = cancel => Err(InsightError::Cancelled),
    };
    into_outcome(generator.name(), result)
}

fn into_outcome(
    provider: &str,
    result: std::result::Result<String, InsightError>,
) -> InsightOutcome {
    match result {
        Ok(text) => {
            debug!("Insight provider '{}' returned {} chars", provider, text.len());
            InsightOutcome::Generated {
                provider: provider.to_string(),
                text,
            }
        }
        Err(e) => {
            warn!("Insight provider '{}' failed: {}", provider, e);
            InsightOutcome::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
