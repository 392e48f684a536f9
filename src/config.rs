use crate::accounts::{default_aliases, AccountKey};
use crate::benchmark::BenchmarkTable;
use crate::classifier::ClassificationConfig;
use crate::error::{AnalyzerError, Result};
use crate::llm::InsightConfig;
use crate::normalizer::{AliasIndex, MatchingConfig};
use crate::quality::QualityConfig;
use crate::ratios::{builtin_ratio_definitions, validate_definitions, RatioDefinition};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Everything the pipeline can be tuned with. Every section falls back to the
/// built-in tables when omitted from a configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[schemars(description = "Alias lists per canonical account. Replaces the built-in lists when given")]
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<AccountKey, Vec<String>>,

    #[schemars(description = "Additional aliases merged on top of `aliases`")]
    #[serde(default)]
    pub extra_aliases: BTreeMap<AccountKey, Vec<String>>,

    #[serde(default)]
    pub classification: ClassificationConfig,

    #[schemars(description = "Ratio definitions evaluated by the ratio engine")]
    #[serde(default = "builtin_ratio_definitions")]
    pub ratios: Vec<RatioDefinition>,

    #[serde(default)]
    pub quality: QualityConfig,

    #[schemars(description = "Industry benchmark ranges keyed by industry, then ratio name")]
    #[serde(default)]
    pub benchmarks: BenchmarkTable,

    #[schemars(description = "Industry used when the caller does not name one")]
    #[serde(default = "default_industry")]
    pub default_industry: String,

    #[serde(default)]
    pub insights: InsightConfig,
}

fn default_industry() -> String {
    "general".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            matching: MatchingConfig::default(),
            aliases: default_aliases(),
            extra_aliases: BTreeMap::new(),
            classification: ClassificationConfig::default(),
            ratios: builtin_ratio_definitions(),
            quality: QualityConfig::default(),
            benchmarks: BenchmarkTable::default(),
            default_industry: default_industry(),
            insights: InsightConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Shared, lazily built instance of the default configuration.
    pub fn builtin() -> &'static AnalyzerConfig {
        static BUILTIN: OnceLock<AnalyzerConfig> = OnceLock::new();
        BUILTIN.get_or_init(AnalyzerConfig::default)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AnalyzerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        info!("Loaded analyzer configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `aliases` with `extra_aliases` appended per account.
    pub fn merged_aliases(&self) -> BTreeMap<AccountKey, Vec<String>> {
        let mut merged = self.aliases.clone();
        for (account, extra) in &self.extra_aliases {
            merged.entry(*account).or_default().extend(extra.iter().cloned());
        }
        merged
    }

    pub fn alias_index(&self) -> Result<AliasIndex> {
        AliasIndex::build(&self.merged_aliases())
    }

    pub fn validate(&self) -> Result<()> {
        self.matching.validate()?;
        self.alias_index()?;
        self.classification.validate()?;
        validate_definitions(&self.ratios)?;
        self.quality.validate()?;
        self.benchmarks.validate()?;
        self.insights.validate()?;

        if self.default_industry.trim().is_empty() {
            return Err(AnalyzerError::config("default_industry", "must not be empty"));
        }
        self.benchmarks.require_industry(&self.default_industry)?;
        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyzerConfig)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_config_is_valid() {
        assert!(AnalyzerConfig::builtin().validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AnalyzerConfig::from_json_str("{}").unwrap();
        assert_eq!(config.ratios.len(), builtin_ratio_definitions().len());
        assert_eq!(config.default_industry, "general");
        assert!((config.matching.similarity_threshold - 0.75).abs() < 1e-12);
        assert!(!config.matching.section_context);
        assert!((config.quality.outlier_floor_pct - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let json = AnalyzerConfig::default().to_json().unwrap();
        let parsed = AnalyzerConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.ratios, AnalyzerConfig::default().ratios);
        assert_eq!(parsed.benchmarks, BenchmarkTable::builtin());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = AnalyzerConfig::from_json_str(r#"{"matching": {"similarity_threshold": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::InvalidConfig { ref section, .. } if section == "matching"
        ));
    }

    #[test]
    fn test_extra_alias_conflicting_with_builtin() {
        let mut config = AnalyzerConfig::default();
        config
            .extra_aliases
            .insert(AccountKey::Revenue, vec!["Net Income".to_string()]);
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::InvalidConfig { ref section, .. } if section == "aliases"
        ));
    }

    #[test]
    fn test_extra_aliases_are_merged() {
        let mut config = AnalyzerConfig::default();
        config
            .extra_aliases
            .insert(AccountKey::Revenue, vec!["Turnover from contracts".to_string()]);
        let merged = config.merged_aliases();
        assert!(merged[&AccountKey::Revenue].contains(&"Turnover from contracts".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_default_industry() {
        let config = AnalyzerConfig {
            default_industry: "aerospace".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyzerError::UnknownIndustry(ref name)) if name == "aerospace"
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            AnalyzerConfig::from_json_str("{ not json"),
            Err(AnalyzerError::Serialization(_))
        ));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = AnalyzerConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("similarity_threshold"));
        assert!(schema_json.contains("default_industry"));
    }
}
