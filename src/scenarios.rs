use crate::accounts::{AccountKey, StatementType};
use crate::error::{AnalyzerError, Result};
use crate::ratios::{RatioDefinition, RatioEngine, RatioResult};
use crate::record::NormalizedRecord;
use log::debug;
use serde::{Deserialize, Serialize};

/// Ratio moves at or below this size (in percent) are left out of the impact summary.
const SIGNIFICANT_CHANGE_PCT: f64 = 5.0;
const SUMMARY_LIMIT: usize = 3;

/// A what-if: every listed account moves by `change_pct` percent in every period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub change_pct: f64,
    /// Accounts the shock applies to. Defaults to revenue and the profit lines.
    #[serde(default = "default_shocked_accounts")]
    pub accounts: Vec<AccountKey>,
}

fn default_shocked_accounts() -> Vec<AccountKey> {
    vec![
        AccountKey::Revenue,
        AccountKey::GrossProfit,
        AccountKey::OperatingIncome,
        AccountKey::Ebitda,
        AccountKey::IncomeBeforeTax,
        AccountKey::NetIncome,
    ]
}

impl Scenario {
    pub fn new(name: &str, change_pct: f64) -> Self {
        Self {
            name: name.to_string(),
            change_pct,
            accounts: default_shocked_accounts(),
        }
    }

    pub fn with_accounts(mut self, accounts: Vec<AccountKey>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| AnalyzerError::InvalidScenario {
            name: self.name.clone(),
            details,
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if !self.change_pct.is_finite() || self.change_pct <= -100.0 {
            return Err(invalid(format!(
                "change_pct must be finite and greater than -100, got {}",
                self.change_pct
            )));
        }
        if self.accounts.is_empty() {
            return Err(invalid("at least one account must be shocked".to_string()));
        }
        Ok(())
    }

    /// Copy of `record` with the shocked accounts scaled. Nulls stay null.
    pub fn apply(&self, record: &NormalizedRecord) -> NormalizedRecord {
        let factor = 1.0 + self.change_pct / 100.0;
        let mut shocked = record.clone();
        for account in &self.accounts {
            if let Some(series) = shocked.accounts.get_mut(account) {
                for value in series.values.iter_mut().flatten() {
                    *value *= factor;
                }
            }
        }
        shocked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioImpact {
    pub ratio: String,
    pub period: String,
    pub base: f64,
    pub scenario: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub change_pct: f64,
    pub ratios: RatioResult,
    /// Latest-period ratio moves above the significance threshold, largest first.
    pub significant_changes: Vec<RatioImpact>,
    pub summary: String,
}

fn ratio_impacts(base: &RatioResult, scenario: &RatioResult) -> Vec<RatioImpact> {
    let mut impacts: Vec<RatioImpact> = base
        .ratios
        .iter()
        .filter_map(|row| {
            let (period, base_value) = base.latest_defined(&row.name)?;
            if base_value == 0.0 {
                return None;
            }
            let scenario_value = scenario.value_for(&row.name, period)?.value()?;
            Some(RatioImpact {
                ratio: row.name.clone(),
                period: period.to_string(),
                base: base_value,
                scenario: scenario_value,
                change_pct: (scenario_value - base_value) / base_value.abs() * 100.0,
            })
        })
        .filter(|impact| impact.change_pct.abs() > SIGNIFICANT_CHANGE_PCT)
        .collect();
    impacts.sort_by(|a, b| b.change_pct.abs().total_cmp(&a.change_pct.abs()));
    impacts
}

fn summarize(impacts: &[RatioImpact]) -> String {
    if impacts.is_empty() {
        return "Minimal impact on key ratios".to_string();
    }
    let parts: Vec<String> = impacts
        .iter()
        .take(SUMMARY_LIMIT)
        .map(|i| {
            let direction = if i.change_pct > 0.0 { "increase" } else { "decrease" };
            format!("{}: {:.1}% {}", i.ratio, i.change_pct.abs(), direction)
        })
        .collect();
    format!("Significant changes: {}", parts.join(", "))
}

/// Recomputes every ratio under each scenario and reports how the latest values move
/// against the unshocked record.
pub fn analyze_scenarios(
    record: &NormalizedRecord,
    statement_type: StatementType,
    definitions: &[RatioDefinition],
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioOutcome>> {
    let engine = RatioEngine::new(definitions);
    let base = engine.compute(record, statement_type);

    scenarios
        .iter()
        .map(|scenario| {
            scenario.validate()?;
            let ratios = engine.compute(&scenario.apply(record), statement_type);
            let significant_changes = ratio_impacts(&base, &ratios);
            debug!(
                "Scenario '{}' ({:+.1}%): {} significant ratio changes",
                scenario.name,
                scenario.change_pct,
                significant_changes.len()
            );
            Ok(ScenarioOutcome {
                name: scenario.name.clone(),
                change_pct: scenario.change_pct,
                summary: summarize(&significant_changes),
                significant_changes,
                ratios,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratios::builtin_ratio_definitions;

    fn record() -> NormalizedRecord {
        NormalizedRecord::new(vec!["2023".to_string()])
            .with_account(AccountKey::Revenue, vec![Some(1000.0)])
            .with_account(AccountKey::NetIncome, vec![Some(100.0)])
            .with_account(AccountKey::TotalAssets, vec![Some(2000.0)])
            .with_account(AccountKey::TotalEquity, vec![Some(1000.0)])
    }

    #[test]
    fn test_revenue_shock_moves_return_ratios_not_margins() {
        let definitions = builtin_ratio_definitions();
        let outcomes = analyze_scenarios(
            &record(),
            StatementType::Unknown,
            &definitions,
            &[Scenario::new("optimistic", 10.0)],
        )
        .unwrap();

        let outcome = &outcomes[0];
        let moved: Vec<&str> = outcome
            .significant_changes
            .iter()
            .map(|i| i.ratio.as_str())
            .collect();
        assert!(moved.contains(&"roa"));
        assert!(moved.contains(&"roe"));
        assert!(moved.contains(&"asset_turnover"));
        assert!(!moved.contains(&"net_margin"));

        let roa = outcome.ratios.value_for("roa", "2023").unwrap().value().unwrap();
        assert!((roa - 5.5).abs() < 1e-9);
        assert!(outcome.summary.starts_with("Significant changes: "));
        assert!(outcome.summary.contains("10.0% increase"));
    }

    #[test]
    fn test_small_shock_has_minimal_impact() {
        let definitions = builtin_ratio_definitions();
        let outcomes = analyze_scenarios(
            &record(),
            StatementType::Unknown,
            &definitions,
            &[Scenario::new("flat", 2.0), Scenario::new("downturn", -20.0)],
        )
        .unwrap();

        assert_eq!(outcomes[0].summary, "Minimal impact on key ratios");
        assert!(outcomes[1]
            .significant_changes
            .iter()
            .all(|i| i.change_pct < 0.0));
        assert!(outcomes[1].summary.contains("20.0% decrease"));
    }

    #[test]
    fn test_apply_only_touches_listed_accounts() {
        let shocked = Scenario::new("assets", 50.0)
            .with_accounts(vec![AccountKey::TotalAssets])
            .apply(&record());
        assert_eq!(shocked.value(AccountKey::TotalAssets, 0), Some(3000.0));
        assert_eq!(shocked.value(AccountKey::Revenue, 0), Some(1000.0));
    }

    #[test]
    fn test_invalid_scenario_is_rejected() {
        let definitions = builtin_ratio_definitions();
        let err = analyze_scenarios(
            &record(),
            StatementType::Unknown,
            &definitions,
            &[Scenario::new("wipeout", -100.0)],
        )
        .unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidScenario { ref name, .. } if name == "wipeout"));
        assert!(Scenario::new("", 5.0).validate().is_err());
    }
}
