use crate::accounts::{AccountKey, StatementType};
use crate::classifier::{Classification, ClassificationConfig, StatementClassifier};
use crate::error::{AnalyzerError, Result};
use crate::ingestion::RawTable;
use crate::normalizer::UnmappedRow;
use crate::record::NormalizedRecord;
use crate::utils::median;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scale factor turning a median absolute deviation into a standard deviation estimate.
const MAD_TO_STD: f64 = 1.4826;
const STD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QualityConfig {
    #[schemars(description = "Accounts a complete statement of each type is expected to carry")]
    #[serde(default = "default_required_accounts")]
    pub required_accounts: BTreeMap<StatementType, Vec<AccountKey>>,

    #[schemars(description = "Accounts whose values should never be negative")]
    #[serde(default = "default_non_negative_accounts")]
    pub non_negative_accounts: Vec<AccountKey>,

    #[schemars(description = "A value further than this many robust standard deviations from the median is an outlier")]
    #[serde(default = "default_outlier_multiplier")]
    pub outlier_multiplier: f64,

    #[schemars(description = "Minimum non-null periods before outlier detection runs on an account")]
    #[serde(default = "default_min_outlier_periods")]
    pub min_outlier_periods: usize,

    #[schemars(description = "Lower bound on the robust standard deviation, as a fraction of |median|. Keeps near-constant series from flagging small steps")]
    #[serde(default = "default_outlier_floor_pct")]
    pub outlier_floor_pct: f64,

    #[serde(default = "default_completeness_weight")]
    pub completeness_weight: f64,

    #[serde(default = "default_mapping_weight")]
    pub mapping_weight: f64,

    #[schemars(description = "Points subtracted from the score per anomaly")]
    #[serde(default = "default_anomaly_penalty")]
    pub anomaly_penalty: f64,

    #[schemars(description = "Relative tolerance for total assets versus liabilities plus equity")]
    #[serde(default = "default_balance_tolerance")]
    pub balance_tolerance: f64,

    #[serde(default = "default_min_data_rows")]
    pub min_data_rows: usize,
}

fn default_required_accounts() -> BTreeMap<StatementType, Vec<AccountKey>> {
    use AccountKey::*;

    BTreeMap::from([
        (
            StatementType::BalanceSheet,
            vec![TotalAssets, TotalLiabilities, TotalEquity, CurrentAssets, CurrentLiabilities],
        ),
        (
            StatementType::IncomeStatement,
            vec![Revenue, CostOfGoodsSold, GrossProfit, OperatingIncome, NetIncome],
        ),
        (
            StatementType::CashFlowStatement,
            vec![OperatingCashFlow, InvestingCashFlow, FinancingCashFlow, NetChangeInCash],
        ),
    ])
}

fn default_non_negative_accounts() -> Vec<AccountKey> {
    use AccountKey::*;

    vec![
        Cash,
        ShortTermInvestments,
        AccountsReceivable,
        Inventory,
        PrepaidExpenses,
        CurrentAssets,
        PropertyPlantEquipment,
        Goodwill,
        IntangibleAssets,
        TotalAssets,
        AccountsPayable,
        AccruedLiabilities,
        ShortTermDebt,
        CurrentLiabilities,
        LongTermDebt,
        TotalLiabilities,
        Revenue,
    ]
}

fn default_outlier_multiplier() -> f64 {
    2.0
}

fn default_min_outlier_periods() -> usize {
    3
}

fn default_outlier_floor_pct() -> f64 {
    0.05
}

fn default_completeness_weight() -> f64 {
    0.6
}

fn default_mapping_weight() -> f64 {
    0.4
}

fn default_anomaly_penalty() -> f64 {
    5.0
}

fn default_balance_tolerance() -> f64 {
    0.01
}

fn default_min_data_rows() -> usize {
    3
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            required_accounts: default_required_accounts(),
            non_negative_accounts: default_non_negative_accounts(),
            outlier_multiplier: default_outlier_multiplier(),
            min_outlier_periods: default_min_outlier_periods(),
            outlier_floor_pct: default_outlier_floor_pct(),
            completeness_weight: default_completeness_weight(),
            mapping_weight: default_mapping_weight(),
            anomaly_penalty: default_anomaly_penalty(),
            balance_tolerance: default_balance_tolerance(),
            min_data_rows: default_min_data_rows(),
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("completeness_weight", self.completeness_weight),
            ("mapping_weight", self.mapping_weight),
            ("anomaly_penalty", self.anomaly_penalty),
            ("balance_tolerance", self.balance_tolerance),
            ("outlier_floor_pct", self.outlier_floor_pct),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalyzerError::config(
                    "quality",
                    format!("{} must be finite and non-negative, got {}", name, value),
                ));
            }
        }
        if self.completeness_weight + self.mapping_weight <= 0.0 {
            return Err(AnalyzerError::config(
                "quality",
                "completeness_weight and mapping_weight cannot both be zero",
            ));
        }
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier <= 0.0 {
            return Err(AnalyzerError::config(
                "quality",
                format!("outlier_multiplier must be positive, got {}", self.outlier_multiplier),
            ));
        }
        if self.min_outlier_periods < 3 {
            return Err(AnalyzerError::config(
                "quality",
                "min_outlier_periods must be at least 3",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    NegativeValue,
    Outlier { median: f64, std_dev: f64, deviations: f64 },
    BalanceMismatch { liabilities_and_equity: f64, difference: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub account: AccountKey,
    pub period: String,
    pub value: f64,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl Anomaly {
    pub fn describe(&self) -> String {
        match &self.kind {
            AnomalyKind::NegativeValue => format!(
                "{} is negative ({}) in {}",
                self.account.display_name(),
                self.value,
                self.period
            ),
            AnomalyKind::Outlier { median, deviations, .. } => format!(
                "{} in {} ({}) is {:.1} standard deviations from the median {}",
                self.account.display_name(),
                self.period,
                self.value,
                deviations,
                median
            ),
            AnomalyKind::BalanceMismatch {
                liabilities_and_equity,
                difference,
            } => format!(
                "Total assets ({}) differ from liabilities plus equity ({}) by {} in {}",
                self.value, liabilities_and_equity, difference, self.period
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub statement_type: StatementType,
    /// Non-null (expected account, period) pairs over all expected pairs.
    pub completeness: f64,
    pub expected_accounts: Vec<AccountKey>,
    /// Expected accounts with no value in any period.
    pub missing_accounts: Vec<AccountKey>,
    pub warnings: Vec<String>,
    pub anomalies: Vec<Anomaly>,
    pub mapped_rows: usize,
    pub unmapped_rows: usize,
    pub mapped_ratio: f64,
    pub invalid_cells: usize,
    pub structural_warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub score: f64,
}

pub struct QualityScorer<'a> {
    config: &'a QualityConfig,
    classifier: StatementClassifier<'a>,
}

impl<'a> QualityScorer<'a> {
    pub fn new(config: &'a QualityConfig, classification: &'a ClassificationConfig) -> Self {
        Self {
            config,
            classifier: StatementClassifier::new(classification),
        }
    }

    pub fn score(
        &self,
        table: &RawTable,
        record: &NormalizedRecord,
        unmapped: &[UnmappedRow],
    ) -> QualityReport {
        let classification = self.classifier.classify(record);
        self.score_classified(table, record, unmapped, &classification)
    }

    /// Same as [`score`](Self::score) with a classification computed by the caller.
    pub fn score_classified(
        &self,
        table: &RawTable,
        record: &NormalizedRecord,
        unmapped: &[UnmappedRow],
        classification: &Classification,
    ) -> QualityReport {
        let statement_type = classification.statement_type;
        let expected_accounts = match self.config.required_accounts.get(&statement_type) {
            Some(accounts) if statement_type != StatementType::Unknown => accounts.clone(),
            _ => record.accounts.keys().copied().collect(),
        };

        let (completeness, missing_accounts) = self.completeness(record, &expected_accounts);
        let warnings = missing_accounts
            .iter()
            .map(|a| format!("Missing required account: {}", a.display_name()))
            .collect();

        let mut anomalies = self.sign_violations(record);
        anomalies.extend(self.outliers(record));
        anomalies.extend(self.balance_mismatches(record));

        let mapped_rows = record.accounts.len();
        let unmapped_rows = unmapped.len();
        let mapped_ratio = if mapped_rows + unmapped_rows == 0 {
            0.0
        } else {
            mapped_rows as f64 / (mapped_rows + unmapped_rows) as f64
        };

        let weight_total = self.config.completeness_weight + self.config.mapping_weight;
        let weighted = (self.config.completeness_weight * completeness
            + self.config.mapping_weight * mapped_ratio)
            / weight_total;
        let score = (100.0 * weighted - self.config.anomaly_penalty * anomalies.len() as f64)
            .clamp(0.0, 100.0);

        let (structural_warnings, suggestions) =
            self.structure_notes(table, record, mapped_ratio, unmapped_rows);

        debug!(
            "Quality for {}: completeness {:.2}, mapped {:.2}, {} anomalies, score {:.1}",
            statement_type,
            completeness,
            mapped_ratio,
            anomalies.len(),
            score
        );

        QualityReport {
            statement_type,
            completeness,
            expected_accounts,
            missing_accounts,
            warnings,
            anomalies,
            mapped_rows,
            unmapped_rows,
            mapped_ratio,
            invalid_cells: record.invalid_cells.len(),
            structural_warnings,
            suggestions,
            score,
        }
    }

    fn completeness(
        &self,
        record: &NormalizedRecord,
        expected: &[AccountKey],
    ) -> (f64, Vec<AccountKey>) {
        let periods = record.period_count();
        let missing: Vec<AccountKey> = expected
            .iter()
            .copied()
            .filter(|a| !record.is_populated(*a))
            .collect();

        if expected.is_empty() || periods == 0 {
            return (0.0, missing);
        }
        let populated: usize = expected
            .iter()
            .map(|a| (0..periods).filter(|p| record.value(*a, *p).is_some()).count())
            .sum();
        (populated as f64 / (expected.len() * periods) as f64, missing)
    }

    fn sign_violations(&self, record: &NormalizedRecord) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        for account in &self.config.non_negative_accounts {
            for (period, label) in record.periods.iter().enumerate() {
                if let Some(value) = record.value(*account, period) {
                    if value < 0.0 {
                        anomalies.push(Anomaly {
                            account: *account,
                            period: label.clone(),
                            value,
                            kind: AnomalyKind::NegativeValue,
                        });
                    }
                }
            }
        }
        anomalies
    }

    fn outliers(&self, record: &NormalizedRecord) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        for (account, series) in &record.accounts {
            let points: Vec<(usize, f64)> = series
                .values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i, v)))
                .collect();
            if points.len() < self.config.min_outlier_periods {
                continue;
            }

            let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
            let Some(center) = median(&values) else {
                continue;
            };
            let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
            let mad = median(&deviations).unwrap_or(0.0);
            let std_dev = (MAD_TO_STD * mad)
                .max(self.config.outlier_floor_pct * center.abs())
                .max(STD_EPSILON);

            for (period, value) in points {
                let distance = (value - center).abs() / std_dev;
                if distance > self.config.outlier_multiplier {
                    anomalies.push(Anomaly {
                        account: *account,
                        period: record.periods[period].clone(),
                        value,
                        kind: AnomalyKind::Outlier {
                            median: center,
                            std_dev,
                            deviations: distance,
                        },
                    });
                }
            }
        }
        anomalies
    }

    fn balance_mismatches(&self, record: &NormalizedRecord) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        for (period, label) in record.periods.iter().enumerate() {
            let (Some(assets), Some(liabilities), Some(equity)) = (
                record.value(AccountKey::TotalAssets, period),
                record.value(AccountKey::TotalLiabilities, period),
                record.value(AccountKey::TotalEquity, period),
            ) else {
                continue;
            };
            let other_side = liabilities + equity;
            let difference = assets - other_side;
            let scale = assets.abs().max(other_side.abs()).max(STD_EPSILON);
            if difference.abs() / scale > self.config.balance_tolerance {
                anomalies.push(Anomaly {
                    account: AccountKey::TotalAssets,
                    period: label.clone(),
                    value: assets,
                    kind: AnomalyKind::BalanceMismatch {
                        liabilities_and_equity: other_side,
                        difference,
                    },
                });
            }
        }
        anomalies
    }

    fn structure_notes(
        &self,
        table: &RawTable,
        record: &NormalizedRecord,
        mapped_ratio: f64,
        unmapped_rows: usize,
    ) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();

        let data_rows = table.data_row_count();
        if data_rows < self.config.min_data_rows {
            warnings.push(format!(
                "Table has very few data rows ({} < {})",
                data_rows, self.config.min_data_rows
            ));
        }
        if table.column_count() < 2 {
            warnings.push("Table needs at least a label column and one period column".to_string());
        }
        if record.period_count() == 0 {
            warnings.push("No numeric period columns found; ratios cannot be computed".to_string());
        } else if record.period_count() == 1 {
            suggestions.push("Include multiple periods for averages and trend analysis".to_string());
        }
        if !record.invalid_cells.is_empty() {
            warnings.push(format!(
                "{} cells could not be read as numbers and were treated as missing",
                record.invalid_cells.len()
            ));
        }
        if record.accounts.is_empty() && data_rows > 0 {
            suggestions.push(
                "Ensure the first column (or a column headed 'Account') holds line-item names"
                    .to_string(),
            );
        } else if unmapped_rows > 0 && mapped_ratio < 0.5 {
            suggestions.push(
                "Most rows were not recognized; add custom aliases for your line-item names"
                    .to_string(),
            );
        }
        (warnings, suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn score(record: &NormalizedRecord, unmapped: &[UnmappedRow]) -> QualityReport {
        let quality = QualityConfig::default();
        let classification = ClassificationConfig::default();
        let table = RawTable::from_records(vec![
            vec!["Account", "2022", "2023"],
            vec!["a", "1", "1"],
            vec!["b", "1", "1"],
            vec!["c", "1", "1"],
        ]);
        QualityScorer::new(&quality, &classification).score(&table, record, unmapped)
    }

    #[test]
    fn test_completeness_with_missing_required_accounts() {
        let record = NormalizedRecord::new(periods(&["2022", "2023"]))
            .with_account(AccountKey::TotalAssets, vec![Some(100.0), Some(110.0)])
            .with_account(AccountKey::TotalLiabilities, vec![Some(60.0), Some(65.0)])
            .with_account(AccountKey::TotalEquity, vec![Some(40.0), Some(45.0)]);
        let report = score(&record, &[]);

        assert_eq!(report.statement_type, StatementType::BalanceSheet);
        assert!((report.completeness - 0.6).abs() < 1e-12);
        assert_eq!(
            report.missing_accounts,
            vec![AccountKey::CurrentAssets, AccountKey::CurrentLiabilities]
        );
        assert!(report.anomalies.is_empty());
        assert!((report.score - 76.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_value_is_flagged() {
        let record = NormalizedRecord::new(periods(&["2023"]))
            .with_account(AccountKey::Cash, vec![Some(-5.0)]);
        let report = score(&record, &[]);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].kind, AnomalyKind::NegativeValue);
    }

    #[test]
    fn test_spike_is_outlier_but_growth_is_not() {
        let record = NormalizedRecord::new(periods(&["2020", "2021", "2022", "2023"]))
            .with_account(AccountKey::Revenue, vec![Some(100.0), Some(110.0), Some(121.0), Some(133.1)])
            .with_account(AccountKey::NetIncome, vec![Some(10.0), Some(11.0), Some(10.5), Some(95.0)]);
        let report = score(&record, &[]);

        assert_eq!(report.anomalies.len(), 1);
        let anomaly = &report.anomalies[0];
        assert_eq!(anomaly.account, AccountKey::NetIncome);
        assert_eq!(anomaly.period, "2023");
        assert!(matches!(anomaly.kind, AnomalyKind::Outlier { .. }));
    }

    #[test]
    fn test_small_step_in_flat_series_is_not_outlier() {
        let record = NormalizedRecord::new(periods(&["2020", "2021", "2022", "2023"]))
            .with_account(
                AccountKey::CommonStock,
                vec![Some(1000.0), Some(1000.0), Some(1000.0), Some(1030.0)],
            );
        let report = score(&record, &[]);
        assert!(report.anomalies.is_empty(), "{:?}", report.anomalies);

        // With the floor disabled the same step is flagged.
        let quality = QualityConfig {
            outlier_floor_pct: 0.0,
            ..QualityConfig::default()
        };
        let classification = ClassificationConfig::default();
        let table = RawTable::from_records(vec![vec!["Account", "2023"]]);
        let strict = QualityScorer::new(&quality, &classification).score(&table, &record, &[]);
        assert!(strict
            .anomalies
            .iter()
            .any(|a| a.account == AccountKey::CommonStock && a.period == "2023"));
    }

    #[test]
    fn test_balance_mismatch() {
        let record = NormalizedRecord::new(periods(&["2023"]))
            .with_account(AccountKey::TotalAssets, vec![Some(100.0)])
            .with_account(AccountKey::TotalLiabilities, vec![Some(50.0)])
            .with_account(AccountKey::TotalEquity, vec![Some(30.0)]);
        let report = score(&record, &[]);
        assert!(report
            .anomalies
            .iter()
            .any(|a| matches!(a.kind, AnomalyKind::BalanceMismatch { .. })));
    }

    #[test]
    fn test_empty_input_scores_zero() {
        let quality = QualityConfig::default();
        let classification = ClassificationConfig::default();
        let report = QualityScorer::new(&quality, &classification).score(
            &RawTable::from_rows(Vec::new()),
            &NormalizedRecord::default(),
            &[],
        );
        assert_eq!(report.statement_type, StatementType::Unknown);
        assert_eq!(report.completeness, 0.0);
        assert_eq!(report.mapped_ratio, 0.0);
        assert_eq!(report.score, 0.0);
        assert!(!report.structural_warnings.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let config = QualityConfig {
            completeness_weight: 0.0,
            mapping_weight: 0.0,
            ..QualityConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(QualityConfig::default().validate().is_ok());
    }
}
