use crate::accounts::{AccountKey, StatementType};
use crate::error::{AnalyzerError, Result};
use crate::record::NormalizedRecord;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignatureAccount {
    pub account: AccountKey,
    #[schemars(description = "Relative weight of this account as evidence for the statement type")]
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationConfig {
    #[schemars(description = "Weighted signature accounts per statement type")]
    #[serde(default = "default_signatures")]
    pub signatures: BTreeMap<StatementType, Vec<SignatureAccount>>,

    #[schemars(description = "Top two scores closer than this are a tie and classify as Unknown")]
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,

    #[schemars(description = "Best scores below this floor classify as Unknown")]
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,
}

fn signature(pairs: &[(AccountKey, f64)]) -> Vec<SignatureAccount> {
    pairs
        .iter()
        .map(|(account, weight)| SignatureAccount {
            account: *account,
            weight: *weight,
        })
        .collect()
}

fn default_signatures() -> BTreeMap<StatementType, Vec<SignatureAccount>> {
    use AccountKey::*;

    let mut signatures = BTreeMap::new();
    signatures.insert(
        StatementType::BalanceSheet,
        signature(&[
            (TotalAssets, 3.0),
            (TotalLiabilities, 3.0),
            (TotalEquity, 3.0),
            (CurrentAssets, 2.0),
            (CurrentLiabilities, 2.0),
            (Cash, 1.0),
            (AccountsReceivable, 0.5),
            (Inventory, 0.5),
            (AccountsPayable, 0.5),
            (RetainedEarnings, 0.5),
        ]),
    );
    signatures.insert(
        StatementType::IncomeStatement,
        signature(&[
            (Revenue, 3.0),
            (NetIncome, 3.0),
            (CostOfGoodsSold, 2.0),
            (GrossProfit, 2.0),
            (OperatingIncome, 2.0),
            (OperatingExpenses, 1.0),
            (IncomeTaxExpense, 0.5),
            (InterestExpense, 0.5),
        ]),
    );
    signatures.insert(
        StatementType::CashFlowStatement,
        signature(&[
            (OperatingCashFlow, 3.0),
            (InvestingCashFlow, 3.0),
            (FinancingCashFlow, 3.0),
            (CapitalExpenditures, 1.0),
            (NetChangeInCash, 1.0),
            (DividendsPaid, 0.5),
            (DepreciationAmortization, 0.5),
        ]),
    );
    signatures
}

fn default_tie_epsilon() -> f64 {
    0.05
}

fn default_confidence_floor() -> f64 {
    0.3
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            signatures: default_signatures(),
            tie_epsilon: default_tie_epsilon(),
            confidence_floor: default_confidence_floor(),
        }
    }
}

impl ClassificationConfig {
    pub fn validate(&self) -> Result<()> {
        for statement in StatementType::KNOWN {
            let accounts = self.signatures.get(&statement).ok_or_else(|| {
                AnalyzerError::config(
                    "classification",
                    format!("no signature accounts for {}", statement),
                )
            })?;
            let mut total = 0.0;
            for sig in accounts {
                if !sig.weight.is_finite() || sig.weight < 0.0 {
                    return Err(AnalyzerError::config(
                        "classification",
                        format!("weight {} for {} in {} must be finite and non-negative", sig.weight, sig.account, statement),
                    ));
                }
                total += sig.weight;
            }
            if total <= 0.0 {
                return Err(AnalyzerError::config(
                    "classification",
                    format!("signature weights for {} sum to zero", statement),
                ));
            }
        }
        if self.signatures.contains_key(&StatementType::Unknown) {
            return Err(AnalyzerError::config(
                "classification",
                "Unknown cannot carry signature accounts",
            ));
        }
        for (name, value) in [
            ("tie_epsilon", self.tie_epsilon),
            ("confidence_floor", self.confidence_floor),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AnalyzerError::config(
                    "classification",
                    format!("{} must lie in [0, 1], got {}", name, value),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Classification {
    pub statement_type: StatementType,
    #[schemars(description = "Normalized signature score of the chosen type, in [0, 1]")]
    pub confidence: f64,
    /// Signature accounts of the winning type found in the record (all types' hits when Unknown).
    pub matched_accounts: Vec<AccountKey>,
    pub scores: BTreeMap<StatementType, f64>,
}

pub struct StatementClassifier<'a> {
    config: &'a ClassificationConfig,
}

impl<'a> StatementClassifier<'a> {
    pub fn new(config: &'a ClassificationConfig) -> Self {
        Self { config }
    }

    fn score(&self, record: &NormalizedRecord, statement: StatementType) -> (f64, Vec<AccountKey>) {
        let accounts = match self.config.signatures.get(&statement) {
            Some(accounts) => accounts,
            None => return (0.0, Vec::new()),
        };
        let max: f64 = accounts.iter().map(|s| s.weight).sum();
        if max <= 0.0 {
            return (0.0, Vec::new());
        }

        let mut present = 0.0;
        let mut matched = Vec::new();
        for sig in accounts {
            if record.is_populated(sig.account) {
                present += sig.weight;
                matched.push(sig.account);
            }
        }
        matched.sort();
        (present / max, matched)
    }

    /// Infers the statement type from which signature accounts carry data. Only account
    /// presence matters, so the result does not depend on row order.
    pub fn classify(&self, record: &NormalizedRecord) -> Classification {
        let mut scores = BTreeMap::new();
        let mut hits: BTreeMap<StatementType, Vec<AccountKey>> = BTreeMap::new();
        for statement in StatementType::KNOWN {
            let (score, matched) = self.score(record, statement);
            scores.insert(statement, score);
            hits.insert(statement, matched);
        }

        let mut ranked: Vec<(StatementType, f64)> = scores.iter().map(|(s, v)| (*s, *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let (best_type, best_score) = ranked[0];
        let runner_up = ranked.get(1).map(|(_, s)| *s).unwrap_or(0.0);

        let is_tie = best_score - runner_up < self.config.tie_epsilon;
        let statement_type = if best_score < self.config.confidence_floor || is_tie {
            StatementType::Unknown
        } else {
            best_type
        };

        let matched_accounts = if statement_type == StatementType::Unknown {
            let mut all: Vec<AccountKey> = hits.into_values().flatten().collect();
            all.sort();
            all.dedup();
            all
        } else {
            hits.remove(&statement_type).unwrap_or_default()
        };

        debug!(
            "Classified record as {} (confidence {:.3}, scores {:?})",
            statement_type, best_score, scores
        );

        Classification {
            statement_type,
            confidence: best_score,
            matched_accounts,
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(accounts: &[AccountKey]) -> NormalizedRecord {
        accounts.iter().fold(
            NormalizedRecord::new(vec!["2023".to_string()]),
            |record, account| record.with_account(*account, vec![Some(1.0)]),
        )
    }

    #[test]
    fn test_income_statement_confidence() {
        let config = ClassificationConfig::default();
        let classifier = StatementClassifier::new(&config);
        let result = classifier.classify(&record(&[
            AccountKey::Revenue,
            AccountKey::CostOfGoodsSold,
            AccountKey::GrossProfit,
            AccountKey::OperatingIncome,
            AccountKey::NetIncome,
        ]));
        assert_eq!(result.statement_type, StatementType::IncomeStatement);
        assert!(result.confidence > 0.8);
        assert_eq!(result.matched_accounts.len(), 5);
    }

    #[test]
    fn test_balance_sheet() {
        let config = ClassificationConfig::default();
        let classifier = StatementClassifier::new(&config);
        let result = classifier.classify(&record(&[
            AccountKey::TotalAssets,
            AccountKey::TotalLiabilities,
            AccountKey::TotalEquity,
        ]));
        assert_eq!(result.statement_type, StatementType::BalanceSheet);
        assert!((result.confidence - 9.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_tie_is_unknown() {
        let config = ClassificationConfig::default();
        let classifier = StatementClassifier::new(&config);
        let result = classifier.classify(&record(&[
            AccountKey::TotalAssets,
            AccountKey::TotalLiabilities,
            AccountKey::TotalEquity,
            AccountKey::CurrentAssets,
            AccountKey::CurrentLiabilities,
            AccountKey::Cash,
            AccountKey::Revenue,
            AccountKey::NetIncome,
            AccountKey::CostOfGoodsSold,
            AccountKey::GrossProfit,
            AccountKey::OperatingIncome,
        ]));
        assert_eq!(result.statement_type, StatementType::Unknown);
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_empty_record_is_unknown() {
        let config = ClassificationConfig::default();
        let classifier = StatementClassifier::new(&config);
        let result = classifier.classify(&NormalizedRecord::default());
        assert_eq!(result.statement_type, StatementType::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert!(result.matched_accounts.is_empty());
    }

    #[test]
    fn test_null_only_accounts_do_not_count() {
        let config = ClassificationConfig::default();
        let classifier = StatementClassifier::new(&config);
        let record = NormalizedRecord::new(vec!["2023".to_string()])
            .with_account(AccountKey::OperatingCashFlow, vec![None]);
        assert_eq!(classifier.classify(&record).statement_type, StatementType::Unknown);
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = ClassificationConfig::default();
        config
            .signatures
            .get_mut(&StatementType::BalanceSheet)
            .unwrap()[0]
            .weight = -1.0;
        assert!(config.validate().is_err());
        assert!(ClassificationConfig::default().validate().is_ok());
    }
}
