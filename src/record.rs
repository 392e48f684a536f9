use crate::accounts::AccountKey;
use crate::utils::chronological_order;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a raw label was resolved onto its canonical account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    /// The normalized label equals a known alias.
    Exact,
    /// Token-overlap similarity above the configured threshold.
    Fuzzy { score: f64 },
    /// Matched only after prefixing the enclosing section header (e.g. "Total" under "Current Assets").
    SectionContext { section: String, score: f64 },
    /// Constructed programmatically rather than read from a table.
    Provided,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSeries {
    /// One entry per period, aligned with `NormalizedRecord::periods`.
    pub values: Vec<Option<f64>>,
    pub source_label: String,
    pub source_row: Option<usize>,
    pub match_kind: MatchKind,
}

/// A period cell that held text which could not be read as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidCell {
    pub account: AccountKey,
    pub period: String,
    pub row_index: usize,
    pub raw: String,
}

/// Canonical accounts × periods. Period order is the input column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub periods: Vec<String>,
    pub accounts: BTreeMap<AccountKey, AccountSeries>,
    #[serde(default)]
    pub invalid_cells: Vec<InvalidCell>,
}

impl NormalizedRecord {
    pub fn new(periods: Vec<String>) -> Self {
        Self {
            periods,
            accounts: BTreeMap::new(),
            invalid_cells: Vec::new(),
        }
    }

    /// Builder used by callers that already hold canonical data.
    pub fn with_account(mut self, account: AccountKey, values: Vec<Option<f64>>) -> Self {
        self.insert(
            account,
            AccountSeries {
                values,
                source_label: account.display_name().to_string(),
                source_row: None,
                match_kind: MatchKind::Provided,
            },
        );
        self
    }

    /// Inserts a series, padding or truncating its values to the period count.
    /// Returns false (and leaves the record untouched) if the account is already present.
    pub fn insert(&mut self, account: AccountKey, mut series: AccountSeries) -> bool {
        if self.accounts.contains_key(&account) {
            return false;
        }
        series.values.resize(self.periods.len(), None);
        self.accounts.insert(account, series);
        true
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn period_index(&self, label: &str) -> Option<usize> {
        self.periods.iter().position(|p| p == label)
    }

    pub fn series(&self, account: AccountKey) -> Option<&AccountSeries> {
        self.accounts.get(&account)
    }

    pub fn value(&self, account: AccountKey, period: usize) -> Option<f64> {
        self.accounts
            .get(&account)
            .and_then(|s| s.values.get(period).copied().flatten())
    }

    pub fn value_for(&self, account: AccountKey, period_label: &str) -> Option<f64> {
        self.period_index(period_label)
            .and_then(|idx| self.value(account, idx))
    }

    /// True when the account holds at least one non-null value.
    pub fn is_populated(&self, account: AccountKey) -> bool {
        self.accounts
            .get(&account)
            .map(|s| s.values.iter().any(Option::is_some))
            .unwrap_or(false)
    }

    pub fn populated_accounts(&self) -> Vec<AccountKey> {
        self.accounts
            .keys()
            .copied()
            .filter(|a| self.is_populated(*a))
            .collect()
    }

    pub fn populated_cells(&self) -> usize {
        self.accounts
            .values()
            .map(|s| s.values.iter().filter(|v| v.is_some()).count())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_cells() == 0
    }

    pub fn chronological_order(&self) -> Vec<usize> {
        chronological_order(&self.periods)
    }

    /// For each period index, the index of the chronologically preceding period.
    pub fn previous_periods(&self) -> Vec<Option<usize>> {
        let order = self.chronological_order();
        let mut previous = vec![None; self.periods.len()];
        for pair in order.windows(2) {
            previous[pair[1]] = Some(pair[0]);
        }
        previous
    }

    /// Combines two statements of the same entity so cross-statement ratios can be
    /// computed. Periods are aligned by label: this record's periods first, then any
    /// new labels from `other`. Accounts present in both keep this record's series.
    pub fn merge(&self, other: &NormalizedRecord) -> NormalizedRecord {
        let mut periods = self.periods.clone();
        for label in &other.periods {
            if !periods.contains(label) {
                periods.push(label.clone());
            }
        }

        let mut merged = NormalizedRecord::new(periods);
        for source in [self, other] {
            for (account, series) in &source.accounts {
                if merged.accounts.contains_key(account) {
                    debug!(
                        "Merge conflict on {}: keeping the first statement's values",
                        account
                    );
                    continue;
                }
                let mut values = vec![None; merged.periods.len()];
                for (idx, label) in source.periods.iter().enumerate() {
                    if let Some(target) = merged.period_index(label) {
                        values[target] = series.values.get(idx).copied().flatten();
                    }
                }
                merged.insert(
                    *account,
                    AccountSeries {
                        values,
                        ..series.clone()
                    },
                );
            }
            merged
                .invalid_cells
                .extend(source.invalid_cells.iter().cloned());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_aligns_values_and_rejects_duplicates() {
        let mut record = NormalizedRecord::new(periods(&["2022", "2023"]));
        let series = AccountSeries {
            values: vec![Some(1.0)],
            source_label: "Cash".to_string(),
            source_row: Some(0),
            match_kind: MatchKind::Exact,
        };
        assert!(record.insert(AccountKey::Cash, series.clone()));
        assert!(!record.insert(AccountKey::Cash, series));
        assert_eq!(record.series(AccountKey::Cash).unwrap().values.len(), 2);
        assert_eq!(record.value(AccountKey::Cash, 1), None);
    }

    #[test]
    fn test_previous_periods_follow_dates() {
        let record = NormalizedRecord::new(periods(&["2023", "2022", "2021"]));
        assert_eq!(record.previous_periods(), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_merge_aligns_by_label() {
        let balance = NormalizedRecord::new(periods(&["2022", "2023"]))
            .with_account(AccountKey::TotalAssets, vec![Some(100.0), Some(120.0)]);
        let income = NormalizedRecord::new(periods(&["2023", "2024"]))
            .with_account(AccountKey::NetIncome, vec![Some(12.0), Some(15.0)])
            .with_account(AccountKey::TotalAssets, vec![Some(999.0), Some(999.0)]);

        let merged = balance.merge(&income);
        assert_eq!(merged.periods, periods(&["2022", "2023", "2024"]));
        assert_eq!(merged.value_for(AccountKey::NetIncome, "2023"), Some(12.0));
        assert_eq!(merged.value_for(AccountKey::NetIncome, "2022"), None);
        assert_eq!(merged.value_for(AccountKey::TotalAssets, "2023"), Some(120.0));
        assert_eq!(merged.value_for(AccountKey::TotalAssets, "2024"), None);
    }

    #[test]
    fn test_populated_cells() {
        let record = NormalizedRecord::new(periods(&["2023", "2024"]))
            .with_account(AccountKey::Revenue, vec![Some(1.0), None])
            .with_account(AccountKey::NetIncome, vec![None, None]);
        assert_eq!(record.populated_cells(), 1);
        assert!(record.is_populated(AccountKey::Revenue));
        assert!(!record.is_populated(AccountKey::NetIncome));
        assert_eq!(record.populated_accounts(), vec![AccountKey::Revenue]);
    }
}
