use crate::accounts::AccountKey;
use crate::record::NormalizedRecord;
use crate::utils::{mean, sample_std_dev};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Average percentage change inside this band (either side of zero) reads as flat.
const FLAT_BAND_PCT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodChange {
    pub from: String,
    pub to: String,
    pub absolute: f64,
    /// Undefined when the base value is zero.
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTrend {
    pub changes: Vec<PeriodChange>,
    pub average_change: f64,
    pub average_percentage_change: Option<f64>,
    pub direction: TrendDirection,
    /// Compound growth per period between the first and last values, when both are positive.
    /// Null periods in between still count towards the span.
    pub cagr: Option<f64>,
    /// Sample standard deviation over |mean|.
    pub coefficient_of_variation: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub accounts: BTreeMap<AccountKey, AccountTrend>,
}

impl TrendReport {
    pub fn get(&self, account: AccountKey) -> Option<&AccountTrend> {
        self.accounts.get(&account)
    }

    /// Accounts whose average percentage change is below `-threshold_pct`.
    pub fn declining(&self, threshold_pct: f64) -> Vec<AccountKey> {
        self.accounts
            .iter()
            .filter(|(_, t)| t.average_percentage_change.map_or(false, |p| p < -threshold_pct))
            .map(|(a, _)| *a)
            .collect()
    }

    pub fn improving(&self, threshold_pct: f64) -> Vec<AccountKey> {
        self.accounts
            .iter()
            .filter(|(_, t)| t.average_percentage_change.map_or(false, |p| p > threshold_pct))
            .map(|(a, _)| *a)
            .collect()
    }
}

pub fn compound_growth_rate(start: f64, end: f64, periods: usize) -> Option<f64> {
    if start <= 0.0 || end <= 0.0 || periods == 0 {
        return None;
    }
    Some((end / start).powf(1.0 / periods as f64) - 1.0)
}

/// Period-over-period movement of every account, in chronological order.
/// Changes are taken between consecutive non-null values.
pub fn analyze_trends(record: &NormalizedRecord) -> TrendReport {
    let order = record.chronological_order();
    let mut accounts = BTreeMap::new();

    for (account, series) in &record.accounts {
        // (chronological position, period index, value)
        let points: Vec<(usize, usize, f64)> = order
            .iter()
            .enumerate()
            .filter_map(|(pos, &i)| series.values.get(i).copied().flatten().map(|v| (pos, i, v)))
            .collect();
        if points.len() < 2 {
            continue;
        }

        let changes: Vec<PeriodChange> = points
            .windows(2)
            .map(|pair| {
                let (_, from_idx, from) = pair[0];
                let (_, to_idx, to) = pair[1];
                PeriodChange {
                    from: record.periods[from_idx].clone(),
                    to: record.periods[to_idx].clone(),
                    absolute: to - from,
                    percentage: (from != 0.0).then(|| (to - from) / from.abs() * 100.0),
                }
            })
            .collect();

        let absolutes: Vec<f64> = changes.iter().map(|c| c.absolute).collect();
        let percentages: Vec<f64> = changes.iter().filter_map(|c| c.percentage).collect();
        let average_change = mean(&absolutes).unwrap_or(0.0);
        let average_percentage_change = mean(&percentages);

        let direction = match average_percentage_change {
            Some(p) if p > FLAT_BAND_PCT => TrendDirection::Increasing,
            Some(p) if p < -FLAT_BAND_PCT => TrendDirection::Decreasing,
            Some(_) => TrendDirection::Flat,
            None if average_change > 0.0 => TrendDirection::Increasing,
            None if average_change < 0.0 => TrendDirection::Decreasing,
            None => TrendDirection::Flat,
        };

        let values: Vec<f64> = points.iter().map(|(_, _, v)| *v).collect();
        let (first_pos, _, first) = points[0];
        let (last_pos, _, last) = points[points.len() - 1];
        let coefficient_of_variation = match (sample_std_dev(&values), mean(&values)) {
            (Some(sd), Some(m)) if m != 0.0 => Some(sd / m.abs()),
            _ => None,
        };

        accounts.insert(
            *account,
            AccountTrend {
                changes,
                average_change,
                average_percentage_change,
                direction,
                cagr: compound_growth_rate(first, last, last_pos - first_pos),
                coefficient_of_variation,
            },
        );
    }

    TrendReport { accounts }
}
