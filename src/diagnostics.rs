use crate::accounts::AccountKey;
use crate::record::NormalizedRecord;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuPontBreakdown {
    pub period: String,
    /// Net income over revenue, in percent.
    pub net_margin: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub equity_multiplier: Option<f64>,
    /// ROE rebuilt from the three components, in percent.
    pub roe_from_components: Option<f64>,
    /// ROE computed directly as net income over equity, in percent.
    pub roe_direct: Option<f64>,
}

fn divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d).filter(|v| v.is_finite()),
        _ => None,
    }
}

pub fn dupont_analysis(record: &NormalizedRecord) -> Vec<DuPontBreakdown> {
    record
        .chronological_order()
        .into_iter()
        .map(|p| {
            let net_income = record.value(AccountKey::NetIncome, p);
            let revenue = record.value(AccountKey::Revenue, p);
            let assets = record.value(AccountKey::TotalAssets, p);
            let equity = record.value(AccountKey::TotalEquity, p);

            let net_margin = divide(net_income, revenue).map(|v| v * 100.0);
            let asset_turnover = divide(revenue, assets);
            let equity_multiplier = divide(assets, equity);
            let roe_from_components = match (net_margin, asset_turnover, equity_multiplier) {
                (Some(m), Some(t), Some(e)) => Some(m * t * e),
                _ => None,
            };

            DuPontBreakdown {
                period: record.periods[p].clone(),
                net_margin,
                asset_turnover,
                equity_multiplier,
                roe_from_components,
                roe_direct: divide(net_income, equity).map(|v| v * 100.0),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ZScoreZone {
    Safe,
    Grey,
    Distress,
}

impl ZScoreZone {
    pub fn from_score(score: f64) -> Self {
        if score > 2.99 {
            ZScoreZone::Safe
        } else if score > 1.8 {
            ZScoreZone::Grey
        } else {
            ZScoreZone::Distress
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltmanZScore {
    pub period: String,
    pub score: f64,
    pub zone: ZScoreZone,
    /// Inputs that were substituted because the proper account was missing.
    pub substitutions: Vec<String>,
}

/// Altman Z approximation for the latest period that has the core inputs. Book equity
/// stands in for market value; missing retained earnings and EBIT fall back to income lines.
pub fn altman_z_score(record: &NormalizedRecord) -> Option<AltmanZScore> {
    record
        .chronological_order()
        .into_iter()
        .rev()
        .find_map(|p| z_score_for_period(record, p))
}

fn z_score_for_period(record: &NormalizedRecord, p: usize) -> Option<AltmanZScore> {
    let value = |account| record.value(account, p);
    let mut substitutions = Vec::new();

    let total_assets = value(AccountKey::TotalAssets).filter(|v| *v != 0.0)?;
    let current_assets = value(AccountKey::CurrentAssets)?;
    let current_liabilities = value(AccountKey::CurrentLiabilities)?;
    let total_equity = value(AccountKey::TotalEquity)?;
    let revenue = value(AccountKey::Revenue)?;

    let retained_earnings = match value(AccountKey::RetainedEarnings) {
        Some(v) => v,
        None => {
            substitutions.push("retained earnings approximated by net income".to_string());
            value(AccountKey::NetIncome)?
        }
    };
    let ebit = match value(AccountKey::OperatingIncome) {
        Some(v) => v,
        None => {
            substitutions.push("EBIT approximated by net income".to_string());
            value(AccountKey::NetIncome)?
        }
    };
    let total_liabilities = match value(AccountKey::TotalLiabilities) {
        Some(v) => v,
        None => {
            substitutions.push("total liabilities derived as assets minus equity".to_string());
            total_assets - total_equity
        }
    };
    if total_liabilities == 0.0 {
        return None;
    }

    let x1 = (current_assets - current_liabilities) / total_assets;
    let x2 = retained_earnings / total_assets;
    let x3 = ebit / total_assets;
    let x4 = total_equity / total_liabilities;
    let x5 = revenue / total_assets;
    let score = 1.2 * x1 + 1.4 * x2 + 3.3 * x3 + 0.6 * x4 + 1.0 * x5;
    if !score.is_finite() {
        return None;
    }

    Some(AltmanZScore {
        period: record.periods[p].clone(),
        score,
        zone: ZScoreZone::from_score(score),
        substitutions,
    })
}
