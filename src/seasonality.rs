use crate::accounts::AccountKey;
use crate::error::{AnalyzerError, Result};
use crate::record::NormalizedRecord;
use crate::utils::{mean, parse_period_label};
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A season whose average strays further than this from the mean of all season
/// averages marks the series as seasonal.
const SEASONALITY_THRESHOLD_PCT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityProfile {
    pub periods_per_year: usize,
    pub has_seasonality: bool,
    /// Largest deviation of a season average from the mean of season averages, in percent.
    pub seasonal_strength: f64,
    /// 1-based season (quarter, half or month) with the highest average.
    pub peak_period: Option<usize>,
    pub trough_period: Option<usize>,
    /// Season averages scaled to sum to 1. Empty when there is not enough history.
    pub weights: Vec<f64>,
}

impl SeasonalityProfile {
    fn none(periods_per_year: usize) -> Self {
        Self {
            periods_per_year,
            has_seasonality: false,
            seasonal_strength: 0.0,
            peak_period: None,
            trough_period: None,
            weights: Vec::new(),
        }
    }
}

/// Looks for a repeating within-year pattern. `values` are chronological and the first
/// one belongs to season 1. At least two full years are needed.
pub fn detect_seasonality(values: &[f64], periods_per_year: usize) -> Result<SeasonalityProfile> {
    detect_from_season(values, periods_per_year, 0)
}

fn detect_from_season(
    values: &[f64],
    periods_per_year: usize,
    first_season: usize,
) -> Result<SeasonalityProfile> {
    if periods_per_year < 2 {
        return Err(AnalyzerError::InvalidSeasonality(format!(
            "periods_per_year must be at least 2, got {}",
            periods_per_year
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AnalyzerError::InvalidSeasonality(
            "values must be finite".to_string(),
        ));
    }

    let mut profile = SeasonalityProfile::none(periods_per_year);
    if values.len() < periods_per_year * 2 {
        return Ok(profile);
    }

    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); periods_per_year];
    for (i, value) in values.iter().enumerate() {
        buckets[(first_season + i) % periods_per_year].push(*value);
    }
    let averages: Vec<f64> = buckets.iter().map(|b| mean(b).unwrap_or(0.0)).collect();

    let overall = mean(&averages).unwrap_or(0.0);
    if overall == 0.0 {
        return Ok(profile);
    }

    let variations: Vec<f64> = averages
        .iter()
        .map(|avg| (avg - overall) / overall.abs() * 100.0)
        .collect();
    let strength = variations.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

    profile.weights = normalize_weights(&averages);
    if strength > SEASONALITY_THRESHOLD_PCT {
        profile.has_seasonality = true;
        profile.seasonal_strength = strength;
        profile.peak_period = extreme_season(&variations, |a, b| a > b);
        profile.trough_period = extreme_season(&variations, |a, b| a < b);
    }
    Ok(profile)
}

fn extreme_season(variations: &[f64], better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in variations.iter().enumerate() {
        match best {
            Some((_, current)) if !better(*v, current) => {}
            _ => best = Some((i, *v)),
        }
    }
    best.map(|(i, _)| i + 1)
}

fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 {
        return weights.to_vec();
    }
    weights.iter().map(|w| w / sum).collect()
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Months between consecutive periods, when every label parses and the spacing is a
/// regular quarter, half-year or month.
fn period_spacing(record: &NormalizedRecord) -> Option<(u32, Vec<NaiveDate>)> {
    let mut dates: Vec<NaiveDate> = record
        .periods
        .iter()
        .map(|p| parse_period_label(p))
        .collect::<Option<_>>()?;
    dates.sort();
    let first_gap = month_index(*dates.get(1)?) - month_index(dates[0]);
    let regular = dates
        .windows(2)
        .all(|pair| month_index(pair[1]) - month_index(pair[0]) == first_gap);
    match first_gap {
        1 | 3 | 6 if regular => Some((first_gap as u32, dates)),
        _ => None,
    }
}

/// Number of periods per year implied by the record's period labels. `None` for annual
/// data, irregular spacing, or labels that are not dates.
pub fn periods_per_year(record: &NormalizedRecord) -> Option<usize> {
    period_spacing(record).map(|(gap, _)| (12 / gap) as usize)
}

/// Seasonality of every account with a complete series. Seasons follow the calendar:
/// a record starting in Q3 puts its first value in season 3.
pub fn seasonality_by_account(record: &NormalizedRecord) -> BTreeMap<AccountKey, SeasonalityProfile> {
    let mut profiles = BTreeMap::new();
    let Some((gap, dates)) = period_spacing(record) else {
        return profiles;
    };
    let per_year = (12 / gap) as usize;
    let first_season = (dates[0].month0() / gap) as usize;
    let order = record.chronological_order();

    for (account, series) in &record.accounts {
        let values: Option<Vec<f64>> = order
            .iter()
            .map(|&i| series.values.get(i).copied().flatten())
            .collect();
        let Some(values) = values else {
            debug!("Skipping seasonality for {}: series has gaps", account);
            continue;
        };
        if let Ok(profile) = detect_from_season(&values, per_year, first_season) {
            profiles.insert(*account, profile);
        }
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarterly_peak_is_detected() {
        let values = [80.0, 90.0, 100.0, 150.0, 84.0, 95.0, 105.0, 160.0];
        let profile = detect_seasonality(&values, 4).unwrap();
        assert!(profile.has_seasonality);
        assert_eq!(profile.peak_period, Some(4));
        assert_eq!(profile.trough_period, Some(1));
        assert!(profile.seasonal_strength > 40.0);
        let sum: f64 = profile.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_flat_series_is_not_seasonal() {
        let values = [100.0, 101.0, 99.0, 100.0, 102.0, 100.0, 98.0, 101.0];
        let profile = detect_seasonality(&values, 4).unwrap();
        assert!(!profile.has_seasonality);
        assert_eq!(profile.peak_period, None);
        assert_eq!(profile.weights.len(), 4);
    }

    #[test]
    fn test_short_history_is_not_seasonal() {
        let profile = detect_seasonality(&[1.0, 5.0, 1.0, 5.0, 1.0], 4).unwrap();
        assert!(!profile.has_seasonality);
        assert!(profile.weights.is_empty());
    }

    #[test]
    fn test_invalid_periods_per_year() {
        assert!(matches!(
            detect_seasonality(&[1.0, 2.0], 1),
            Err(AnalyzerError::InvalidSeasonality(_))
        ));
        assert!(detect_seasonality(&[f64::NAN; 8], 4).is_err());
    }

    #[test]
    fn test_periods_per_year_from_labels() {
        let quarterly = NormalizedRecord::new(
            ["Q1 2023", "Q2 2023", "Q3 2023", "Q4 2023"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(periods_per_year(&quarterly), Some(4));

        let annual = NormalizedRecord::new(vec!["2022".to_string(), "2023".to_string()]);
        assert_eq!(periods_per_year(&annual), None);
    }

    #[test]
    fn test_record_seasons_follow_calendar() {
        let periods: Vec<String> = [
            "Q3 2022", "Q4 2022", "Q1 2023", "Q2 2023", "Q3 2023", "Q4 2023", "Q1 2024", "Q2 2024",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let record = NormalizedRecord::new(periods)
            .with_account(
                AccountKey::Revenue,
                vec![100.0, 150.0, 80.0, 90.0, 105.0, 160.0, 84.0, 95.0]
                    .into_iter()
                    .map(Some)
                    .collect(),
            )
            .with_account(AccountKey::Cash, vec![Some(1.0), None]);

        let profiles = seasonality_by_account(&record);
        let revenue = &profiles[&AccountKey::Revenue];
        assert_eq!(revenue.periods_per_year, 4);
        assert_eq!(revenue.peak_period, Some(4));
        assert_eq!(revenue.trough_period, Some(1));
        assert!(!profiles.contains_key(&AccountKey::Cash));
    }
}
