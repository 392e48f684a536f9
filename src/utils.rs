use chrono::{Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

const FULL_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%Y/%m/%d",
];

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Interprets a period column header as the date the period ends on.
///
/// Accepted shapes include `2023`, `FY2023`, `FY 23`, `2023-12-31`, `12/31/2023`,
/// `Dec 31, 2023`, `Q3 2023`, `2023-Q3`, `H1 2024`, `Mar 2023` and `2023-03`.
/// A trailing duplicate marker such as ` (2)` is ignored, so `2023 (2)` is `2023`.
/// Returns `None` for anything else; callers then fall back to column order.
pub fn parse_period_label(label: &str) -> Option<NaiveDate> {
    let trimmed = strip_duplicate_suffix(label.trim());
    if trimmed.is_empty() {
        return None;
    }

    for format in FULL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    let lower = trimmed.to_lowercase();
    let lower = lower
        .strip_prefix("fy")
        .or_else(|| lower.strip_prefix("ye"))
        .unwrap_or(&lower);

    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [year] => parse_year(year, label_had_fiscal_prefix(trimmed))
            .and_then(|y| last_day_of_month(y, 12)),
        [a, b] => parse_year_and_sub_period(a, b).or_else(|| parse_year_and_sub_period(b, a)),
        _ => None,
    }
}

/// Drops the ` (N)` counter added to repeated column headers. Four-digit years in
/// parentheses are kept.
fn strip_duplicate_suffix(label: &str) -> &str {
    let Some(open) = label.rfind(" (") else {
        return label;
    };
    let Some(counter) = label[open + 2..].strip_suffix(')') else {
        return label;
    };
    if (1..=3).contains(&counter.len()) && counter.chars().all(|c| c.is_ascii_digit()) {
        label[..open].trim_end()
    } else {
        label
    }
}

fn label_had_fiscal_prefix(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.starts_with("fy") || lower.starts_with("ye")
}

fn parse_year(token: &str, allow_two_digits: bool) -> Option<i32> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = match token.len() {
        4 => token.parse::<i32>().ok()?,
        2 if allow_two_digits => 2000 + token.parse::<i32>().ok()?,
        _ => return None,
    };
    (1900..=2100).contains(&year).then_some(year)
}

fn parse_year_and_sub_period(year_token: &str, sub_token: &str) -> Option<NaiveDate> {
    let year = parse_year(year_token, false)?;

    let month = if let Some(q) = sub_token.strip_prefix('q') {
        match q.parse::<u32>().ok()? {
            n @ 1..=4 => n * 3,
            _ => return None,
        }
    } else if let Some(h) = sub_token.strip_prefix('h') {
        match h.parse::<u32>().ok()? {
            1 => 6,
            2 => 12,
            _ => return None,
        }
    } else if sub_token.chars().all(|c| c.is_ascii_digit()) {
        match sub_token.parse::<u32>().ok()? {
            n @ 1..=12 => n,
            _ => return None,
        }
    } else {
        let prefix = sub_token.get(..3)?;
        MONTH_NAMES.iter().position(|m| *m == prefix)? as u32 + 1
    };

    last_day_of_month(year, month)
}

/// Indices of `periods` in chronological order.
///
/// When every label parses as a date the parsed dates decide; ties keep column order.
/// Otherwise the column order itself is taken as chronological.
pub fn chronological_order(periods: &[String]) -> Vec<usize> {
    let identity: Vec<usize> = (0..periods.len()).collect();
    if periods.len() < 2 {
        return identity;
    }

    let parsed: Option<Vec<NaiveDate>> = periods.iter().map(|p| parse_period_label(p)).collect();
    match parsed {
        Some(dates) => {
            let mut order = identity;
            order.sort_by_key(|&i| dates[i]);
            order
        }
        None => identity,
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1 denominator). Needs at least two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2023, 2), Some(date(2023, 2, 28)));
        assert_eq!(last_day_of_month(2024, 2), Some(date(2024, 2, 29)));
        assert_eq!(last_day_of_month(2023, 12), Some(date(2023, 12, 31)));
        assert_eq!(last_day_of_month(2023, 13), None);
    }

    #[test]
    fn test_parse_year_labels() {
        assert_eq!(parse_period_label("2023"), Some(date(2023, 12, 31)));
        assert_eq!(parse_period_label("FY2022"), Some(date(2022, 12, 31)));
        assert_eq!(parse_period_label("FY 21"), Some(date(2021, 12, 31)));
        assert_eq!(parse_period_label("23"), None);
    }

    #[test]
    fn test_parse_full_dates() {
        assert_eq!(parse_period_label("2023-06-30"), Some(date(2023, 6, 30)));
        assert_eq!(parse_period_label("12/31/2022"), Some(date(2022, 12, 31)));
        assert_eq!(parse_period_label("Dec 31, 2021"), Some(date(2021, 12, 31)));
    }

    #[test]
    fn test_parse_sub_periods() {
        assert_eq!(parse_period_label("Q3 2023"), Some(date(2023, 9, 30)));
        assert_eq!(parse_period_label("2023-Q1"), Some(date(2023, 3, 31)));
        assert_eq!(parse_period_label("H1 2024"), Some(date(2024, 6, 30)));
        assert_eq!(parse_period_label("Mar 2023"), Some(date(2023, 3, 31)));
        assert_eq!(parse_period_label("2023-02"), Some(date(2023, 2, 28)));
        assert_eq!(parse_period_label("Q5 2023"), None);
        assert_eq!(parse_period_label("Amount"), None);
    }

    #[test]
    fn test_duplicate_header_suffix_is_not_a_month() {
        assert_eq!(parse_period_label("2023 (2)"), Some(date(2023, 12, 31)));
        assert_eq!(parse_period_label("Q3 2023 (3)"), Some(date(2023, 9, 30)));
        assert_eq!(parse_period_label("Q3 (2023)"), Some(date(2023, 9, 30)));

        let periods = vec!["2023".to_string(), "2022".to_string(), "2023 (2)".to_string()];
        assert_eq!(chronological_order(&periods), vec![1, 0, 2]);
    }

    #[test]
    fn test_chronological_order_sorts_descending_columns() {
        let periods = vec!["2023".to_string(), "2022".to_string(), "2021".to_string()];
        assert_eq!(chronological_order(&periods), vec![2, 1, 0]);
    }

    #[test]
    fn test_chronological_order_falls_back_to_column_order() {
        let periods = vec!["Current".to_string(), "Prior".to_string()];
        assert_eq!(chronological_order(&periods), vec![0, 1]);
    }

    #[test]
    fn test_statistics() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(sample_std_dev(&[1.0]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138).abs() < 1e-3);
    }
}
