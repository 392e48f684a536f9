use serde::{Deserialize, Serialize};

/// A single raw cell as handed over by whatever loaded the spreadsheet or delimited file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Text rendering used for labels and headers. Integral numbers drop the
    /// trailing `.0` so a numeric `2023` header reads as "2023".
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }

    pub fn to_number(&self) -> CellValue {
        match self {
            Cell::Empty => CellValue::Blank,
            Cell::Number(n) if n.is_finite() => CellValue::Number(*n),
            Cell::Number(_) => CellValue::Invalid,
            Cell::Text(s) => coerce_numeric(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::from(value.as_str())
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// Outcome of coercing a cell to a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Number(f64),
    /// Empty or an explicit "no value" marker such as `-` or `n/a`.
    Blank,
    /// Non-empty text that could not be read as a number.
    Invalid,
}

impl CellValue {
    pub fn number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Rows × columns of raw cells. The first row of the source is the header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    /// Builds a table from rows of cells where the first row holds the headers.
    /// An empty input yields an empty table rather than an error.
    pub fn from_rows(mut rows: Vec<Vec<Cell>>) -> Self {
        if rows.is_empty() {
            return Self::new(Vec::new(), Vec::new());
        }
        let headers = rows.remove(0).iter().map(Cell::as_text).collect();
        Self::new(headers, rows)
    }

    /// Builds a table from plain string records, e.g. the output of a CSV reader.
    pub fn from_records<I, R, S>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows = records
            .into_iter()
            .map(|record| record.into_iter().map(|s| Cell::from(s.as_ref())).collect())
            .collect();
        Self::from_rows(rows)
    }

    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(Cell::is_empty))
    }

    /// Rows that carry at least one non-empty cell.
    pub fn data_row_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.iter().any(|c| !c.is_empty()))
            .count()
    }
}

const NULL_MARKERS: &[&str] = &["-", "--", "—", "–", "n/a", "na", "nm", "n.m.", "nil", "none", "null"];

const CURRENCY_CODES: &[&str] = &["usd", "eur", "gbp", "jpy", "cad", "aud", "chf", "cny", "inr", "ngn"];

/// Reads a financial figure written the way statements print them:
/// `$1,234.56`, `(1,234)`, `1 234-`, `−12.5%`, `1.2M`, `USD 3,000`.
pub fn coerce_numeric(raw: &str) -> CellValue {
    let mut s = raw.trim().to_lowercase();
    if s.is_empty() {
        return CellValue::Blank;
    }
    if NULL_MARKERS.contains(&s.as_str()) {
        return CellValue::Blank;
    }

    for code in CURRENCY_CODES {
        if let Some(rest) = s.strip_prefix(code) {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_suffix(code) {
            s = rest.to_string();
        }
    }

    let mut negative = false;
    let mut cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | '₦' | '₹' | ',' | '%' | '\'' | '_'))
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '−' { '-' } else { c })
        .collect();

    if cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2 {
        negative = true;
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }
    if let Some(rest) = cleaned.strip_suffix('-') {
        if !rest.is_empty() && !rest.contains('-') {
            negative = !negative;
            cleaned = rest.to_string();
        }
    }
    if let Some(rest) = cleaned.strip_prefix('-') {
        negative = !negative;
        cleaned = rest.to_string();
    }
    cleaned = cleaned.trim_start_matches('+').to_string();

    let (digits, multiplier) = split_magnitude_suffix(&cleaned);
    if digits.is_empty() {
        return CellValue::Invalid;
    }

    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            let value = value * multiplier;
            CellValue::Number(if negative { -value } else { value })
        }
        _ => CellValue::Invalid,
    }
}

fn split_magnitude_suffix(s: &str) -> (&str, f64) {
    for (suffix, multiplier) in [
        ("bn", 1_000_000_000.0),
        ("mm", 1_000_000.0),
        ("k", 1_000.0),
        ("m", 1_000_000.0),
        ("b", 1_000_000_000.0),
    ] {
        if let Some(rest) = s.strip_suffix(suffix) {
            if rest.chars().last().map(|c| c.is_ascii_digit() || c == '.').unwrap_or(false) {
                return (rest, multiplier);
            }
        }
    }
    (s, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_plain_and_currency() {
        assert_eq!(coerce_numeric("225000"), CellValue::Number(225000.0));
        assert_eq!(coerce_numeric("$1,234.56"), CellValue::Number(1234.56));
        assert_eq!(coerce_numeric("USD 3,000"), CellValue::Number(3000.0));
        assert_eq!(coerce_numeric("€ 12 500"), CellValue::Number(12500.0));
    }

    #[test]
    fn test_coerce_negative_notations() {
        assert_eq!(coerce_numeric("(1,234)"), CellValue::Number(-1234.0));
        assert_eq!(coerce_numeric("($500)"), CellValue::Number(-500.0));
        assert_eq!(coerce_numeric("-$500"), CellValue::Number(-500.0));
        assert_eq!(coerce_numeric("1,000-"), CellValue::Number(-1000.0));
        assert_eq!(coerce_numeric("−12.5%"), CellValue::Number(-12.5));
    }

    #[test]
    fn test_coerce_suffixes() {
        assert_eq!(coerce_numeric("1.5M"), CellValue::Number(1_500_000.0));
        assert_eq!(coerce_numeric("345K"), CellValue::Number(345_000.0));
        assert_eq!(coerce_numeric("2bn"), CellValue::Number(2_000_000_000.0));
    }

    #[test]
    fn test_coerce_blank_and_invalid() {
        assert_eq!(coerce_numeric(""), CellValue::Blank);
        assert_eq!(coerce_numeric(" - "), CellValue::Blank);
        assert_eq!(coerce_numeric("N/A"), CellValue::Blank);
        assert_eq!(coerce_numeric("see note 4"), CellValue::Invalid);
        assert_eq!(coerce_numeric("12.3.4"), CellValue::Invalid);
    }

    #[test]
    fn test_from_records_uses_first_row_as_headers() {
        let table = RawTable::from_records(vec![
            vec!["Account", "2023", "2022"],
            vec!["Cash", "100", ""],
        ]);
        assert_eq!(table.headers, vec!["Account", "2023", "2022"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.cell(0, 2), &Cell::Empty);
        assert_eq!(table.cell(5, 5), &Cell::Empty);
    }

    #[test]
    fn test_numeric_header_renders_without_fraction() {
        let table = RawTable::from_rows(vec![
            vec![Cell::from("Item"), Cell::Number(2023.0)],
            vec![Cell::from("Revenue"), Cell::Number(10.0)],
        ]);
        assert_eq!(table.headers[1], "2023");
    }
}
