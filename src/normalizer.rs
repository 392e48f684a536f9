use crate::accounts::AccountKey;
use crate::error::{AnalyzerError, Result};
use crate::ingestion::{CellValue, RawTable};
use crate::record::{AccountSeries, InvalidCell, MatchKind, NormalizedRecord};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const STOP_WORDS: &[&str] = &["and", "of", "the", "for", "to", "in", "from", "by", "on"];

/// Tokens that change the meaning of a line item. A fuzzy candidate is rejected when
/// one of these appears on only one side ("Total non-current assets" is not "Total current assets").
const QUALIFIER_TOKENS: &[&str] = &[
    "non",
    "noncurrent",
    "other",
    "deferred",
    "minority",
    "noncontrolling",
    "discontinued",
];

const LEADING_NOISE: &[&str] = &["less", "add", "plus"];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchingConfig {
    #[schemars(description = "Minimum token-overlap (Dice) similarity for a fuzzy label match, in (0, 1]")]
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[schemars(description = "Header words that identify the column holding account labels")]
    #[serde(default = "default_label_column_keywords")]
    pub label_column_keywords: Vec<String>,

    #[schemars(description = "Header words of non-label columns that never hold period values (codes, notes, variances)")]
    #[serde(default = "default_ignored_column_keywords")]
    pub ignored_column_keywords: Vec<String>,

    #[schemars(description = "Retry unmatched labels prefixed with the preceding section header (\"Current Assets\" + \"Total\"). Makes results depend on row order")]
    #[serde(default)]
    pub section_context: bool,
}

fn default_similarity_threshold() -> f64 {
    0.75
}

fn default_label_column_keywords() -> Vec<String> {
    [
        "account",
        "accounts",
        "item",
        "items",
        "line item",
        "description",
        "particulars",
        "name",
        "category",
        "label",
        "caption",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignored_column_keywords() -> Vec<String> {
    ["code", "note", "notes", "ref", "reference", "variance", "change", "pct", "percent"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            label_column_keywords: default_label_column_keywords(),
            ignored_column_keywords: default_ignored_column_keywords(),
            section_context: false,
        }
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<()> {
        let t = self.similarity_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(AnalyzerError::config(
                "matching",
                format!("similarity_threshold must be in (0, 1], got {}", t),
            ));
        }
        if self.label_column_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(AnalyzerError::config(
                "matching",
                "label_column_keywords must not contain empty entries",
            ));
        }
        Ok(())
    }
}

/// Lowercases, spells out `&`, turns punctuation into spaces, collapses whitespace and
/// drops leading enumerators ("1.", "a)") and sign words ("Less:").
pub fn normalize_label(label: &str) -> String {
    let spelled = label.to_lowercase().replace('&', " and ");
    let cleaned: String = spelled
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut start = 0;
    while start < tokens.len().saturating_sub(1) {
        let token = tokens[start];
        let is_enumerator = token.chars().all(|c| c.is_ascii_digit())
            || is_roman_enumerator(token)
            || (token.len() == 1 && spelled.contains(&format!("{})", token)));
        if is_enumerator || LEADING_NOISE.contains(&token) {
            start += 1;
        } else {
            break;
        }
    }
    tokens[start..].join(" ")
}

fn is_roman_enumerator(token: &str) -> bool {
    matches!(token, "i" | "ii" | "iii" | "iv" | "v" | "vi" | "vii" | "viii" | "ix" | "x")
}

fn fold_plural(token: &str) -> String {
    if token.len() <= 3 {
        return token.to_string();
    }
    if let Some(stem) = token.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if let Some(stem) = token.strip_suffix("xes") {
        return format!("{}x", stem);
    }
    if token.ends_with('s') && !token.ends_with("ss") {
        return token[..token.len() - 1].to_string();
    }
    token.to_string()
}

/// Content tokens of a normalized label, with stop words removed and plurals folded.
pub fn label_tokens(normalized: &str) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .filter(|t| !STOP_WORDS.contains(t))
        .map(fold_plural)
        .collect()
}

/// Dice coefficient over token sets: 2|A∩B| / (|A| + |B|).
pub fn token_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    2.0 * shared as f64 / (a.len() + b.len()) as f64
}

fn qualifiers_agree(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    QUALIFIER_TOKENS
        .iter()
        .all(|q| a.contains(*q) == b.contains(*q))
}

#[derive(Debug, Clone)]
struct AliasEntry {
    account: AccountKey,
    tokens: BTreeSet<String>,
}

/// Outcome of resolving one label against the alias index.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Exact(AccountKey),
    Fuzzy { account: AccountKey, score: f64 },
    BelowThreshold { candidate: AccountKey, score: f64 },
    NoMatch,
}

impl Resolution {
    pub fn account(&self) -> Option<AccountKey> {
        match self {
            Resolution::Exact(account) | Resolution::Fuzzy { account, .. } => Some(*account),
            _ => None,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Resolution::Exact(_) => 1.0,
            Resolution::Fuzzy { score, .. } | Resolution::BelowThreshold { score, .. } => *score,
            Resolution::NoMatch => 0.0,
        }
    }
}

/// Exact and fuzzy lookup from raw labels to canonical accounts.
#[derive(Debug, Clone)]
pub struct AliasIndex {
    exact: HashMap<String, AccountKey>,
    entries: Vec<AliasEntry>,
}

impl AliasIndex {
    /// Builds the index from alias lists. Each account's snake_case key and display
    /// name are always included. An alias claimed by two accounts is a config error.
    pub fn build(aliases: &BTreeMap<AccountKey, Vec<String>>) -> Result<Self> {
        let mut exact: HashMap<String, AccountKey> = HashMap::new();
        let mut entries = Vec::new();

        for account in AccountKey::ALL {
            let mut labels: Vec<&str> = vec![account.as_str(), account.display_name()];
            if let Some(extra) = aliases.get(&account) {
                labels.extend(extra.iter().map(String::as_str));
            }

            for label in labels {
                let normalized = normalize_label(label);
                if normalized.is_empty() {
                    return Err(AnalyzerError::config(
                        "aliases",
                        format!("alias '{}' for {} is empty after normalization", label, account),
                    ));
                }
                match exact.get(&normalized) {
                    Some(existing) if *existing != account => {
                        return Err(AnalyzerError::config(
                            "aliases",
                            format!(
                                "alias '{}' maps to both {} and {}",
                                label, existing, account
                            ),
                        ));
                    }
                    Some(_) => continue,
                    None => {}
                }
                exact.insert(normalized.clone(), account);
                entries.push(AliasEntry {
                    account,
                    tokens: label_tokens(&normalized),
                });
            }
        }

        debug!(
            "Built alias index with {} aliases over {} accounts",
            entries.len(),
            AccountKey::ALL.len()
        );
        Ok(Self { exact, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup, then the best fuzzy candidate. Candidates are visited in
    /// canonical key order and only a strictly better score replaces the current best.
    pub fn resolve(&self, label: &str, threshold: f64) -> Resolution {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return Resolution::NoMatch;
        }
        if let Some(account) = self.exact.get(&normalized) {
            return Resolution::Exact(*account);
        }

        let tokens = label_tokens(&normalized);
        let mut best: Option<(AccountKey, f64)> = None;
        for entry in &self.entries {
            if !qualifiers_agree(&tokens, &entry.tokens) {
                continue;
            }
            let score = token_similarity(&tokens, &entry.tokens);
            if score > best.map(|(_, s)| s).unwrap_or(0.0) {
                best = Some((entry.account, score));
            }
        }

        match best {
            Some((account, score)) if score >= threshold => Resolution::Fuzzy { account, score },
            Some((candidate, score)) => Resolution::BelowThreshold { candidate, score },
            None => Resolution::NoMatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnmappedReason {
    EmptyLabel,
    NoMatch,
    BelowThreshold { candidate: AccountKey, score: f64 },
    DuplicateAccount { account: AccountKey },
}

/// A data row that carried numbers but could not be attached to a canonical account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmappedRow {
    /// Zero-based index into `RawTable::rows`.
    pub row_index: usize,
    pub label: String,
    pub normalized_label: String,
    pub populated_cells: usize,
    #[serde(flatten)]
    pub reason: UnmappedReason,
}

/// Column layout detected from the header row and the cell contents.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub label_column: usize,
    /// (column index, unique period label)
    pub period_columns: Vec<(usize, String)>,
}

fn header_matches(header: &str, keywords: &[String]) -> bool {
    let padded = format!(" {} ", normalize_label(header));
    keywords
        .iter()
        .map(|k| normalize_label(k))
        .filter(|k| !k.is_empty())
        .any(|k| padded.contains(&format!(" {} ", k)))
}

pub struct SchemaNormalizer<'a> {
    index: &'a AliasIndex,
    config: &'a MatchingConfig,
}

impl<'a> SchemaNormalizer<'a> {
    pub fn new(index: &'a AliasIndex, config: &'a MatchingConfig) -> Self {
        Self { index, config }
    }

    pub fn detect_layout(&self, table: &RawTable) -> TableLayout {
        let columns = table.column_count();
        let label_column = (0..columns)
            .find(|&c| {
                table
                    .headers
                    .get(c)
                    .map(|h| header_matches(h, &self.config.label_column_keywords))
                    .unwrap_or(false)
            })
            .unwrap_or(0);

        let mut period_columns: Vec<(usize, String)> = Vec::new();
        for column in (0..columns).filter(|&c| c != label_column) {
            let header = table.headers.get(column).map(|h| h.trim()).unwrap_or("");
            if !header.is_empty() && header_matches(header, &self.config.ignored_column_keywords) {
                debug!("Ignoring column {} ('{}')", column, header);
                continue;
            }
            let has_number = (0..table.rows.len())
                .any(|r| matches!(table.cell(r, column).to_number(), CellValue::Number(_)));
            if !has_number {
                continue;
            }

            let base = if header.is_empty() {
                format!("Period {}", period_columns.len() + 1)
            } else {
                header.to_string()
            };
            let mut label = base.clone();
            let mut suffix = 2;
            while period_columns.iter().any(|(_, existing)| *existing == label) {
                label = format!("{} ({})", base, suffix);
                suffix += 1;
            }
            period_columns.push((column, label));
        }

        TableLayout {
            label_column,
            period_columns,
        }
    }

    fn resolve_with_context(&self, label: &str, section: Option<&str>) -> (Resolution, Option<String>) {
        let threshold = self.config.similarity_threshold;
        let direct = self.index.resolve(label, threshold);
        if direct.account().is_some() {
            return (direct, None);
        }
        if let Some(section) = section.filter(|_| self.config.section_context) {
            let contextual = self.index.resolve(&format!("{} {}", section, label), threshold);
            if contextual.account().is_some() {
                return (contextual, Some(section.to_string()));
            }
        }
        (direct, None)
    }

    /// Maps every data row onto a canonical account. Never fails: rows that cannot be
    /// attached are returned as unmapped, unreadable cells become nulls.
    pub fn normalize(&self, table: &RawTable) -> (NormalizedRecord, Vec<UnmappedRow>) {
        let layout = self.detect_layout(table);
        let periods: Vec<String> = layout.period_columns.iter().map(|(_, p)| p.clone()).collect();
        let mut record = NormalizedRecord::new(periods);
        let mut unmapped = Vec::new();
        let mut section: Option<String> = None;

        for row_index in 0..table.rows.len() {
            let label = table.cell(row_index, layout.label_column).as_text();
            let values: Vec<CellValue> = layout
                .period_columns
                .iter()
                .map(|(column, _)| table.cell(row_index, *column).to_number())
                .collect();
            let populated = values
                .iter()
                .filter(|v| matches!(v, CellValue::Number(_)))
                .count();

            if populated == 0 {
                if !label.is_empty() {
                    debug!("Row {} ('{}') treated as a section header", row_index, label);
                    section = Some(label);
                }
                continue;
            }

            let normalized_label = normalize_label(&label);
            let unmapped_row = |reason| UnmappedRow {
                row_index,
                label: label.clone(),
                normalized_label: normalized_label.clone(),
                populated_cells: populated,
                reason,
            };

            if normalized_label.is_empty() {
                unmapped.push(unmapped_row(UnmappedReason::EmptyLabel));
                continue;
            }

            let (resolution, context) = self.resolve_with_context(&label, section.as_deref());
            let (account, match_kind) = match (&resolution, context) {
                (Resolution::Exact(account), None) => (*account, MatchKind::Exact),
                (Resolution::Fuzzy { account, score }, None) => {
                    (*account, MatchKind::Fuzzy { score: *score })
                }
                (resolved, Some(section)) => match resolved.account() {
                    Some(account) => (
                        account,
                        MatchKind::SectionContext {
                            section,
                            score: resolved.score(),
                        },
                    ),
                    None => {
                        unmapped.push(unmapped_row(UnmappedReason::NoMatch));
                        continue;
                    }
                },
                (Resolution::BelowThreshold { candidate, score }, None) => {
                    debug!(
                        "Row {} ('{}') best candidate {} scored {:.2}",
                        row_index, label, candidate, score
                    );
                    unmapped.push(unmapped_row(UnmappedReason::BelowThreshold {
                        candidate: *candidate,
                        score: *score,
                    }));
                    continue;
                }
                (Resolution::NoMatch, None) => {
                    unmapped.push(unmapped_row(UnmappedReason::NoMatch));
                    continue;
                }
            };

            if record.series(account).is_some() {
                warn!(
                    "Row {} ('{}') resolves to {} which is already mapped; keeping the first row",
                    row_index, label, account
                );
                unmapped.push(unmapped_row(UnmappedReason::DuplicateAccount { account }));
                continue;
            }

            for (value, (column, period)) in values.iter().zip(&layout.period_columns) {
                if *value == CellValue::Invalid {
                    record.invalid_cells.push(InvalidCell {
                        account,
                        period: period.clone(),
                        row_index,
                        raw: table.cell(row_index, *column).as_text(),
                    });
                }
            }

            debug!("Row {} ('{}') -> {} ({:?})", row_index, label, account, match_kind);
            record.insert(
                account,
                AccountSeries {
                    values: values.iter().map(CellValue::number).collect(),
                    source_label: label.clone(),
                    source_row: Some(row_index),
                    match_kind,
                },
            );
        }

        info!(
            "Normalized {} accounts over {} periods ({} unmapped rows, {} invalid cells)",
            record.accounts.len(),
            record.period_count(),
            unmapped.len(),
            record.invalid_cells.len()
        );
        (record, unmapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::default_aliases;

    fn index() -> AliasIndex {
        AliasIndex::build(&default_aliases()).unwrap()
    }

    fn table(records: Vec<Vec<&str>>) -> RawTable {
        RawTable::from_records(records)
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Total   Current Assets "), "total current assets");
        assert_eq!(normalize_label("PP&E"), "pp and e");
        assert_eq!(normalize_label("Less: Cost of Sales"), "cost of sales");
        assert_eq!(normalize_label("1. Revenue"), "revenue");
        assert_eq!(normalize_label("Shareholders' equity"), "shareholders equity");
        assert_eq!(normalize_label("2023"), "2023");
    }

    #[test]
    fn test_plural_folding() {
        assert_eq!(fold_plural("activities"), "activity");
        assert_eq!(fold_plural("assets"), "asset");
        assert_eq!(fold_plural("taxes"), "tax");
        assert_eq!(fold_plural("gross"), "gross");
        assert_eq!(fold_plural("ppe"), "ppe");
    }

    #[test]
    fn test_exact_resolution_includes_canonical_names() {
        let index = index();
        assert_eq!(index.resolve("total_assets", 0.75), Resolution::Exact(AccountKey::TotalAssets));
        assert_eq!(index.resolve("Total Assets", 0.75), Resolution::Exact(AccountKey::TotalAssets));
        assert_eq!(index.resolve("NET SALES", 0.75), Resolution::Exact(AccountKey::Revenue));
        assert_eq!(index.resolve("SG&A", 0.75), Resolution::Exact(AccountKey::SellingGeneralAdministrative));
    }

    #[test]
    fn test_fuzzy_resolution() {
        let index = index();
        let resolved = index.resolve("Net cash provided by (used in) investing activities", 0.75);
        assert_eq!(resolved.account(), Some(AccountKey::InvestingCashFlow));

        let resolved = index.resolve("Total current liability", 0.75);
        assert_eq!(resolved.account(), Some(AccountKey::CurrentLiabilities));
    }

    #[test]
    fn test_qualifier_blocks_fuzzy_match() {
        let index = index();
        let resolved = index.resolve("Total non-current assets", 0.75);
        assert_eq!(resolved.account(), None);
    }

    #[test]
    fn test_below_threshold_reports_candidate() {
        let index = index();
        match index.resolve("Sales and marketing", 0.75) {
            Resolution::BelowThreshold { candidate, score } => {
                assert_eq!(candidate, AccountKey::Revenue);
                assert!(score < 0.75);
            }
            other => panic!("unexpected resolution {:?}", other),
        }
        assert_eq!(index.resolve("Widgets", 0.75), Resolution::NoMatch);
    }

    #[test]
    fn test_conflicting_alias_is_rejected() {
        let mut aliases = default_aliases();
        aliases
            .get_mut(&AccountKey::Revenue)
            .unwrap()
            .push("Total assets".to_string());
        let err = AliasIndex::build(&aliases).unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig { .. }));
    }

    #[test]
    fn test_label_column_by_keyword_and_period_columns() {
        let index = index();
        let config = MatchingConfig::default();
        let normalizer = SchemaNormalizer::new(&index, &config);
        let raw = table(vec![
            vec!["Code", "Line Item", "2023", "", "2023"],
            vec!["1000", "Cash", "10", "11", "12"],
        ]);
        let layout = normalizer.detect_layout(&raw);
        assert_eq!(layout.label_column, 1);
        assert_eq!(
            layout.period_columns,
            vec![
                (2, "2023".to_string()),
                (3, "Period 2".to_string()),
                (4, "2023 (2)".to_string())
            ]
        );
    }

    #[test]
    fn test_section_context_resolves_totals() {
        let index = index();
        let config = MatchingConfig {
            section_context: true,
            ..Default::default()
        };
        let normalizer = SchemaNormalizer::new(&index, &config);
        let raw = table(vec![
            vec!["Account", "2023"],
            vec!["Current Assets", ""],
            vec!["Cash", "50"],
            vec!["Total", "80"],
        ]);
        let (record, unmapped) = normalizer.normalize(&raw);
        assert!(unmapped.is_empty());
        assert_eq!(record.value(AccountKey::CurrentAssets, 0), Some(80.0));
        assert!(matches!(
            record.series(AccountKey::CurrentAssets).unwrap().match_kind,
            MatchKind::SectionContext { .. }
        ));
    }

    #[test]
    fn test_section_headers_ignored_by_default() {
        let index = index();
        let config = MatchingConfig::default();
        let normalizer = SchemaNormalizer::new(&index, &config);
        let raw = table(vec![
            vec!["Account", "2023"],
            vec!["Current Assets", ""],
            vec!["Cash", "50"],
            vec!["Total", "80"],
        ]);
        let (record, unmapped) = normalizer.normalize(&raw);
        assert!(record.series(AccountKey::CurrentAssets).is_none());
        assert_eq!(unmapped.len(), 1);
        assert_eq!(unmapped[0].label, "Total");
    }

    #[test]
    fn test_duplicates_and_invalid_cells() {
        let index = index();
        let config = MatchingConfig::default();
        let normalizer = SchemaNormalizer::new(&index, &config);
        let raw = table(vec![
            vec!["Account", "2022", "2023"],
            vec!["Revenue", "100", "see note"],
            vec!["Net sales", "999", "999"],
            vec!["", "5", "5"],
            vec!["Widgets", "1", "2"],
        ]);
        let (record, unmapped) = normalizer.normalize(&raw);

        assert_eq!(record.value(AccountKey::Revenue, 0), Some(100.0));
        assert_eq!(record.value(AccountKey::Revenue, 1), None);
        assert_eq!(record.invalid_cells.len(), 1);
        assert_eq!(record.invalid_cells[0].raw, "see note");

        assert_eq!(unmapped.len(), 3);
        assert_eq!(
            unmapped[0].reason,
            UnmappedReason::DuplicateAccount { account: AccountKey::Revenue }
        );
        assert_eq!(unmapped[1].reason, UnmappedReason::EmptyLabel);
        assert_eq!(unmapped[2].reason, UnmappedReason::NoMatch);
        assert_eq!(unmapped[2].row_index, 3);
    }

    #[test]
    fn test_empty_table_yields_empty_record() {
        let index = index();
        let config = MatchingConfig::default();
        let normalizer = SchemaNormalizer::new(&index, &config);
        let (record, unmapped) = normalizer.normalize(&RawTable::from_rows(Vec::new()));
        assert!(record.is_empty());
        assert!(record.periods.is_empty());
        assert!(unmapped.is_empty());
    }
}
