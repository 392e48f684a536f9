use crate::accounts::{AccountKey, StatementType};
use crate::error::{AnalyzerError, Result};
use crate::record::NormalizedRecord;
use crate::utils::chronological_order;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RatioCategory {
    Liquidity,
    Profitability,
    Leverage,
    Efficiency,
}

impl RatioCategory {
    pub const ALL: [RatioCategory; 4] = [
        RatioCategory::Liquidity,
        RatioCategory::Profitability,
        RatioCategory::Leverage,
        RatioCategory::Efficiency,
    ];
}

impl fmt::Display for RatioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RatioCategory::Liquidity => "Liquidity",
            RatioCategory::Profitability => "Profitability",
            RatioCategory::Leverage => "Leverage",
            RatioCategory::Efficiency => "Efficiency",
        };
        f.write_str(name)
    }
}

/// One side of a ratio formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Term {
    #[schemars(description = "The account's value in the period")]
    Account { account: AccountKey },

    #[schemars(description = "Mean of the period's value and the previous period's value; falls back to the period value (approximate) when there is no previous value")]
    Average { account: AccountKey },

    Sum { terms: Vec<Term> },

    Difference { left: Box<Term>, right: Box<Term> },

    Abs { term: Box<Term> },

    Constant { value: f64 },
}

impl Term {
    pub fn account(account: AccountKey) -> Self {
        Term::Account { account }
    }

    pub fn average(account: AccountKey) -> Self {
        Term::Average { account }
    }

    pub fn sum(terms: Vec<Term>) -> Self {
        Term::Sum { terms }
    }

    pub fn difference(left: Term, right: Term) -> Self {
        Term::Difference {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn abs(term: Term) -> Self {
        Term::Abs {
            term: Box::new(term),
        }
    }

    pub fn constant(value: f64) -> Self {
        Term::Constant { value }
    }

    /// Accounts referenced by this term, in evaluation order.
    pub fn accounts(&self) -> Vec<AccountKey> {
        match self {
            Term::Account { account } | Term::Average { account } => vec![*account],
            Term::Sum { terms } => terms.iter().flat_map(Term::accounts).collect(),
            Term::Difference { left, right } => {
                let mut accounts = left.accounts();
                accounts.extend(right.accounts());
                accounts
            }
            Term::Abs { term } => term.accounts(),
            Term::Constant { .. } => Vec::new(),
        }
    }

    fn evaluate(&self, ctx: &PeriodContext<'_>) -> std::result::Result<Evaluated, UndefinedReason> {
        match self {
            Term::Account { account } => ctx
                .record
                .value(*account, ctx.period)
                .map(Evaluated::exact)
                .ok_or(UndefinedReason::MissingAccount { account: *account }),
            Term::Average { account } => {
                let current = ctx
                    .record
                    .value(*account, ctx.period)
                    .ok_or(UndefinedReason::MissingAccount { account: *account })?;
                match ctx.previous.and_then(|p| ctx.record.value(*account, p)) {
                    Some(previous) => Ok(Evaluated::exact((current + previous) / 2.0)),
                    None => Ok(Evaluated {
                        value: current,
                        approximate: true,
                    }),
                }
            }
            Term::Sum { terms } => {
                let mut total = Evaluated::exact(0.0);
                for term in terms {
                    let part = term.evaluate(ctx)?;
                    total.value += part.value;
                    total.approximate |= part.approximate;
                }
                Ok(total)
            }
            Term::Difference { left, right } => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                Ok(Evaluated {
                    value: l.value - r.value,
                    approximate: l.approximate || r.approximate,
                })
            }
            Term::Abs { term } => {
                let inner = term.evaluate(ctx)?;
                Ok(Evaluated {
                    value: inner.value.abs(),
                    ..inner
                })
            }
            Term::Constant { value } => Ok(Evaluated::exact(*value)),
        }
    }

    fn validate(&self, ratio: &str) -> Result<()> {
        match self {
            Term::Constant { value } if !value.is_finite() => Err(AnalyzerError::config(
                "ratios",
                format!("ratio '{}' uses a non-finite constant", ratio),
            )),
            Term::Sum { terms } if terms.is_empty() => Err(AnalyzerError::config(
                "ratios",
                format!("ratio '{}' has an empty sum", ratio),
            )),
            Term::Sum { terms } => terms.iter().try_for_each(|t| t.validate(ratio)),
            Term::Difference { left, right } => {
                left.validate(ratio)?;
                right.validate(ratio)
            }
            Term::Abs { term } => term.validate(ratio),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Evaluated {
    value: f64,
    approximate: bool,
}

impl Evaluated {
    fn exact(value: f64) -> Self {
        Self {
            value,
            approximate: false,
        }
    }
}

struct PeriodContext<'a> {
    record: &'a NormalizedRecord,
    period: usize,
    previous: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatioDefinition {
    pub name: String,
    pub category: RatioCategory,
    pub numerator: Term,
    pub denominator: Term,
    #[schemars(description = "Scale applied to the quotient, e.g. 100 for percentages or 365 for day counts")]
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub description: String,
}

fn default_multiplier() -> f64 {
    1.0
}

impl RatioDefinition {
    pub fn new(name: &str, category: RatioCategory, numerator: Term, denominator: Term) -> Self {
        Self {
            name: name.to_string(),
            category,
            numerator,
            denominator,
            multiplier: 1.0,
            description: String::new(),
        }
    }

    pub fn scaled(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn required_accounts(&self) -> Vec<AccountKey> {
        let mut accounts = self.numerator.accounts();
        accounts.extend(self.denominator.accounts());
        let mut seen = HashSet::new();
        accounts.retain(|a| seen.insert(*a));
        accounts
    }

    /// Statements that supply at least one of the ratio's accounts.
    pub fn home_statements(&self) -> Vec<StatementType> {
        let mut statements: Vec<StatementType> = self
            .required_accounts()
            .iter()
            .flat_map(|a| a.statements().iter().copied())
            .collect();
        statements.sort();
        statements.dedup();
        statements
    }

    pub fn applies_to(&self, statement_type: StatementType) -> bool {
        statement_type == StatementType::Unknown || self.home_statements().contains(&statement_type)
    }

    fn evaluate(&self, ctx: &PeriodContext<'_>) -> RatioValue {
        let numerator = match self.numerator.evaluate(ctx) {
            Ok(v) => v,
            Err(reason) => return RatioValue::Undefined { reason },
        };
        let denominator = match self.denominator.evaluate(ctx) {
            Ok(v) => v,
            Err(reason) => return RatioValue::Undefined { reason },
        };
        if denominator.value == 0.0 {
            return RatioValue::Undefined {
                reason: UndefinedReason::ZeroDenominator,
            };
        }

        let value = numerator.value / denominator.value * self.multiplier;
        if !value.is_finite() {
            return RatioValue::Undefined {
                reason: UndefinedReason::NonFinite,
            };
        }
        RatioValue::Defined {
            value,
            approximate: numerator.approximate || denominator.approximate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AnalyzerError::config("ratios", "ratio name must not be empty"));
        }
        if !self.multiplier.is_finite() || self.multiplier == 0.0 {
            return Err(AnalyzerError::config(
                "ratios",
                format!("ratio '{}' has an invalid multiplier {}", self.name, self.multiplier),
            ));
        }
        self.numerator.validate(&self.name)?;
        self.denominator.validate(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndefinedReason {
    MissingAccount { account: AccountKey },
    ZeroDenominator,
    NonFinite,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::MissingAccount { account } => write!(f, "missing {}", account),
            UndefinedReason::ZeroDenominator => f.write_str("zero denominator"),
            UndefinedReason::NonFinite => f.write_str("non-finite result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatioValue {
    Defined { value: f64, approximate: bool },
    Undefined { reason: UndefinedReason },
}

impl RatioValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            RatioValue::Defined { value, .. } => Some(*value),
            RatioValue::Undefined { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, RatioValue::Defined { .. })
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, RatioValue::Defined { approximate: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRow {
    pub name: String,
    pub category: RatioCategory,
    pub description: String,
    /// Whether the ratio's home statements include the classified statement type.
    pub in_scope: bool,
    /// One value per period, aligned with `RatioResult::periods`.
    pub values: Vec<RatioValue>,
}

impl RatioRow {
    pub fn is_defined_anywhere(&self) -> bool {
        self.values.iter().any(RatioValue::is_defined)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioResult {
    pub statement_type: StatementType,
    pub periods: Vec<String>,
    pub ratios: Vec<RatioRow>,
}

impl RatioResult {
    pub fn get(&self, name: &str) -> Option<&RatioRow> {
        self.ratios.iter().find(|r| r.name == name)
    }

    pub fn value(&self, name: &str, period: usize) -> Option<&RatioValue> {
        self.get(name).and_then(|r| r.values.get(period))
    }

    pub fn value_for(&self, name: &str, period_label: &str) -> Option<&RatioValue> {
        let period = self.periods.iter().position(|p| p == period_label)?;
        self.value(name, period)
    }

    pub fn by_category(&self, category: RatioCategory) -> impl Iterator<Item = &RatioRow> {
        self.ratios.iter().filter(move |r| r.category == category)
    }

    /// The chronologically latest defined value of a ratio, with its period label.
    pub fn latest_defined(&self, name: &str) -> Option<(&str, f64)> {
        let row = self.get(name)?;
        chronological_order(&self.periods)
            .into_iter()
            .rev()
            .find_map(|idx| {
                row.values
                    .get(idx)
                    .and_then(RatioValue::value)
                    .map(|v| (self.periods[idx].as_str(), v))
            })
    }

    pub fn defined_count(&self) -> usize {
        self.ratios
            .iter()
            .flat_map(|r| r.values.iter())
            .filter(|v| v.is_defined())
            .count()
    }
}

pub struct RatioEngine<'a> {
    definitions: &'a [RatioDefinition],
}

impl<'a> RatioEngine<'a> {
    pub fn new(definitions: &'a [RatioDefinition]) -> Self {
        Self { definitions }
    }

    /// Evaluates every ratio for every period. Ratios outside the statement type are
    /// still evaluated (a merged record can satisfy them) and flagged `in_scope: false`.
    pub fn compute(&self, record: &NormalizedRecord, statement_type: StatementType) -> RatioResult {
        let previous = record.previous_periods();
        let ratios: Vec<RatioRow> = self
            .definitions
            .iter()
            .map(|definition| {
                let values = (0..record.period_count())
                    .map(|period| {
                        definition.evaluate(&PeriodContext {
                            record,
                            period,
                            previous: previous[period],
                        })
                    })
                    .collect();
                RatioRow {
                    name: definition.name.clone(),
                    category: definition.category,
                    description: definition.description.clone(),
                    in_scope: definition.applies_to(statement_type),
                    values,
                }
            })
            .collect();

        let result = RatioResult {
            statement_type,
            periods: record.periods.clone(),
            ratios,
        };
        debug!(
            "Computed {} ratios over {} periods ({} defined values)",
            result.ratios.len(),
            result.periods.len(),
            result.defined_count()
        );
        result
    }
}

pub fn validate_definitions(definitions: &[RatioDefinition]) -> Result<()> {
    let mut names = HashSet::new();
    for definition in definitions {
        definition.validate()?;
        if !names.insert(definition.name.as_str()) {
            return Err(AnalyzerError::config(
                "ratios",
                format!("ratio '{}' is defined more than once", definition.name),
            ));
        }
    }
    Ok(())
}

pub fn builtin_ratio_definitions() -> Vec<RatioDefinition> {
    use AccountKey::*;
    use RatioCategory::*;

    let acc = Term::account;
    let avg = Term::average;

    vec![
        // Liquidity
        RatioDefinition::new("current_ratio", Liquidity, acc(CurrentAssets), acc(CurrentLiabilities))
            .describe("Ability to pay short-term obligations"),
        RatioDefinition::new(
            "quick_ratio",
            Liquidity,
            Term::difference(acc(CurrentAssets), acc(Inventory)),
            acc(CurrentLiabilities),
        )
        .describe("Liquidity excluding inventory"),
        RatioDefinition::new("cash_ratio", Liquidity, acc(Cash), acc(CurrentLiabilities))
            .describe("Most conservative liquidity measure"),
        RatioDefinition::new(
            "operating_cash_flow_ratio",
            Liquidity,
            acc(OperatingCashFlow),
            acc(CurrentLiabilities),
        )
        .describe("Current liabilities covered by operating cash flow"),
        RatioDefinition::new(
            "working_capital_to_assets",
            Liquidity,
            Term::difference(acc(CurrentAssets), acc(CurrentLiabilities)),
            acc(TotalAssets),
        )
        .describe("Net working capital relative to total assets"),
        RatioDefinition::new(
            "capex_coverage",
            Liquidity,
            acc(OperatingCashFlow),
            Term::abs(acc(CapitalExpenditures)),
        )
        .describe("Capital expenditure funded from operations"),
        // Profitability
        RatioDefinition::new(
            "gross_margin",
            Profitability,
            Term::difference(acc(Revenue), acc(CostOfGoodsSold)),
            acc(Revenue),
        )
        .scaled(100.0)
        .describe("Percentage of revenue after direct costs"),
        RatioDefinition::new("operating_margin", Profitability, acc(OperatingIncome), acc(Revenue))
            .scaled(100.0)
            .describe("Percentage of revenue after operating expenses"),
        RatioDefinition::new(
            "ebitda_margin",
            Profitability,
            Term::sum(vec![acc(OperatingIncome), Term::abs(acc(DepreciationAmortization))]),
            acc(Revenue),
        )
        .scaled(100.0)
        .describe("Operating profit before depreciation and amortization"),
        RatioDefinition::new("pretax_margin", Profitability, acc(IncomeBeforeTax), acc(Revenue))
            .scaled(100.0)
            .describe("Percentage of revenue before income tax"),
        RatioDefinition::new("net_margin", Profitability, acc(NetIncome), acc(Revenue))
            .scaled(100.0)
            .describe("Percentage of revenue after all expenses"),
        RatioDefinition::new("roa", Profitability, acc(NetIncome), acc(TotalAssets))
            .scaled(100.0)
            .describe("Return on assets"),
        RatioDefinition::new("roe", Profitability, acc(NetIncome), acc(TotalEquity))
            .scaled(100.0)
            .describe("Return on equity"),
        RatioDefinition::new(
            "free_cash_flow_margin",
            Profitability,
            Term::difference(acc(OperatingCashFlow), Term::abs(acc(CapitalExpenditures))),
            acc(Revenue),
        )
        .scaled(100.0)
        .describe("Free cash flow as a percentage of revenue"),
        RatioDefinition::new("cash_conversion", Profitability, acc(OperatingCashFlow), acc(NetIncome))
            .describe("Operating cash flow per unit of net income"),
        // Leverage
        RatioDefinition::new("debt_to_equity", Leverage, acc(TotalLiabilities), acc(TotalEquity))
            .describe("Financial leverage and capital structure"),
        RatioDefinition::new("debt_to_assets", Leverage, acc(TotalLiabilities), acc(TotalAssets))
            .describe("Proportion of assets financed by liabilities"),
        RatioDefinition::new("equity_multiplier", Leverage, acc(TotalAssets), acc(TotalEquity))
            .describe("Assets per unit of equity"),
        RatioDefinition::new(
            "long_term_debt_to_equity",
            Leverage,
            acc(LongTermDebt),
            acc(TotalEquity),
        )
        .describe("Long-term borrowing relative to equity"),
        RatioDefinition::new(
            "interest_coverage",
            Leverage,
            acc(OperatingIncome),
            Term::abs(acc(InterestExpense)),
        )
        .describe("Ability to pay interest on debt"),
        RatioDefinition::new(
            "cash_flow_to_debt",
            Leverage,
            acc(OperatingCashFlow),
            acc(TotalLiabilities),
        )
        .describe("Operating cash flow relative to total liabilities"),
        // Efficiency
        RatioDefinition::new("asset_turnover", Efficiency, acc(Revenue), acc(TotalAssets))
            .describe("Revenue generated per unit of assets"),
        RatioDefinition::new("inventory_turnover", Efficiency, acc(CostOfGoodsSold), avg(Inventory))
            .describe("How quickly inventory is sold"),
        RatioDefinition::new(
            "receivables_turnover",
            Efficiency,
            acc(Revenue),
            avg(AccountsReceivable),
        )
        .describe("How quickly receivables are collected"),
        RatioDefinition::new("payables_turnover", Efficiency, acc(CostOfGoodsSold), avg(AccountsPayable))
            .describe("How quickly suppliers are paid"),
        RatioDefinition::new(
            "days_sales_outstanding",
            Efficiency,
            avg(AccountsReceivable),
            acc(Revenue),
        )
        .scaled(365.0)
        .describe("Average collection period in days"),
        RatioDefinition::new(
            "days_inventory_outstanding",
            Efficiency,
            avg(Inventory),
            acc(CostOfGoodsSold),
        )
        .scaled(365.0)
        .describe("Average days inventory is held"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn compute(record: &NormalizedRecord, statement_type: StatementType) -> RatioResult {
        let definitions = builtin_ratio_definitions();
        RatioEngine::new(&definitions).compute(record, statement_type)
    }

    #[test]
    fn test_builtin_definitions_are_valid() {
        let definitions = builtin_ratio_definitions();
        assert_eq!(definitions.len(), 27);
        validate_definitions(&definitions).unwrap();
        for category in RatioCategory::ALL {
            assert!(definitions.iter().any(|d| d.category == category));
        }
    }

    #[test]
    fn test_current_ratio() {
        let record = NormalizedRecord::new(periods(&["2023"]))
            .with_account(AccountKey::CurrentAssets, vec![Some(225000.0)])
            .with_account(AccountKey::CurrentLiabilities, vec![Some(65000.0)]);
        let result = compute(&record, StatementType::BalanceSheet);
        let value = result.value("current_ratio", 0).unwrap().value().unwrap();
        assert!((value - 3.461538).abs() < 1e-6);
    }

    #[test]
    fn test_zero_denominator_is_undefined() {
        let record = NormalizedRecord::new(periods(&["2023"]))
            .with_account(AccountKey::CurrentAssets, vec![Some(1.0)])
            .with_account(AccountKey::CurrentLiabilities, vec![Some(0.0)]);
        let result = compute(&record, StatementType::BalanceSheet);
        assert_eq!(
            result.value("current_ratio", 0),
            Some(&RatioValue::Undefined {
                reason: UndefinedReason::ZeroDenominator
            })
        );
    }

    #[test]
    fn test_near_zero_denominator_computes() {
        let record = NormalizedRecord::new(periods(&["2023"]))
            .with_account(AccountKey::CurrentAssets, vec![Some(1.0)])
            .with_account(AccountKey::CurrentLiabilities, vec![Some(1e-9)]);
        let result = compute(&record, StatementType::BalanceSheet);
        let value = result.value("current_ratio", 0).unwrap().value().unwrap();
        assert!(value > 1e8);
    }

    #[test]
    fn test_missing_account_reason() {
        let record = NormalizedRecord::new(periods(&["2023"]))
            .with_account(AccountKey::Revenue, vec![Some(100.0)]);
        let result = compute(&record, StatementType::IncomeStatement);
        assert_eq!(
            result.value("net_margin", 0),
            Some(&RatioValue::Undefined {
                reason: UndefinedReason::MissingAccount {
                    account: AccountKey::NetIncome
                }
            })
        );
    }

    #[test]
    fn test_average_uses_previous_period_in_date_order() {
        let record = NormalizedRecord::new(periods(&["2023", "2022"]))
            .with_account(AccountKey::CostOfGoodsSold, vec![Some(600.0), Some(500.0)])
            .with_account(AccountKey::Inventory, vec![Some(100.0), Some(200.0)]);
        let result = compute(&record, StatementType::Unknown);

        assert_eq!(
            result.value("inventory_turnover", 0),
            Some(&RatioValue::Defined {
                value: 4.0,
                approximate: false
            })
        );
        assert_eq!(
            result.value("inventory_turnover", 1),
            Some(&RatioValue::Defined {
                value: 2.5,
                approximate: true
            })
        );
    }

    #[test]
    fn test_in_scope_follows_statement_type() {
        let record = NormalizedRecord::new(periods(&["2023"]));
        let result = compute(&record, StatementType::IncomeStatement);
        assert!(result.get("net_margin").unwrap().in_scope);
        assert!(!result.get("debt_to_equity").unwrap().in_scope);
        assert!(result.get("roa").unwrap().in_scope);

        let unknown = compute(&record, StatementType::Unknown);
        assert!(unknown.ratios.iter().all(|r| r.in_scope));
    }

    #[test]
    fn test_latest_defined_skips_undefined_periods() {
        let record = NormalizedRecord::new(periods(&["2021", "2022", "2023"]))
            .with_account(AccountKey::NetIncome, vec![Some(10.0), Some(20.0), None])
            .with_account(AccountKey::Revenue, vec![Some(100.0), Some(100.0), Some(100.0)]);
        let result = compute(&record, StatementType::IncomeStatement);
        assert_eq!(result.latest_defined("net_margin"), Some(("2022", 20.0)));
        assert_eq!(result.latest_defined("roe"), None);
    }

    #[test]
    fn test_duplicate_ratio_names_rejected() {
        let mut definitions = builtin_ratio_definitions();
        definitions.push(definitions[0].clone());
        assert!(validate_definitions(&definitions).is_err());
    }

    #[test]
    fn test_definitions_roundtrip_through_json() {
        let definitions = builtin_ratio_definitions();
        let json = serde_json::to_string(&definitions).unwrap();
        let parsed: Vec<RatioDefinition> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, definitions);
    }
}
