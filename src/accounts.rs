use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The statement a table (or a canonical account) belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    #[schemars(description = "Statement of financial position: assets, liabilities and equity at a date")]
    BalanceSheet,

    #[schemars(description = "Revenues, expenses and profit over a period")]
    IncomeStatement,

    #[schemars(description = "Operating, investing and financing cash movements over a period")]
    CashFlowStatement,

    #[schemars(description = "No statement type could be inferred with enough confidence")]
    Unknown,
}

impl StatementType {
    pub const KNOWN: [StatementType; 3] = [
        StatementType::BalanceSheet,
        StatementType::IncomeStatement,
        StatementType::CashFlowStatement,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            StatementType::BalanceSheet => "Balance Sheet",
            StatementType::IncomeStatement => "Income Statement",
            StatementType::CashFlowStatement => "Cash Flow Statement",
            StatementType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Canonical financial line items. Raw labels are resolved onto exactly one of these.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AccountKey {
    // Balance sheet
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
    CommonStock,
    RetainedEarnings,
    TotalEquity,
    TotalLiabilitiesAndEquity,

    // Income statement
    Revenue,
    CostOfGoodsSold,
    GrossProfit,
    OperatingExpenses,
    SellingGeneralAdministrative,
    ResearchDevelopment,
    DepreciationAmortization,
    OperatingIncome,
    InterestExpense,
    IncomeBeforeTax,
    IncomeTaxExpense,
    NetIncome,
    Ebitda,

    // Cash flow statement
    OperatingCashFlow,
    CapitalExpenditures,
    InvestingCashFlow,
    DividendsPaid,
    FinancingCashFlow,
    NetChangeInCash,
}

const BALANCE_SHEET: &[StatementType] = &[StatementType::BalanceSheet];
const INCOME_STATEMENT: &[StatementType] = &[StatementType::IncomeStatement];
const CASH_FLOW: &[StatementType] = &[StatementType::CashFlowStatement];
const INCOME_AND_CASH_FLOW: &[StatementType] =
    &[StatementType::IncomeStatement, StatementType::CashFlowStatement];

impl AccountKey {
    pub const ALL: [AccountKey; 39] = [
        AccountKey::Cash,
        AccountKey::ShortTermInvestments,
        AccountKey::AccountsReceivable,
        AccountKey::Inventory,
        AccountKey::PrepaidExpenses,
        AccountKey::CurrentAssets,
        AccountKey::PropertyPlantEquipment,
        AccountKey::Goodwill,
        AccountKey::IntangibleAssets,
        AccountKey::TotalAssets,
        AccountKey::AccountsPayable,
        AccountKey::AccruedLiabilities,
        AccountKey::ShortTermDebt,
        AccountKey::CurrentLiabilities,
        AccountKey::LongTermDebt,
        AccountKey::TotalLiabilities,
        AccountKey::CommonStock,
        AccountKey::RetainedEarnings,
        AccountKey::TotalEquity,
        AccountKey::TotalLiabilitiesAndEquity,
        AccountKey::Revenue,
        AccountKey::CostOfGoodsSold,
        AccountKey::GrossProfit,
        AccountKey::OperatingExpenses,
        AccountKey::SellingGeneralAdministrative,
        AccountKey::ResearchDevelopment,
        AccountKey::DepreciationAmortization,
        AccountKey::OperatingIncome,
        AccountKey::InterestExpense,
        AccountKey::IncomeBeforeTax,
        AccountKey::IncomeTaxExpense,
        AccountKey::NetIncome,
        AccountKey::Ebitda,
        AccountKey::OperatingCashFlow,
        AccountKey::CapitalExpenditures,
        AccountKey::InvestingCashFlow,
        AccountKey::DividendsPaid,
        AccountKey::FinancingCashFlow,
        AccountKey::NetChangeInCash,
    ];

    /// The snake_case key, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKey::Cash => "cash",
            AccountKey::ShortTermInvestments => "short_term_investments",
            AccountKey::AccountsReceivable => "accounts_receivable",
            AccountKey::Inventory => "inventory",
            AccountKey::PrepaidExpenses => "prepaid_expenses",
            AccountKey::CurrentAssets => "current_assets",
            AccountKey::PropertyPlantEquipment => "property_plant_equipment",
            AccountKey::Goodwill => "goodwill",
            AccountKey::IntangibleAssets => "intangible_assets",
            AccountKey::TotalAssets => "total_assets",
            AccountKey::AccountsPayable => "accounts_payable",
            AccountKey::AccruedLiabilities => "accrued_liabilities",
            AccountKey::ShortTermDebt => "short_term_debt",
            AccountKey::CurrentLiabilities => "current_liabilities",
            AccountKey::LongTermDebt => "long_term_debt",
            AccountKey::TotalLiabilities => "total_liabilities",
            AccountKey::CommonStock => "common_stock",
            AccountKey::RetainedEarnings => "retained_earnings",
            AccountKey::TotalEquity => "total_equity",
            AccountKey::TotalLiabilitiesAndEquity => "total_liabilities_and_equity",
            AccountKey::Revenue => "revenue",
            AccountKey::CostOfGoodsSold => "cost_of_goods_sold",
            AccountKey::GrossProfit => "gross_profit",
            AccountKey::OperatingExpenses => "operating_expenses",
            AccountKey::SellingGeneralAdministrative => "selling_general_administrative",
            AccountKey::ResearchDevelopment => "research_development",
            AccountKey::DepreciationAmortization => "depreciation_amortization",
            AccountKey::OperatingIncome => "operating_income",
            AccountKey::InterestExpense => "interest_expense",
            AccountKey::IncomeBeforeTax => "income_before_tax",
            AccountKey::IncomeTaxExpense => "income_tax_expense",
            AccountKey::NetIncome => "net_income",
            AccountKey::Ebitda => "ebitda",
            AccountKey::OperatingCashFlow => "operating_cash_flow",
            AccountKey::CapitalExpenditures => "capital_expenditures",
            AccountKey::InvestingCashFlow => "investing_cash_flow",
            AccountKey::DividendsPaid => "dividends_paid",
            AccountKey::FinancingCashFlow => "financing_cash_flow",
            AccountKey::NetChangeInCash => "net_change_in_cash",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AccountKey::Cash => "Cash and Cash Equivalents",
            AccountKey::ShortTermInvestments => "Short-Term Investments",
            AccountKey::AccountsReceivable => "Accounts Receivable",
            AccountKey::Inventory => "Inventory",
            AccountKey::PrepaidExpenses => "Prepaid Expenses",
            AccountKey::CurrentAssets => "Total Current Assets",
            AccountKey::PropertyPlantEquipment => "Property, Plant and Equipment",
            AccountKey::Goodwill => "Goodwill",
            AccountKey::IntangibleAssets => "Intangible Assets",
            AccountKey::TotalAssets => "Total Assets",
            AccountKey::AccountsPayable => "Accounts Payable",
            AccountKey::AccruedLiabilities => "Accrued Liabilities",
            AccountKey::ShortTermDebt => "Short-Term Debt",
            AccountKey::CurrentLiabilities => "Total Current Liabilities",
            AccountKey::LongTermDebt => "Long-Term Debt",
            AccountKey::TotalLiabilities => "Total Liabilities",
            AccountKey::CommonStock => "Common Stock",
            AccountKey::RetainedEarnings => "Retained Earnings",
            AccountKey::TotalEquity => "Total Equity",
            AccountKey::TotalLiabilitiesAndEquity => "Total Liabilities and Equity",
            AccountKey::Revenue => "Revenue",
            AccountKey::CostOfGoodsSold => "Cost of Goods Sold",
            AccountKey::GrossProfit => "Gross Profit",
            AccountKey::OperatingExpenses => "Operating Expenses",
            AccountKey::SellingGeneralAdministrative => "Selling, General and Administrative",
            AccountKey::ResearchDevelopment => "Research and Development",
            AccountKey::DepreciationAmortization => "Depreciation and Amortization",
            AccountKey::OperatingIncome => "Operating Income",
            AccountKey::InterestExpense => "Interest Expense",
            AccountKey::IncomeBeforeTax => "Income Before Tax",
            AccountKey::IncomeTaxExpense => "Income Tax Expense",
            AccountKey::NetIncome => "Net Income",
            AccountKey::Ebitda => "EBITDA",
            AccountKey::OperatingCashFlow => "Operating Cash Flow",
            AccountKey::CapitalExpenditures => "Capital Expenditures",
            AccountKey::InvestingCashFlow => "Investing Cash Flow",
            AccountKey::DividendsPaid => "Dividends Paid",
            AccountKey::FinancingCashFlow => "Financing Cash Flow",
            AccountKey::NetChangeInCash => "Net Change in Cash",
        }
    }

    /// Statements on which this line item normally appears.
    pub fn statements(&self) -> &'static [StatementType] {
        match self {
            AccountKey::Cash
            | AccountKey::ShortTermInvestments
            | AccountKey::AccountsReceivable
            | AccountKey::Inventory
            | AccountKey::PrepaidExpenses
            | AccountKey::CurrentAssets
            | AccountKey::PropertyPlantEquipment
            | AccountKey::Goodwill
            | AccountKey::IntangibleAssets
            | AccountKey::TotalAssets
            | AccountKey::AccountsPayable
            | AccountKey::AccruedLiabilities
            | AccountKey::ShortTermDebt
            | AccountKey::CurrentLiabilities
            | AccountKey::LongTermDebt
            | AccountKey::TotalLiabilities
            | AccountKey::CommonStock
            | AccountKey::RetainedEarnings
            | AccountKey::TotalEquity
            | AccountKey::TotalLiabilitiesAndEquity => BALANCE_SHEET,

            AccountKey::DepreciationAmortization | AccountKey::NetIncome => INCOME_AND_CASH_FLOW,

            AccountKey::Revenue
            | AccountKey::CostOfGoodsSold
            | AccountKey::GrossProfit
            | AccountKey::OperatingExpenses
            | AccountKey::SellingGeneralAdministrative
            | AccountKey::ResearchDevelopment
            | AccountKey::OperatingIncome
            | AccountKey::InterestExpense
            | AccountKey::IncomeBeforeTax
            | AccountKey::IncomeTaxExpense
            | AccountKey::Ebitda => INCOME_STATEMENT,

            AccountKey::OperatingCashFlow
            | AccountKey::CapitalExpenditures
            | AccountKey::InvestingCashFlow
            | AccountKey::DividendsPaid
            | AccountKey::FinancingCashFlow
            | AccountKey::NetChangeInCash => CASH_FLOW,
        }
    }

    pub fn belongs_to(&self, statement: StatementType) -> bool {
        self.statements().contains(&statement)
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in synonym lists. Labels are written the way they appear in statements;
/// the alias index normalizes them before lookup.
pub fn default_aliases() -> BTreeMap<AccountKey, Vec<String>> {
    let table: &[(AccountKey, &[&str])] = &[
        (
            AccountKey::Cash,
            &[
                "Cash",
                "Cash and cash equivalents",
                "Cash & equivalents",
                "Cash at bank",
                "Cash and bank balances",
                "Cash equivalents",
            ],
        ),
        (
            AccountKey::ShortTermInvestments,
            &["Short-term investments", "Marketable securities"],
        ),
        (
            AccountKey::AccountsReceivable,
            &[
                "Accounts receivable",
                "Trade receivables",
                "Receivables",
                "Trade and other receivables",
                "Accounts receivable, net",
                "Net receivables",
            ],
        ),
        (
            AccountKey::Inventory,
            &["Inventory", "Inventories", "Merchandise inventory"],
        ),
        (
            AccountKey::PrepaidExpenses,
            &[
                "Prepaid expenses",
                "Prepayments",
                "Prepaid expenses and other current assets",
            ],
        ),
        (
            AccountKey::CurrentAssets,
            &["Total current assets", "Current assets"],
        ),
        (
            AccountKey::PropertyPlantEquipment,
            &[
                "Property, plant and equipment",
                "Property plant equipment",
                "PP&E",
                "PPE",
                "Fixed assets",
                "Property and equipment",
                "Property, plant and equipment, net",
            ],
        ),
        (AccountKey::Goodwill, &["Goodwill"]),
        (AccountKey::IntangibleAssets, &["Intangible assets", "Intangibles"]),
        (AccountKey::TotalAssets, &["Total assets", "Assets, total"]),
        (
            AccountKey::AccountsPayable,
            &[
                "Accounts payable",
                "Trade payables",
                "Trade and other payables",
                "Payables",
            ],
        ),
        (
            AccountKey::AccruedLiabilities,
            &["Accrued liabilities", "Accrued expenses", "Accruals"],
        ),
        (
            AccountKey::ShortTermDebt,
            &[
                "Short-term debt",
                "Short-term borrowings",
                "Current portion of long-term debt",
                "Notes payable",
                "Current debt",
            ],
        ),
        (
            AccountKey::CurrentLiabilities,
            &["Total current liabilities", "Current liabilities"],
        ),
        (
            AccountKey::LongTermDebt,
            &[
                "Long-term debt",
                "Long-term borrowings",
                "Non-current borrowings",
                "Bonds payable",
            ],
        ),
        (
            AccountKey::TotalLiabilities,
            &["Total liabilities", "Liabilities, total"],
        ),
        (
            AccountKey::CommonStock,
            &["Common stock", "Share capital", "Capital stock", "Ordinary shares"],
        ),
        (
            AccountKey::RetainedEarnings,
            &[
                "Retained earnings",
                "Accumulated earnings",
                "Accumulated deficit",
                "Retained profits",
            ],
        ),
        (
            AccountKey::TotalEquity,
            &[
                "Total equity",
                "Shareholders' equity",
                "Stockholders' equity",
                "Total shareholders' equity",
                "Total stockholders' equity",
                "Owners' equity",
            ],
        ),
        (
            AccountKey::TotalLiabilitiesAndEquity,
            &[
                "Total liabilities and equity",
                "Total liabilities and shareholders' equity",
                "Total liabilities and stockholders' equity",
            ],
        ),
        (
            AccountKey::Revenue,
            &[
                "Revenue",
                "Revenues",
                "Total revenue",
                "Sales",
                "Net sales",
                "Total sales",
                "Sales revenue",
                "Net revenue",
                "Operating revenue",
                "Turnover",
            ],
        ),
        (
            AccountKey::CostOfGoodsSold,
            &[
                "Cost of goods sold",
                "COGS",
                "Cost of sales",
                "Cost of revenue",
                "Cost of revenues",
            ],
        ),
        (
            AccountKey::GrossProfit,
            &["Gross profit", "Gross margin", "Gross income"],
        ),
        (
            AccountKey::OperatingExpenses,
            &["Operating expenses", "Total operating expenses", "OpEx"],
        ),
        (
            AccountKey::SellingGeneralAdministrative,
            &[
                "Selling, general and administrative",
                "SG&A",
                "Selling general administrative",
            ],
        ),
        (
            AccountKey::ResearchDevelopment,
            &["Research and development", "R&D"],
        ),
        (
            AccountKey::DepreciationAmortization,
            &[
                "Depreciation and amortization",
                "Depreciation",
                "D&A",
                "Depreciation amortization",
            ],
        ),
        (
            AccountKey::OperatingIncome,
            &[
                "Operating income",
                "Operating profit",
                "EBIT",
                "Income from operations",
                "Operating earnings",
            ],
        ),
        (
            AccountKey::InterestExpense,
            &["Interest expense", "Finance costs", "Interest expense, net"],
        ),
        (
            AccountKey::IncomeBeforeTax,
            &[
                "Income before tax",
                "Income before taxes",
                "Income before income taxes",
                "Profit before tax",
                "Pretax income",
                "Earnings before tax",
                "EBT",
            ],
        ),
        (
            AccountKey::IncomeTaxExpense,
            &[
                "Income tax expense",
                "Income taxes",
                "Provision for income taxes",
                "Tax expense",
                "Income tax",
            ],
        ),
        (
            AccountKey::NetIncome,
            &[
                "Net income",
                "Net profit",
                "Net earnings",
                "Profit for the year",
                "Net income (loss)",
                "Profit after tax",
            ],
        ),
        (AccountKey::Ebitda, &["EBITDA"]),
        (
            AccountKey::OperatingCashFlow,
            &[
                "Operating cash flow",
                "Net cash from operating activities",
                "Net cash provided by operating activities",
                "Cash from operations",
                "Cash flow from operating activities",
                "Cash flows from operating activities",
            ],
        ),
        (
            AccountKey::CapitalExpenditures,
            &[
                "Capital expenditures",
                "CapEx",
                "Purchase of property, plant and equipment",
                "Purchases of property and equipment",
            ],
        ),
        (
            AccountKey::InvestingCashFlow,
            &[
                "Investing cash flow",
                "Net cash from investing activities",
                "Net cash used in investing activities",
                "Cash flow from investing activities",
                "Cash flows from investing activities",
            ],
        ),
        (
            AccountKey::DividendsPaid,
            &["Dividends paid", "Dividend payments", "Dividends"],
        ),
        (
            AccountKey::FinancingCashFlow,
            &[
                "Financing cash flow",
                "Net cash from financing activities",
                "Net cash used in financing activities",
                "Cash flow from financing activities",
                "Cash flows from financing activities",
            ],
        ),
        (
            AccountKey::NetChangeInCash,
            &[
                "Net change in cash",
                "Net increase in cash",
                "Net increase (decrease) in cash",
                "Change in cash",
                "Net cash flow",
            ],
        ),
    ];

    table
        .iter()
        .map(|(key, labels)| (*key, labels.iter().map(|l| l.to_string()).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_accounts_listed_once() {
        let mut seen = std::collections::HashSet::new();
        for key in AccountKey::ALL {
            assert!(seen.insert(key), "{} listed twice", key);
        }
        assert_eq!(seen.len(), AccountKey::ALL.len());
    }

    #[test]
    fn test_as_str_matches_serde() {
        for key in AccountKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_every_account_has_aliases() {
        let aliases = default_aliases();
        for key in AccountKey::ALL {
            assert!(
                aliases.get(&key).map(|a| !a.is_empty()).unwrap_or(false),
                "{} has no aliases",
                key
            );
        }
    }

    #[test]
    fn test_home_statements() {
        assert!(AccountKey::TotalAssets.belongs_to(StatementType::BalanceSheet));
        assert!(AccountKey::NetIncome.belongs_to(StatementType::IncomeStatement));
        assert!(AccountKey::NetIncome.belongs_to(StatementType::CashFlowStatement));
        assert!(!AccountKey::Revenue.belongs_to(StatementType::BalanceSheet));
    }
}
