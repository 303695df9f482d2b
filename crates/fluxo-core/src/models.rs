//! Domain models for Fluxo

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerance for net amount consistency checks (same currency, 2 decimals)
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// Round a monetary value to 2 decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Kind of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Accounts payable (money going out)
    Payable,
    /// Accounts receivable (money coming in)
    Receivable,
    /// Movement between own accounts
    Transfer,
    /// Correction of a previous record
    Adjustment,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payable => "payable",
            Self::Receivable => "receivable",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "payable" => Ok(Self::Payable),
            "receivable" => Ok(Self::Receivable),
            "transfer" => Ok(Self::Transfer),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Expected but not yet settled
    Forecast,
    /// Settled (paid or received); payment date must be set
    Realized,
    /// Soft-deleted; never physically removed once realized
    Canceled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forecast => "forecast",
            Self::Realized => "realized",
            Self::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forecast" => Ok(Self::Forecast),
            "realized" => Ok(Self::Realized),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(format!("Unknown entry status: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a ledger entry was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Entered by hand
    #[default]
    Manual,
    /// Created by an import
    Imported,
}

impl EntryOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Imported => "imported",
        }
    }
}

impl std::str::FromStr for EntryOrigin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "imported" => Ok(Self::Imported),
            _ => Err(format!("Unknown entry origin: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single accounts-payable or accounts-receivable record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    /// Competência: when the economic event occurred
    pub accrual_date: NaiveDate,
    /// Vencimento: when payment is due
    pub due_date: Option<NaiveDate>,
    /// When cash actually moved (required for realized entries)
    pub payment_date: Option<NaiveDate>,
    pub branch_id: i64,
    pub cost_center_id: Option<i64>,
    /// Management chart-of-accounts code (classification key)
    pub management_account: String,
    pub accounting_account: Option<String>,
    pub revenue_group: Option<String>,
    pub channel_id: Option<i64>,
    pub description: String,
    pub gross_amount: f64,
    pub discount: f64,
    pub interest: f64,
    pub penalty: f64,
    /// Invariant: net = gross - discount + interest + penalty (±0.01)
    pub net_amount: f64,
    /// Bank statement line this entry is reconciled against
    pub linked_statement_id: Option<i64>,
    pub origin: EntryOrigin,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether this entry can be offered as a reconciliation candidate
    pub fn is_open_for_reconciliation(&self) -> bool {
        self.status != EntryStatus::Canceled && self.linked_statement_id.is_none()
    }
}

/// A new ledger entry to be created (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub accrual_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<NaiveDate>,
    pub branch_id: i64,
    pub cost_center_id: Option<i64>,
    pub management_account: String,
    pub accounting_account: Option<String>,
    pub revenue_group: Option<String>,
    pub channel_id: Option<i64>,
    pub description: String,
    pub gross_amount: f64,
    pub discount: f64,
    pub interest: f64,
    pub penalty: f64,
    pub net_amount: f64,
    pub origin: EntryOrigin,
    pub notes: Option<String>,
}

impl NewLedgerEntry {
    /// Validate structural invariants before the entry touches the store.
    ///
    /// Checks: all amounts finite, required codes present, net amount
    /// consistent with gross/discount/interest/penalty within tolerance,
    /// realized status accompanied by a payment date.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("gross_amount", self.gross_amount),
            ("discount", self.discount),
            ("interest", self.interest),
            ("penalty", self.penalty),
            ("net_amount", self.net_amount),
        ] {
            if !value.is_finite() {
                return Err(Error::Validation(format!(
                    "Amount '{}' is not a finite number",
                    name
                )));
            }
        }

        if self.management_account.trim().is_empty() {
            return Err(Error::Validation(
                "Management account code is required".to_string(),
            ));
        }

        if self.description.trim().is_empty() {
            return Err(Error::Validation("Description is required".to_string()));
        }

        let expected = round2(self.gross_amount - self.discount + self.interest + self.penalty);
        if (expected - self.net_amount).abs() > AMOUNT_TOLERANCE {
            return Err(Error::Validation(format!(
                "Inconsistent net amount: expected {:.2}, given {:.2}",
                expected, self.net_amount
            )));
        }

        if self.status == EntryStatus::Realized && self.payment_date.is_none() {
            return Err(Error::Validation(
                "Realized entries require a payment date".to_string(),
            ));
        }

        Ok(())
    }
}

/// A single bank transaction record from a statement import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankStatementLine {
    pub id: i64,
    pub movement_date: NaiveDate,
    pub bank_account: String,
    /// Memo/history text as printed on the statement
    pub memo: String,
    pub document_ref: Option<String>,
    pub amount: f64,
    pub running_balance: Option<f64>,
    /// Invariant: reconciled ⇔ linked_entry_id is set
    pub reconciled: bool,
    pub linked_entry_id: Option<i64>,
    /// Hash for import deduplication
    pub import_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A new statement line to be imported (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewStatementLine {
    pub movement_date: NaiveDate,
    pub bank_account: String,
    pub memo: String,
    pub document_ref: Option<String>,
    pub amount: f64,
    pub running_balance: Option<f64>,
    pub import_hash: String,
}

/// Account type in the management chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Revenue,
    Expense,
    Cost,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Expense => "expense",
            Self::Cost => "cost",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "revenue" => Ok(Self::Revenue),
            "expense" => Ok(Self::Expense),
            "cost" => Ok(Self::Cost),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cash-flow statement category (DFC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashflowCategory {
    Operating,
    Investing,
    Financing,
}

impl CashflowCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operating => "operating",
            Self::Investing => "investing",
            Self::Financing => "financing",
        }
    }
}

impl std::str::FromStr for CashflowCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "operating" => Ok(Self::Operating),
            "investing" => Ok(Self::Investing),
            "financing" => Ok(Self::Financing),
            _ => Err(format!("Unknown cashflow category: {}", s)),
        }
    }
}

impl std::fmt::Display for CashflowCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cost-of-goods classification tag (CMA = acquired, CMV = sold)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostClass {
    Cma,
    Cmv,
}

impl CostClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cma => "cma",
            Self::Cmv => "cmv",
        }
    }
}

impl std::str::FromStr for CostClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cma" => Ok(Self::Cma),
            "cmv" => Ok(Self::Cmv),
            _ => Err(format!("Unknown cost classification: {}", s)),
        }
    }
}

impl std::fmt::Display for CostClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fixed vs. variable expense classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedVariable {
    Fixed,
    Variable,
}

impl FixedVariable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
        }
    }
}

impl std::str::FromStr for FixedVariable {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "variable" => Ok(Self::Variable),
            _ => Err(format!("Unknown fixed/variable classification: {}", s)),
        }
    }
}

impl std::fmt::Display for FixedVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Management account master record (reference data)
///
/// Maps an account code to classification metadata. Immutable during a
/// reporting run; reloaded from master data on a cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Natural key (management chart-of-accounts code)
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    /// DRE group this account rolls up into
    pub dre_group: String,
    pub dre_subgroup: Option<String>,
    pub cashflow_category: Option<CashflowCategory>,
    pub fixed_variable: Option<FixedVariable>,
    pub cost_class: Option<CostClass>,
}

/// A company branch (filial)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub name: String,
}

/// A sales channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
}

/// A cost center
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostCenter {
    pub id: i64,
    pub name: String,
}

/// A (year, month) pair identifying a reporting month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::Validation(format!("Invalid month: {}", month)));
        }
        Ok(Self { year, month })
    }

    /// The period containing the given date
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month, wrapping the year boundary
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month, wrapping the year boundary
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Contiguous range of `months` periods starting at `self`
    pub fn range(&self, months: u32) -> Vec<Period> {
        let mut periods = Vec::with_capacity(months as usize);
        let mut current = *self;
        for _ in 0..months {
            periods.push(current);
            current = current.next();
        }
        periods
    }

    pub fn first_day(&self) -> NaiveDate {
        // Month already validated at construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or_else(|| panic!("invalid period {}-{}", self.year, self.month))
    }

    pub fn last_day(&self) -> NaiveDate {
        let next = self.next();
        next.first_day().pred_opt().unwrap_or(self.first_day())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    /// Parses "YYYY-MM"
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid period: {} (use YYYY-MM)", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid period year: {}", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid period month: {}", s))?;
        Period::new(year, month).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> NewLedgerEntry {
        NewLedgerEntry {
            entry_type: EntryType::Payable,
            status: EntryStatus::Forecast,
            accrual_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            due_date: Some(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()),
            payment_date: None,
            branch_id: 1,
            cost_center_id: None,
            management_account: "3.1.01".to_string(),
            accounting_account: None,
            revenue_group: None,
            channel_id: None,
            description: "Office rent".to_string(),
            gross_amount: 500.0,
            discount: 0.0,
            interest: 0.0,
            penalty: 0.0,
            net_amount: 500.0,
            origin: EntryOrigin::Manual,
            notes: None,
        }
    }

    #[test]
    fn test_validate_accepts_consistent_net() {
        let mut entry = sample_entry();
        entry.interest = 10.0;
        entry.penalty = 5.0;
        entry.net_amount = 515.0;
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_net() {
        let mut entry = sample_entry();
        entry.interest = 10.0;
        entry.penalty = 5.0;
        entry.net_amount = 500.0;

        let err = entry.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("515.00"), "message should name expected: {}", msg);
        assert!(msg.contains("500.00"), "message should name given: {}", msg);
    }

    #[test]
    fn test_validate_tolerates_rounding_noise() {
        let mut entry = sample_entry();
        entry.gross_amount = 100.10;
        entry.discount = 0.05;
        entry.net_amount = 100.05;
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_validate_realized_requires_payment_date() {
        let mut entry = sample_entry();
        entry.status = EntryStatus::Realized;
        assert!(entry.validate().is_err());

        entry.payment_date = Some(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_amounts() {
        let mut entry = sample_entry();
        entry.gross_amount = f64::NAN;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_period_range_wraps_year() {
        let start = Period::new(2024, 11).unwrap();
        let range = start.range(4);
        assert_eq!(
            range,
            vec![
                Period { year: 2024, month: 11 },
                Period { year: 2024, month: 12 },
                Period { year: 2025, month: 1 },
                Period { year: 2025, month: 2 },
            ]
        );
    }

    #[test]
    fn test_period_last_day_handles_february() {
        let feb = Period::new(2024, 2).unwrap();
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let feb = Period::new(2025, 2).unwrap();
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn test_period_parse_and_display() {
        let period: Period = "2025-03".parse().unwrap();
        assert_eq!(period, Period::new(2025, 3).unwrap());
        assert_eq!(period.to_string(), "2025-03");
        assert!("2025-13".parse::<Period>().is_err());
        assert!("2025".parse::<Period>().is_err());
    }

    #[test]
    fn test_entry_status_roundtrip() {
        for status in [EntryStatus::Forecast, EntryStatus::Realized, EntryStatus::Canceled] {
            let parsed: EntryStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.004), 10.0);
        assert_eq!(round2(10.006), 10.01);
        assert_eq!(round2(-3.456), -3.46);
    }
}
