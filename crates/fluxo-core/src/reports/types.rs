//! Derived report types
//!
//! Everything here is owned by the computation that produces it: recomputed
//! from ledger entries, statement lines, and account master data on every
//! call (subject to the short report cache TTL), never authoritative.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::benchmark::BenchmarkTier;
use crate::models::{CashflowCategory, Period};

/// Income-statement bucket a classified entry falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DreBucket {
    Revenue,
    Cost,
    OperatingExpense,
    FinancialRevenue,
    FinancialExpense,
}

impl DreBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Cost => "cost",
            Self::OperatingExpense => "operating_expense",
            Self::FinancialRevenue => "financial_revenue",
            Self::FinancialExpense => "financial_expense",
        }
    }
}

impl std::fmt::Display for DreBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One classified line of a DRE statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreLine {
    pub bucket: DreBucket,
    pub account_code: String,
    pub description: String,
    pub amount: f64,
}

/// DRE summary record with derived margins and their benchmark tiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreSummary {
    pub gross_revenue: f64,
    pub deductions: f64,
    pub net_revenue: f64,
    pub total_cost: f64,
    pub gross_margin: f64,
    pub gross_margin_pct: f64,
    pub operating_expense: f64,
    /// Gross margin minus operating expense
    pub ebitda: f64,
    pub ebitda_pct: f64,
    pub financial_revenue: f64,
    pub financial_expense: f64,
    pub financial_result: f64,
    pub net_income: f64,
    pub net_margin_pct: f64,
    pub gross_margin_tier: BenchmarkTier,
    pub ebitda_tier: BenchmarkTier,
    pub net_margin_tier: BenchmarkTier,
}

/// Management income statement for one period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DreStatement {
    pub period: Period,
    /// None = all branches
    pub branch_id: Option<i64>,
    pub lines: Vec<DreLine>,
    pub summary: DreSummary,
    /// Account codes that failed to resolve against master data; their
    /// entries were counted as operating expense
    pub unresolved_accounts: Vec<String>,
}

/// Direction of a cash movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashDirection {
    In,
    Out,
}

impl CashDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl std::fmt::Display for CashDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of a cash-flow statement (DFC)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashflowLine {
    pub date: NaiveDate,
    pub direction: CashDirection,
    pub category: CashflowCategory,
    pub description: String,
    pub value: f64,
    /// True for forecast entries not yet settled
    pub projected: bool,
    /// Bank account of the settling statement line, when reconciled
    pub bank_account: Option<String>,
}

/// Options for the forecast cash-flow projection
#[derive(Debug, Clone)]
pub struct ForecastOptions {
    /// Contiguous months to project, starting at the requested period
    pub horizon_months: u32,
    /// When false, only already-settled movements inside the horizon are
    /// reported (no projected lines)
    pub include_forecast: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon_months: 3,
            include_forecast: true,
        }
    }
}

/// A computed indicator with its benchmark grade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedKpi {
    pub metric: String,
    pub value: f64,
    /// Unit label from the benchmark config (percent, currency, days, ...)
    pub unit: String,
    /// None when the metric has no configured benchmark ranges
    pub tier: Option<BenchmarkTier>,
}

/// Aggregate spend on one management account (dashboard top-expenses list)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub account_code: String,
    pub account_name: String,
    pub amount: f64,
}

/// Data backing the KPI dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub period: Period,
    pub gross_revenue: f64,
    pub net_revenue: f64,
    pub ebitda: f64,
    pub ebitda_pct: f64,
    pub cash_balance: f64,
    pub kpis: Vec<CalculatedKpi>,
    pub top_expenses: Vec<ExpenseSummary>,
}
