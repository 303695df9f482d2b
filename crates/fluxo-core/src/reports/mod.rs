//! Derived financial reports
//!
//! DRE (management income statement), DFC (cash-flow statement), KPI
//! aggregation, and the dashboard view. All reports recompute from the
//! ledger on demand; results live in the short-TTL report cache and are
//! invalidated whenever a mutation touches the ledger.

mod cashflow;
mod dashboard;
mod dre;
mod kpi;
mod types;

pub use cashflow::CashflowCalculator;
pub use dashboard::DashboardBuilder;
pub use dre::DreCalculator;
pub use kpi::KpiEngine;
pub use types::{
    CalculatedKpi, CashDirection, CashflowLine, DashboardData, DreBucket, DreLine, DreStatement,
    DreSummary, ExpenseSummary, ForecastOptions,
};

/// Percentage of `part` over `whole`, rounded to 2 decimals; 0 when the
/// denominator is zero
pub(crate) fn pct(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let value = part / whole * 100.0;
    if value.is_finite() {
        crate::models::round2(value)
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::NaiveDate;

    use crate::db::Database;
    use crate::models::{
        round2, Account, AccountType, CashflowCategory, CostClass, EntryOrigin, EntryStatus,
        EntryType, FixedVariable, NewLedgerEntry,
    };

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn account(code: &str, account_type: AccountType, dre_group: &str) -> Account {
        Account {
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type,
            dre_group: dre_group.to_string(),
            dre_subgroup: None,
            cashflow_category: Some(CashflowCategory::Operating),
            fixed_variable: Some(FixedVariable::Variable),
            cost_class: None,
        }
    }

    pub fn cost_account(code: &str, cost_class: CostClass) -> Account {
        Account {
            cost_class: Some(cost_class),
            ..account(code, AccountType::Cost, "Custos Variáveis")
        }
    }

    /// Chart used by most report tests: one revenue, one cost, one
    /// operating-expense, and one financial-expense account, plus the
    /// branch the entry helpers point at.
    pub fn seed_chart(db: &Database) {
        db.upsert_branch("Matriz").unwrap();
        db.upsert_account(&account("3.1.1", AccountType::Revenue, "Receita Bruta"))
            .unwrap();
        db.upsert_account(&cost_account("4.1.1", CostClass::Cmv)).unwrap();
        db.upsert_account(&account("5.1.1", AccountType::Expense, "Despesas Administrativas"))
            .unwrap();
        db.upsert_account(&account("6.1.1", AccountType::Expense, "Despesas Financeiras"))
            .unwrap();
    }

    pub fn realized_entry(
        entry_type: EntryType,
        accrual: NaiveDate,
        account: &str,
        gross: f64,
        discount: f64,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            entry_type,
            status: EntryStatus::Realized,
            accrual_date: accrual,
            due_date: Some(accrual),
            payment_date: Some(accrual),
            branch_id: 1,
            cost_center_id: None,
            management_account: account.to_string(),
            accounting_account: None,
            revenue_group: None,
            channel_id: None,
            description: format!("{entry_type} on {account}"),
            gross_amount: gross,
            discount,
            interest: 0.0,
            penalty: 0.0,
            net_amount: round2(gross - discount),
            origin: EntryOrigin::Manual,
            notes: None,
        }
    }

    pub fn forecast_entry(
        entry_type: EntryType,
        accrual: NaiveDate,
        due: NaiveDate,
        account: &str,
        gross: f64,
    ) -> NewLedgerEntry {
        NewLedgerEntry {
            status: EntryStatus::Forecast,
            due_date: Some(due),
            payment_date: None,
            ..realized_entry(entry_type, accrual, account, gross, 0.0)
        }
    }
}
