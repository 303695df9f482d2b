//! Dashboard aggregation: the month at a glance
//!
//! Headline DRE figures, settled cash position, the full KPI set, and the
//! five largest expense accounts, assembled into one payload.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::benchmark::BenchmarkConfig;
use crate::cache::{Cache, NS_REPORTS, REPORT_TTL};
use crate::context::RequestContext;
use crate::db::{Database, DateField, EntryFilter};
use crate::error::Result;
use crate::models::{round2, EntryStatus, EntryType, Period};
use crate::reference::ReferenceResolver;

use super::dre::DreCalculator;
use super::kpi::KpiEngine;
use super::types::{DashboardData, ExpenseSummary};

const TOP_EXPENSES: usize = 5;

pub struct DashboardBuilder<'a> {
    db: &'a Database,
    cache: &'a Cache,
    benchmarks: &'a BenchmarkConfig,
}

impl<'a> DashboardBuilder<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache, benchmarks: &'a BenchmarkConfig) -> Self {
        Self {
            db,
            cache,
            benchmarks,
        }
    }

    pub fn build(
        &self,
        ctx: &RequestContext,
        period: Period,
        branch_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<DashboardData> {
        let key = format!(
            "dashboard:{period}:{}:{today}",
            branch_id.map_or("all".to_string(), |b| b.to_string()),
        );
        self.cache.get_or_load(NS_REPORTS, &key, REPORT_TTL, || {
            self.compute(ctx, period, branch_id, today)
        })
    }

    fn compute(
        &self,
        ctx: &RequestContext,
        period: Period,
        branch_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<DashboardData> {
        let dre = DreCalculator::new(self.db, self.cache, self.benchmarks)
            .calculate(ctx, period, branch_id)?;
        let engine = KpiEngine::new(self.db, self.cache, self.benchmarks);
        let kpis = engine.calculate(ctx, period, branch_id, None, today)?;
        let cash_balance = engine.cash_balance_through(period.last_day(), branch_id)?;

        Ok(DashboardData {
            period,
            gross_revenue: dre.summary.gross_revenue,
            net_revenue: dre.summary.net_revenue,
            ebitda: dre.summary.ebitda,
            ebitda_pct: dre.summary.ebitda_pct,
            cash_balance,
            kpis,
            top_expenses: self.top_expenses(period, branch_id)?,
        })
    }

    /// Largest expense accounts of the period by settled net amount
    fn top_expenses(&self, period: Period, branch_id: Option<i64>) -> Result<Vec<ExpenseSummary>> {
        let entries = self.db.list_entries(
            &EntryFilter::new()
                .status(Some(EntryStatus::Realized))
                .entry_type(Some(EntryType::Payable))
                .branch_id(branch_id)
                .date_range(DateField::Accrual, period.first_day(), period.last_day()),
        )?;

        let mut by_account: HashMap<String, f64> = HashMap::new();
        for entry in &entries {
            *by_account.entry(entry.management_account.clone()).or_insert(0.0) +=
                entry.net_amount;
        }

        let accounts = ReferenceResolver::new(self.db, self.cache).accounts()?;
        let mut summaries: Vec<ExpenseSummary> = by_account
            .into_iter()
            .map(|(code, amount)| ExpenseSummary {
                account_name: accounts
                    .get(&code)
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| code.clone()),
                account_code: code,
                amount: round2(amount),
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.account_code.cmp(&b.account_code))
        });
        summaries.truncate(TOP_EXPENSES);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::testutil::{date, realized_entry, seed_chart};

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    #[test]
    fn dashboard_assembles_headline_numbers() {
        let db = Database::in_memory().unwrap();
        seed_chart(&db);
        let cache = Cache::new();
        let benchmarks = BenchmarkConfig::embedded().unwrap();

        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 7, 5),
            "3.1.1",
            5_000.0,
            200.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 7, 8),
            "5.1.1",
            1_500.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 7, 9),
            "4.1.1",
            900.0,
            0.0,
        ))
        .unwrap();

        let builder = DashboardBuilder::new(&db, &cache, &benchmarks);
        let data = builder
            .build(&ctx(), Period::new(2025, 7).unwrap(), None, date(2025, 7, 31))
            .unwrap();

        assert_eq!(data.gross_revenue, 5_000.0);
        assert_eq!(data.net_revenue, 4_800.0);
        assert_eq!(data.cash_balance, 2_400.0);
        assert!(!data.kpis.is_empty());
        assert_eq!(data.top_expenses.len(), 2);
        assert_eq!(data.top_expenses[0].account_code, "5.1.1");
        assert_eq!(data.top_expenses[0].amount, 1_500.0);
    }

    #[test]
    fn top_expenses_capped_at_five() {
        let db = Database::in_memory().unwrap();
        seed_chart(&db);
        let cache = Cache::new();
        let benchmarks = BenchmarkConfig::embedded().unwrap();

        for i in 0..7 {
            let code = format!("5.9.{i}");
            db.upsert_account(&crate::reports::testutil::account(
                &code,
                crate::models::AccountType::Expense,
                "Despesas Gerais",
            ))
            .unwrap();
            db.insert_entry(&realized_entry(
                EntryType::Payable,
                date(2025, 7, 10),
                &code,
                100.0 + i as f64,
                0.0,
            ))
            .unwrap();
        }

        let builder = DashboardBuilder::new(&db, &cache, &benchmarks);
        let data = builder
            .build(&ctx(), Period::new(2025, 7).unwrap(), None, date(2025, 7, 31))
            .unwrap();
        assert_eq!(data.top_expenses.len(), 5);
        assert_eq!(data.top_expenses[0].account_code, "5.9.6");
    }
}
