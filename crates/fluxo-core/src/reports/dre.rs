//! DRE (Demonstração do Resultado do Exercício) calculator
//!
//! Builds the management income statement for one period from realized
//! entries, classified through the account master data. The computation is
//! pure over its inputs; results are cached under the reports namespace.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::benchmark::BenchmarkConfig;
use crate::cache::{Cache, NS_REPORTS, REPORT_TTL};
use crate::context::RequestContext;
use crate::db::{Database, DateField, EntryFilter};
use crate::error::Result;
use crate::models::{round2, Account, AccountType, EntryStatus, EntryType, LedgerEntry, Period};
use crate::reference::ReferenceResolver;

use super::pct;
use super::types::{DreBucket, DreLine, DreStatement, DreSummary};

pub struct DreCalculator<'a> {
    db: &'a Database,
    cache: &'a Cache,
    benchmarks: &'a BenchmarkConfig,
}

impl<'a> DreCalculator<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache, benchmarks: &'a BenchmarkConfig) -> Self {
        Self {
            db,
            cache,
            benchmarks,
        }
    }

    /// Compute (or fetch from cache) the income statement for a period.
    ///
    /// `branch_id = None` aggregates all branches. Only realized entries
    /// participate; the accrual date decides period membership.
    pub fn calculate(
        &self,
        ctx: &RequestContext,
        period: Period,
        branch_id: Option<i64>,
    ) -> Result<DreStatement> {
        debug!(correlation = %ctx.correlation_id, %period, ?branch_id, "DRE requested");
        let key = match branch_id {
            Some(id) => format!("dre:{period}:{id}"),
            None => format!("dre:{period}:all"),
        };
        self.cache.get_or_load(NS_REPORTS, &key, REPORT_TTL, || {
            self.compute(period, branch_id)
        })
    }

    fn compute(&self, period: Period, branch_id: Option<i64>) -> Result<DreStatement> {
        let filter = EntryFilter::new()
            .status(Some(EntryStatus::Realized))
            .branch_id(branch_id)
            .date_range(DateField::Accrual, period.first_day(), period.last_day());
        let entries = self.db.list_entries(&filter)?;

        let resolver = ReferenceResolver::new(self.db, self.cache);
        let accounts = resolver.accounts()?;

        debug!(%period, ?branch_id, entries = entries.len(), "computing DRE");
        Ok(build_statement(period, branch_id, &entries, &accounts, self.benchmarks))
    }
}

/// Pure assembly of the statement from already-loaded rows
fn build_statement(
    period: Period,
    branch_id: Option<i64>,
    entries: &[LedgerEntry],
    accounts: &HashMap<String, Account>,
    benchmarks: &BenchmarkConfig,
) -> DreStatement {
    let mut lines = Vec::new();
    let mut unresolved = Vec::new();

    let mut gross_revenue = 0.0;
    let mut deductions = 0.0;
    let mut total_cost = 0.0;
    let mut operating_expense = 0.0;
    let mut financial_revenue = 0.0;
    let mut financial_expense = 0.0;

    for entry in entries {
        let account = accounts.get(&entry.management_account);
        match entry.entry_type {
            EntryType::Receivable => {
                gross_revenue += entry.gross_amount;
                deductions += entry.discount;
                let bucket = if account.is_some_and(is_financial) {
                    financial_revenue += entry.net_amount;
                    DreBucket::FinancialRevenue
                } else {
                    DreBucket::Revenue
                };
                lines.push(line(bucket, entry, entry.gross_amount));
            }
            EntryType::Payable => {
                let bucket = match account {
                    Some(account) if is_cost(account) => {
                        total_cost += entry.net_amount;
                        DreBucket::Cost
                    }
                    Some(account) if is_financial(account) => {
                        financial_expense += entry.net_amount;
                        DreBucket::FinancialExpense
                    }
                    Some(_) => {
                        operating_expense += entry.net_amount;
                        DreBucket::OperatingExpense
                    }
                    None => {
                        warn!(
                            account = %entry.management_account,
                            entry = entry.id,
                            "account missing from master data, counting as operating expense"
                        );
                        unresolved.push(entry.management_account.clone());
                        operating_expense += entry.net_amount;
                        DreBucket::OperatingExpense
                    }
                };
                lines.push(line(bucket, entry, entry.net_amount));
            }
            // Transfers and adjustments move cash around without touching
            // the result
            EntryType::Transfer | EntryType::Adjustment => {}
        }
    }

    lines.sort_by(|a, b| {
        bucket_order(a.bucket)
            .cmp(&bucket_order(b.bucket))
            .then_with(|| a.account_code.cmp(&b.account_code))
    });
    unresolved.sort();
    unresolved.dedup();

    let net_revenue = round2(gross_revenue - deductions);
    let gross_margin = round2(net_revenue - total_cost);
    let gross_margin_pct = pct(gross_margin, net_revenue);
    let ebitda = round2(gross_margin - operating_expense);
    let ebitda_pct = pct(ebitda, net_revenue);
    let financial_result = round2(financial_revenue - financial_expense);
    let net_income = round2(ebitda + financial_result);
    let net_margin_pct = pct(net_income, net_revenue);

    let summary = DreSummary {
        gross_revenue: round2(gross_revenue),
        deductions: round2(deductions),
        net_revenue,
        total_cost: round2(total_cost),
        gross_margin,
        gross_margin_pct,
        operating_expense: round2(operating_expense),
        ebitda,
        ebitda_pct,
        financial_revenue: round2(financial_revenue),
        financial_expense: round2(financial_expense),
        financial_result,
        net_income,
        net_margin_pct,
        gross_margin_tier: benchmarks.margin_tier("gross_margin_pct", gross_margin_pct),
        ebitda_tier: benchmarks.margin_tier("ebitda_pct", ebitda_pct),
        net_margin_tier: benchmarks.margin_tier("net_margin_pct", net_margin_pct),
    };

    DreStatement {
        period,
        branch_id,
        lines,
        summary,
        unresolved_accounts: unresolved,
    }
}

fn line(bucket: DreBucket, entry: &LedgerEntry, amount: f64) -> DreLine {
    DreLine {
        bucket,
        account_code: entry.management_account.clone(),
        description: entry.description.clone(),
        amount: round2(amount),
    }
}

fn bucket_order(bucket: DreBucket) -> u8 {
    match bucket {
        DreBucket::Revenue => 0,
        DreBucket::Cost => 1,
        DreBucket::OperatingExpense => 2,
        DreBucket::FinancialRevenue => 3,
        DreBucket::FinancialExpense => 4,
    }
}

fn is_cost(account: &Account) -> bool {
    account.cost_class.is_some()
        || account.account_type == AccountType::Cost
        || mentions(&account.dre_group, &["custo", "cost"])
}

fn is_financial(account: &Account) -> bool {
    mentions(&account.dre_group, &["financeir", "financial"])
}

fn mentions(group: &str, needles: &[&str]) -> bool {
    let lower = group.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::BenchmarkTier;
    use crate::models::EntryType;
    use crate::reports::testutil::{date, realized_entry, seed_chart};

    fn setup() -> (Database, Cache, BenchmarkConfig) {
        let db = Database::in_memory().unwrap();
        seed_chart(&db);
        (db, Cache::new(), BenchmarkConfig::embedded().unwrap())
    }

    fn period() -> Period {
        Period::new(2025, 3).unwrap()
    }

    fn ctx() -> crate::context::RequestContext {
        crate::context::RequestContext::new()
    }

    #[test]
    fn statement_for_simple_month() {
        let (db, cache, benchmarks) = setup();
        // revenue 10_000 with 500 discount, cost 3_000, opex 2_000,
        // financial expense 300
        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 3, 10),
            "3.1.1",
            10_000.0,
            500.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 3, 12),
            "4.1.1",
            3_000.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 3, 15),
            "5.1.1",
            2_000.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 3, 20),
            "6.1.1",
            300.0,
            0.0,
        ))
        .unwrap();

        let calc = DreCalculator::new(&db, &cache, &benchmarks);
        let statement = calc.calculate(&ctx(), period(), None).unwrap();
        let s = &statement.summary;

        assert_eq!(s.gross_revenue, 10_000.0);
        assert_eq!(s.deductions, 500.0);
        assert_eq!(s.net_revenue, 9_500.0);
        assert_eq!(s.total_cost, 3_000.0);
        assert_eq!(s.gross_margin, 6_500.0);
        assert_eq!(s.gross_margin_pct, 68.42);
        assert_eq!(s.operating_expense, 2_000.0);
        assert_eq!(s.ebitda, 4_500.0);
        assert_eq!(s.ebitda_pct, 47.37);
        assert_eq!(s.financial_result, -300.0);
        assert_eq!(s.net_income, 4_200.0);
        assert_eq!(s.net_margin_pct, 44.21);
        assert!(statement.unresolved_accounts.is_empty());
        assert_eq!(statement.lines.len(), 4);
    }

    #[test]
    fn empty_period_yields_zeroed_summary() {
        let (db, cache, benchmarks) = setup();
        let calc = DreCalculator::new(&db, &cache, &benchmarks);
        let statement = calc.calculate(&ctx(), period(), None).unwrap();

        assert_eq!(statement.summary.net_revenue, 0.0);
        assert_eq!(statement.summary.gross_margin_pct, 0.0);
        assert_eq!(statement.summary.net_margin_pct, 0.0);
        assert!(statement.lines.is_empty());
    }

    #[test]
    fn unresolved_account_lands_in_opex_with_warning() {
        let (db, cache, benchmarks) = setup();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 3, 5),
            "9.9.9",
            1_000.0,
            0.0,
        ))
        .unwrap();

        let calc = DreCalculator::new(&db, &cache, &benchmarks);
        let statement = calc.calculate(&ctx(), period(), None).unwrap();

        assert_eq!(statement.summary.operating_expense, 1_000.0);
        assert_eq!(statement.unresolved_accounts, vec!["9.9.9".to_string()]);
        assert_eq!(statement.lines[0].bucket, DreBucket::OperatingExpense);
    }

    #[test]
    fn forecast_entries_are_excluded() {
        let (db, cache, benchmarks) = setup();
        db.insert_entry(&crate::reports::testutil::forecast_entry(
            EntryType::Receivable,
            date(2025, 3, 1),
            date(2025, 3, 20),
            "3.1.1",
            5_000.0,
        ))
        .unwrap();

        let calc = DreCalculator::new(&db, &cache, &benchmarks);
        let statement = calc.calculate(&ctx(), period(), None).unwrap();
        assert_eq!(statement.summary.gross_revenue, 0.0);
    }

    #[test]
    fn branch_filter_narrows_the_statement() {
        let (db, cache, benchmarks) = setup();
        let branch2 = db.upsert_branch("Filial Sul").unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 3, 2),
            "3.1.1",
            1_000.0,
            0.0,
        ))
        .unwrap();
        let mut other = realized_entry(EntryType::Receivable, date(2025, 3, 3), "3.1.1", 700.0, 0.0);
        other.branch_id = branch2;
        db.insert_entry(&other).unwrap();

        let calc = DreCalculator::new(&db, &cache, &benchmarks);
        assert_eq!(
            calc.calculate(&ctx(), period(), None).unwrap().summary.gross_revenue,
            1_700.0
        );
        assert_eq!(
            calc.calculate(&ctx(), period(), Some(branch2))
                .unwrap()
                .summary
                .gross_revenue,
            700.0
        );
    }

    #[test]
    fn margins_carry_benchmark_tiers() {
        let (db, cache, benchmarks) = setup();
        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 3, 1),
            "3.1.1",
            10_000.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 3, 2),
            "4.1.1",
            2_000.0,
            0.0,
        ))
        .unwrap();

        let calc = DreCalculator::new(&db, &cache, &benchmarks);
        let summary = calc.calculate(&ctx(), period(), None).unwrap().summary;
        // 80% gross margin sits in the top range of the default config
        assert_eq!(summary.gross_margin_tier, BenchmarkTier::Sensational);
    }
}
