//! KPI aggregation engine
//!
//! Pulls the month's DRE, the open ledger, and the settled history into a
//! flat list of graded indicators. Every metric is guarded against empty
//! denominators (a month with no revenue yields 0, never NaN).

use chrono::NaiveDate;
use tracing::debug;

use crate::benchmark::BenchmarkConfig;
use crate::cache::{Cache, NS_REPORTS, REPORT_TTL};
use crate::context::RequestContext;
use crate::db::{Database, DateField, EntryFilter};
use crate::error::Result;
use crate::models::{round2, CostClass, EntryStatus, EntryType, LedgerEntry, Period};
use crate::reference::ReferenceResolver;

use super::dre::DreCalculator;
use super::pct;
use super::types::CalculatedKpi;

/// Earliest date the balance scan starts at; entries never predate it
fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date")
}

pub struct KpiEngine<'a> {
    db: &'a Database,
    cache: &'a Cache,
    benchmarks: &'a BenchmarkConfig,
}

impl<'a> KpiEngine<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache, benchmarks: &'a BenchmarkConfig) -> Self {
        Self {
            db,
            cache,
            benchmarks,
        }
    }

    /// Compute the full indicator set for a period.
    ///
    /// `today` anchors delinquency (overdue = due before today). Branch and
    /// channel narrow the underlying entry set; margins always come from the
    /// branch-level DRE since the income statement has no channel axis.
    pub fn calculate(
        &self,
        ctx: &RequestContext,
        period: Period,
        branch_id: Option<i64>,
        channel_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<Vec<CalculatedKpi>> {
        let key = format!(
            "kpi:{period}:{}:{}:{today}",
            branch_id.map_or("all".to_string(), |b| b.to_string()),
            channel_id.map_or("all".to_string(), |c| c.to_string()),
        );
        self.cache.get_or_load(NS_REPORTS, &key, REPORT_TTL, || {
            self.compute(ctx, period, branch_id, channel_id, today)
        })
    }

    fn compute(
        &self,
        ctx: &RequestContext,
        period: Period,
        branch_id: Option<i64>,
        channel_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<Vec<CalculatedKpi>> {
        let dre_calc = DreCalculator::new(self.db, self.cache, self.benchmarks);
        let dre = dre_calc.calculate(ctx, period, branch_id)?;
        let prev = dre_calc.calculate(ctx, period.prev(), branch_id)?;
        let s = &dre.summary;

        let realized = self.db.list_entries(
            &EntryFilter::new()
                .status(Some(EntryStatus::Realized))
                .branch_id(branch_id)
                .channel_id(channel_id)
                .date_range(DateField::Accrual, period.first_day(), period.last_day()),
        )?;
        let open = self.db.list_entries(
            &EntryFilter::new()
                .status(Some(EntryStatus::Forecast))
                .branch_id(branch_id)
                .channel_id(channel_id),
        )?;

        let receivables: Vec<&LedgerEntry> = realized
            .iter()
            .filter(|e| e.entry_type == EntryType::Receivable)
            .collect();
        let payables: Vec<&LedgerEntry> = realized
            .iter()
            .filter(|e| e.entry_type == EntryType::Payable)
            .collect();

        // discounts weighted over gross revenue
        let discount_sum: f64 = receivables.iter().map(|e| e.discount).sum();
        let avg_discount_pct = pct(discount_sum, s.gross_revenue);

        let resolver = ReferenceResolver::new(self.db, self.cache);
        let accounts = resolver.accounts()?;
        let class_sum = |class: CostClass| -> f64 {
            payables
                .iter()
                .filter(|e| {
                    accounts
                        .get(&e.management_account)
                        .and_then(|a| a.cost_class)
                        == Some(class)
                })
                .map(|e| e.net_amount)
                .sum()
        };
        let cma_pct = pct(class_sum(CostClass::Cma), s.net_revenue);
        let cmv_pct = pct(class_sum(CostClass::Cmv), s.net_revenue);

        let total_outflow = s.total_cost + s.operating_expense + s.financial_expense;
        let roi_pct = pct(s.net_income, total_outflow);

        // liquidity and delinquency look at the whole open ledger
        let open_receivables: f64 = open
            .iter()
            .filter(|e| e.entry_type == EntryType::Receivable)
            .map(|e| e.net_amount)
            .sum();
        let open_payables: f64 = open
            .iter()
            .filter(|e| e.entry_type == EntryType::Payable)
            .map(|e| e.net_amount)
            .sum();
        let current_liquidity = ratio(open_receivables, open_payables);

        let overdue: f64 = open
            .iter()
            .filter(|e| {
                e.entry_type == EntryType::Receivable
                    && e.due_date.is_some_and(|due| due < today)
            })
            .map(|e| e.net_amount)
            .sum();
        let delinquency_pct = pct(overdue, open_receivables);

        let cash_balance = self.cash_balance_through(period.last_day(), branch_id)?;
        let burn_rate = self.burn_in_period(period, branch_id)?;
        let runway_months = ratio(cash_balance, burn_rate);

        let growth_base = prev.summary.net_revenue;
        let revenue_growth_pct = pct(s.net_revenue - growth_base, growth_base);

        let sale_count = receivables.len() as f64;
        let average_ticket = if sale_count > 0.0 {
            round2(s.gross_revenue / sale_count)
        } else {
            0.0
        };

        // signed settlement lag: negative means early
        let avg_days_to_collect = avg_settlement_days(&receivables);
        let avg_days_to_pay = avg_settlement_days(&payables);

        let marketing_spend: f64 = payables
            .iter()
            .filter(|e| {
                accounts
                    .get(&e.management_account)
                    .map(|a| {
                        let hay = format!("{} {}", a.dre_group, a.name).to_lowercase();
                        hay.contains("marketing")
                    })
                    .unwrap_or(false)
            })
            .map(|e| e.net_amount)
            .sum();
        let cac = if sale_count > 0.0 {
            round2(marketing_spend / sale_count)
        } else {
            0.0
        };

        let opex_ratio_pct = pct(s.operating_expense, s.net_revenue);

        // revenue needed to cover operating expense at the current
        // contribution margin
        let contribution_ratio = if s.net_revenue == 0.0 {
            0.0
        } else {
            s.gross_margin / s.net_revenue
        };
        let break_even_revenue = if contribution_ratio > 0.0 {
            round2(s.operating_expense / contribution_ratio)
        } else {
            0.0
        };

        debug!(correlation = %ctx.correlation_id, %period, ?branch_id, ?channel_id, "computed KPI set");

        Ok(vec![
            self.kpi("gross_margin_pct", s.gross_margin_pct, "percent"),
            self.kpi("ebitda_pct", s.ebitda_pct, "percent"),
            self.kpi("net_margin_pct", s.net_margin_pct, "percent"),
            self.kpi("avg_discount_pct", avg_discount_pct, "percent"),
            self.kpi("cma_pct", cma_pct, "percent"),
            self.kpi("cmv_pct", cmv_pct, "percent"),
            self.kpi("roi_pct", roi_pct, "percent"),
            self.kpi("current_liquidity", current_liquidity, "ratio"),
            self.kpi("cash_balance", cash_balance, "currency"),
            self.kpi("burn_rate", burn_rate, "currency"),
            self.kpi("runway_months", runway_months, "months"),
            self.kpi("revenue_growth_pct", revenue_growth_pct, "percent"),
            self.kpi("average_ticket", average_ticket, "currency"),
            self.kpi("delinquency_pct", delinquency_pct, "percent"),
            self.kpi("avg_days_to_collect", avg_days_to_collect, "days"),
            self.kpi("avg_days_to_pay", avg_days_to_pay, "days"),
            self.kpi("cac", cac, "currency"),
            self.kpi("opex_ratio_pct", opex_ratio_pct, "percent"),
            self.kpi("break_even_revenue", break_even_revenue, "currency"),
        ])
    }

    fn kpi(&self, metric: &str, value: f64, unit: &str) -> CalculatedKpi {
        CalculatedKpi {
            metric: metric.to_string(),
            value,
            unit: unit.to_string(),
            tier: self.benchmarks.tier_for(metric, value),
        }
    }

    /// Net settled cash (inflows minus outflows) up to and including `to`
    pub(crate) fn cash_balance_through(
        &self,
        to: NaiveDate,
        branch_id: Option<i64>,
    ) -> Result<f64> {
        let entries = self.db.list_entries(
            &EntryFilter::new()
                .status(Some(EntryStatus::Realized))
                .branch_id(branch_id)
                .date_range(DateField::Payment, epoch(), to),
        )?;
        let balance = entries
            .iter()
            .map(|e| match e.entry_type {
                EntryType::Receivable => e.net_amount,
                EntryType::Payable => -e.net_amount,
                EntryType::Transfer | EntryType::Adjustment => 0.0,
            })
            .sum();
        Ok(round2(balance))
    }

    /// Cash paid out during the period (by payment date)
    fn burn_in_period(&self, period: Period, branch_id: Option<i64>) -> Result<f64> {
        let entries = self.db.list_entries(
            &EntryFilter::new()
                .status(Some(EntryStatus::Realized))
                .entry_type(Some(EntryType::Payable))
                .branch_id(branch_id)
                .date_range(DateField::Payment, period.first_day(), period.last_day()),
        )?;
        Ok(round2(entries.iter().map(|e| e.net_amount).sum()))
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        round2(value)
    } else {
        0.0
    }
}

/// Mean of (payment date − due date) in days; negative means settled early
fn avg_settlement_days(entries: &[&LedgerEntry]) -> f64 {
    let lags: Vec<i64> = entries
        .iter()
        .filter_map(|e| match (e.payment_date, e.due_date) {
            (Some(paid), Some(due)) => Some((paid - due).num_days()),
            _ => None,
        })
        .collect();
    if lags.is_empty() {
        return 0.0;
    }
    round2(lags.iter().sum::<i64>() as f64 / lags.len() as f64)
}
