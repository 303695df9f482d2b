//! DFC (Demonstração do Fluxo de Caixa) calculator
//!
//! Realized view reads settled entries by payment date; the forecast view
//! layers still-open forecast entries (by due date) on top. Transfers and
//! adjustments never show up here, they shuffle cash without being a flow.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::cache::{Cache, NS_REPORTS, REPORT_TTL};
use crate::context::RequestContext;
use crate::db::{Database, DateField, EntryFilter};
use crate::error::Result;
use crate::models::{round2, CashflowCategory, EntryStatus, EntryType, LedgerEntry, Period};
use crate::reference::ReferenceResolver;

use super::types::{CashDirection, CashflowLine, ForecastOptions};

pub struct CashflowCalculator<'a> {
    db: &'a Database,
    cache: &'a Cache,
}

impl<'a> CashflowCalculator<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache) -> Self {
        Self { db, cache }
    }

    /// Settled cash movements for one period, ordered by payment date
    pub fn realized(&self, ctx: &RequestContext, period: Period) -> Result<Vec<CashflowLine>> {
        debug!(correlation = %ctx.correlation_id, %period, "cash-flow statement requested");
        let key = format!("dfc:{period}");
        self.cache.get_or_load(NS_REPORTS, &key, REPORT_TTL, || {
            self.realized_between(period.first_day(), period.last_day())
        })
    }

    /// Forecast statement: realized movements inside the horizon plus, when
    /// requested, open forecast entries projected at their due date.
    pub fn forecast(
        &self,
        ctx: &RequestContext,
        start: Period,
        options: &ForecastOptions,
    ) -> Result<Vec<CashflowLine>> {
        let months = options.horizon_months.max(1);
        let end = start.range(months).last().copied().unwrap_or(start);
        let from = start.first_day();
        let to = end.last_day();

        let mut lines = self.realized_between(from, to)?;
        if options.include_forecast {
            let filter = EntryFilter::new()
                .status(Some(EntryStatus::Forecast))
                .date_range(DateField::Due, from, to);
            let entries = self.db.list_entries(&filter)?;
            let categories = self.category_map()?;
            for entry in &entries {
                if let Some(line) = projected_line(entry, &categories) {
                    lines.push(line);
                }
            }
        }
        lines.sort_by(|a, b| a.date.cmp(&b.date));
        debug!(
            correlation = %ctx.correlation_id,
            %start,
            months,
            lines = lines.len(),
            "computed cash-flow forecast"
        );
        Ok(lines)
    }

    /// Closing balance projected from an opening balance over one period
    pub fn projected_balance(
        &self,
        ctx: &RequestContext,
        opening: f64,
        period: Period,
    ) -> Result<f64> {
        let lines = self.forecast(ctx, period, &ForecastOptions {
            horizon_months: 1,
            include_forecast: true,
        })?;
        let delta: f64 = lines
            .iter()
            .map(|l| match l.direction {
                CashDirection::In => l.value,
                CashDirection::Out => -l.value,
            })
            .sum();
        Ok(round2(opening + delta))
    }

    /// Open forecast entries due inside the next `horizon_days`, nearest
    /// first. Feeds the obligations timeline.
    pub fn future_timeline(
        &self,
        ctx: &RequestContext,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<LedgerEntry>> {
        debug!(correlation = %ctx.correlation_id, %today, horizon_days, "timeline requested");
        let to = today + chrono::Days::new(horizon_days.max(0) as u64);
        let filter = EntryFilter::new()
            .status(Some(EntryStatus::Forecast))
            .date_range(DateField::Due, today, to);
        let mut entries = self.db.list_entries(&filter)?;
        entries.retain(|e| !matches!(e.entry_type, EntryType::Transfer | EntryType::Adjustment));
        entries.sort_by_key(|e| e.due_date);
        Ok(entries)
    }

    fn realized_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CashflowLine>> {
        let filter = EntryFilter::new()
            .status(Some(EntryStatus::Realized))
            .date_range(DateField::Payment, from, to);
        let entries = self.db.list_entries(&filter)?;
        let categories = self.category_map()?;
        let banks = self.bank_account_map()?;

        let mut lines = Vec::new();
        for entry in &entries {
            let Some(direction) = direction_of(entry.entry_type) else {
                continue;
            };
            // payment filter already excludes null payment dates
            let Some(date) = entry.payment_date else {
                continue;
            };
            lines.push(CashflowLine {
                date,
                direction,
                category: categories
                    .get(&entry.management_account)
                    .copied()
                    .unwrap_or(CashflowCategory::Operating),
                description: entry.description.clone(),
                value: round2(entry.net_amount),
                projected: false,
                bank_account: entry
                    .linked_statement_id
                    .and_then(|id| banks.get(&id).cloned()),
            });
        }
        lines.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(lines)
    }

    fn category_map(&self) -> Result<HashMap<String, CashflowCategory>> {
        let resolver = ReferenceResolver::new(self.db, self.cache);
        Ok(resolver
            .accounts()?
            .into_iter()
            .filter_map(|(code, account)| account.cashflow_category.map(|c| (code, c)))
            .collect())
    }

    fn bank_account_map(&self) -> Result<HashMap<i64, String>> {
        let lines = self.db.list_statement_lines(Some(true))?;
        Ok(lines.into_iter().map(|l| (l.id, l.bank_account)).collect())
    }
}

fn direction_of(entry_type: EntryType) -> Option<CashDirection> {
    match entry_type {
        EntryType::Receivable => Some(CashDirection::In),
        EntryType::Payable => Some(CashDirection::Out),
        EntryType::Transfer | EntryType::Adjustment => None,
    }
}

fn projected_line(
    entry: &LedgerEntry,
    categories: &HashMap<String, CashflowCategory>,
) -> Option<CashflowLine> {
    let direction = direction_of(entry.entry_type)?;
    let date = entry.due_date?;
    Some(CashflowLine {
        date,
        direction,
        category: categories
            .get(&entry.management_account)
            .copied()
            .unwrap_or(CashflowCategory::Operating),
        description: entry.description.clone(),
        value: round2(entry.net_amount),
        projected: true,
        bank_account: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::testutil::{date, forecast_entry, realized_entry, seed_chart};

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    fn setup() -> (Database, Cache) {
        let db = Database::in_memory().unwrap();
        seed_chart(&db);
        (db, Cache::new())
    }

    #[test]
    fn realized_lines_follow_payment_date() {
        let (db, cache) = setup();
        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 4, 10),
            "3.1.1",
            1_200.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&realized_entry(
            EntryType::Payable,
            date(2025, 4, 5),
            "5.1.1",
            400.0,
            0.0,
        ))
        .unwrap();

        let calc = CashflowCalculator::new(&db, &cache);
        let lines = calc.realized(&ctx(), Period::new(2025, 4).unwrap()).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].date, date(2025, 4, 5));
        assert_eq!(lines[0].direction, CashDirection::Out);
        assert_eq!(lines[1].direction, CashDirection::In);
        assert!(lines.iter().all(|l| !l.projected));
    }

    #[test]
    fn forecast_layers_projected_lines() {
        let (db, cache) = setup();
        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 4, 3),
            "3.1.1",
            500.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&forecast_entry(
            EntryType::Payable,
            date(2025, 4, 1),
            date(2025, 5, 15),
            "5.1.1",
            300.0,
        ))
        .unwrap();

        let calc = CashflowCalculator::new(&db, &cache);
        let options = ForecastOptions {
            horizon_months: 2,
            include_forecast: true,
        };
        let lines = calc.forecast(&ctx(), Period::new(2025, 4).unwrap(), &options).unwrap();

        assert_eq!(lines.len(), 2);
        assert!(!lines[0].projected);
        assert!(lines[1].projected);
        assert_eq!(lines[1].date, date(2025, 5, 15));

        let realized_only = calc
            .forecast(
                &ctx(),
                Period::new(2025, 4).unwrap(),
                &ForecastOptions {
                    horizon_months: 2,
                    include_forecast: false,
                },
            )
            .unwrap();
        assert_eq!(realized_only.len(), 1);
    }

    #[test]
    fn projected_balance_folds_directions() {
        let (db, cache) = setup();
        db.insert_entry(&realized_entry(
            EntryType::Receivable,
            date(2025, 4, 2),
            "3.1.1",
            1_000.0,
            0.0,
        ))
        .unwrap();
        db.insert_entry(&forecast_entry(
            EntryType::Payable,
            date(2025, 4, 1),
            date(2025, 4, 25),
            "5.1.1",
            250.0,
        ))
        .unwrap();

        let calc = CashflowCalculator::new(&db, &cache);
        let balance = calc
            .projected_balance(&ctx(), 100.0, Period::new(2025, 4).unwrap())
            .unwrap();
        assert_eq!(balance, 850.0);
    }

    #[test]
    fn transfers_never_reach_the_statement() {
        let (db, cache) = setup();
        let mut transfer =
            realized_entry(EntryType::Transfer, date(2025, 4, 8), "5.1.1", 900.0, 0.0);
        transfer.description = "move to savings".into();
        db.insert_entry(&transfer).unwrap();

        let calc = CashflowCalculator::new(&db, &cache);
        let lines = calc.realized(&ctx(), Period::new(2025, 4).unwrap()).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn timeline_orders_by_due_date_within_horizon() {
        let (db, cache) = setup();
        let today = date(2025, 4, 1);
        db.insert_entry(&forecast_entry(
            EntryType::Payable,
            today,
            date(2025, 4, 20),
            "5.1.1",
            100.0,
        ))
        .unwrap();
        db.insert_entry(&forecast_entry(
            EntryType::Receivable,
            today,
            date(2025, 4, 5),
            "3.1.1",
            200.0,
        ))
        .unwrap();
        // outside the horizon
        db.insert_entry(&forecast_entry(
            EntryType::Payable,
            today,
            date(2025, 8, 1),
            "5.1.1",
            50.0,
        ))
        .unwrap();

        let calc = CashflowCalculator::new(&db, &cache);
        let entries = calc.future_timeline(&ctx(), today, 30).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].due_date, Some(date(2025, 4, 5)));
        assert_eq!(entries[1].due_date, Some(date(2025, 4, 20)));
    }
}
