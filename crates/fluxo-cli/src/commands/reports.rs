//! Report commands: DRE, cash flow, obligations timeline, KPIs, dashboard

use std::path::Path;

use anyhow::Result;
use chrono::Local;
use fluxo_core::{
    BenchmarkConfig, Cache, CashflowCalculator, DashboardBuilder, DreCalculator, ForecastOptions,
    KpiEngine, Period, RequestContext,
};

use crate::commands::{default_period, format_brl, open_db, truncate};

pub fn cmd_dre(
    db_path: &Path,
    period: Option<Period>,
    branch: Option<i64>,
    json: bool,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let benchmarks = BenchmarkConfig::load()?;
    let period = default_period(period);

    let ctx = RequestContext::new();
    let statement = DreCalculator::new(&db, &cache, &benchmarks).calculate(&ctx, period, branch)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&statement)?);
        return Ok(());
    }

    let s = &statement.summary;
    println!("📈 DRE {} {}", period, branch.map_or(String::new(), |b| format!("(branch {})", b)));
    println!();
    println!("  Gross revenue        {:>16}", format_brl(s.gross_revenue));
    println!("  (-) Deductions       {:>16}", format_brl(s.deductions));
    println!("  = Net revenue        {:>16}", format_brl(s.net_revenue));
    println!("  (-) Costs            {:>16}", format_brl(s.total_cost));
    println!(
        "  = Gross margin       {:>16}  ({:.2}% · {})",
        format_brl(s.gross_margin),
        s.gross_margin_pct,
        s.gross_margin_tier
    );
    println!("  (-) Operating exp.   {:>16}", format_brl(s.operating_expense));
    println!(
        "  = EBITDA             {:>16}  ({:.2}% · {})",
        format_brl(s.ebitda),
        s.ebitda_pct,
        s.ebitda_tier
    );
    println!("  (+) Financial result {:>16}", format_brl(s.financial_result));
    println!(
        "  = Net income         {:>16}  ({:.2}% · {})",
        format_brl(s.net_income),
        s.net_margin_pct,
        s.net_margin_tier
    );

    if !statement.unresolved_accounts.is_empty() {
        println!();
        println!(
            "⚠️  Unresolved accounts (counted as operating expense): {}",
            statement.unresolved_accounts.join(", ")
        );
    }

    Ok(())
}

pub fn cmd_cashflow(
    db_path: &Path,
    period: Option<Period>,
    months: u32,
    realized_only: bool,
    opening: f64,
    json: bool,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let period = default_period(period);
    let calc = CashflowCalculator::new(&db, &cache);
    let ctx = RequestContext::new();

    let options = ForecastOptions {
        horizon_months: months,
        include_forecast: !realized_only,
    };
    let lines = calc.forecast(&ctx, period, &options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }

    println!("💸 Cash flow from {} ({} month(s))", period, months);
    if lines.is_empty() {
        println!("   No movements in the horizon.");
        return Ok(());
    }

    println!();
    println!(
        "{:<10}  {:<3}  {:<10}  {:>14}  {:<4}  {}",
        "DATE", "DIR", "CATEGORY", "VALUE", "PROJ", "DESCRIPTION"
    );
    let mut balance = opening;
    for line in &lines {
        let signed = match line.direction {
            fluxo_core::CashDirection::In => line.value,
            fluxo_core::CashDirection::Out => -line.value,
        };
        balance += signed;
        println!(
            "{:<10}  {:<3}  {:<10}  {:>14}  {:<4}  {}",
            line.date,
            line.direction.as_str(),
            line.category.as_str(),
            format_brl(signed),
            if line.projected { "yes" } else { "" },
            truncate(&line.description, 36),
        );
    }

    let closing = calc.projected_balance(&ctx, opening, period)?;
    println!();
    println!("  Opening balance:           {:>14}", format_brl(opening));
    println!("  Projected closing (month): {:>14}", format_brl(closing));
    println!("  Horizon running balance:   {:>14}", format_brl(balance));

    Ok(())
}

pub fn cmd_timeline(db_path: &Path, days: i64, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let today = Local::now().date_naive();

    let ctx = RequestContext::new();
    let entries = CashflowCalculator::new(&db, &cache).future_timeline(&ctx, today, days)?;
    println!("📅 Obligations for the next {} days", days);
    if entries.is_empty() {
        println!("   Nothing due. 🎉");
        return Ok(());
    }

    println!();
    for e in &entries {
        let due = e.due_date.map_or("-".to_string(), |d| d.to_string());
        let overdue = e.due_date.is_some_and(|d| d < today);
        println!(
            "  {} {}  {:<10}  {:>14}  {}",
            if overdue { "🔴" } else { "  " },
            due,
            e.entry_type.as_str(),
            format_brl(e.net_amount),
            truncate(&e.description, 40),
        );
    }
    println!("\n{} open entries", entries.len());

    Ok(())
}

pub fn cmd_kpis(
    db_path: &Path,
    period: Option<Period>,
    branch: Option<i64>,
    channel: Option<i64>,
    json: bool,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let benchmarks = BenchmarkConfig::load()?;
    let period = default_period(period);
    let today = Local::now().date_naive();

    let ctx = RequestContext::new();
    let kpis =
        KpiEngine::new(&db, &cache, &benchmarks).calculate(&ctx, period, branch, channel, today)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&kpis)?);
        return Ok(());
    }

    println!("🎯 KPIs for {}", period);
    println!();
    println!("{:<22}  {:>14}  {:<8}  {}", "METRIC", "VALUE", "UNIT", "TIER");
    for kpi in &kpis {
        let value = match kpi.unit.as_str() {
            "currency" => format_brl(kpi.value),
            "percent" => format!("{:.2}%", kpi.value),
            _ => format!("{:.2}", kpi.value),
        };
        println!(
            "{:<22}  {:>14}  {:<8}  {}",
            kpi.metric,
            value,
            kpi.unit,
            kpi.tier.map_or("-".to_string(), |t| t.to_string()),
        );
    }

    Ok(())
}

pub fn cmd_dashboard(
    db_path: &Path,
    period: Option<Period>,
    branch: Option<i64>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let benchmarks = BenchmarkConfig::load()?;
    let period = default_period(period);
    let today = Local::now().date_naive();

    let ctx = RequestContext::new();
    let data = DashboardBuilder::new(&db, &cache, &benchmarks).build(&ctx, period, branch, today)?;

    println!("🏠 Dashboard {}", data.period);
    println!();
    println!("  Gross revenue  {:>16}", format_brl(data.gross_revenue));
    println!("  Net revenue    {:>16}", format_brl(data.net_revenue));
    println!(
        "  EBITDA         {:>16}  ({:.2}%)",
        format_brl(data.ebitda),
        data.ebitda_pct
    );
    println!("  Cash balance   {:>16}", format_brl(data.cash_balance));

    if !data.top_expenses.is_empty() {
        println!();
        println!("  Top expenses:");
        for expense in &data.top_expenses {
            println!(
                "    {:<10}  {:<28}  {:>14}",
                expense.account_code,
                truncate(&expense.account_name, 28),
                format_brl(expense.amount),
            );
        }
    }

    println!();
    println!("  Highlights:");
    for metric in ["net_margin_pct", "runway_months", "delinquency_pct"] {
        if let Some(kpi) = data.kpis.iter().find(|k| k.metric == metric) {
            println!(
                "    {:<20}  {:>10.2}  {}",
                kpi.metric,
                kpi.value,
                kpi.tier.map_or("-".to_string(), |t| t.to_string()),
            );
        }
    }

    Ok(())
}
