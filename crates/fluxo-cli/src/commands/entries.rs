//! Ledger entry commands (add, list, settle, cancel)

use std::path::Path;

use anyhow::{anyhow, Result};
use fluxo_core::models::round2;
use fluxo_core::{
    Cache, DateField, EntryFilter, EntryOrigin, EntryStatus, EntryType, LedgerOps, LockManager,
    NewLedgerEntry, RequestContext,
};

use crate::cli::EntryAction;
use crate::commands::{format_brl, open_db, truncate};

pub fn cmd_entry(db_path: &Path, action: EntryAction, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let locks = LockManager::new();
    let ops = LedgerOps::new(&db, &cache, &locks);
    let ctx = RequestContext::new();

    match action {
        EntryAction::Add {
            entry_type,
            accrual,
            due,
            paid,
            account,
            branch,
            channel,
            cost_center,
            description,
            gross,
            discount,
            interest,
            penalty,
            notes,
        } => {
            let entry_type: EntryType = entry_type.parse().map_err(|e: String| anyhow!(e))?;
            let status = if paid.is_some() {
                EntryStatus::Realized
            } else {
                EntryStatus::Forecast
            };
            let entry = NewLedgerEntry {
                entry_type,
                status,
                accrual_date: accrual,
                due_date: due,
                payment_date: paid,
                branch_id: branch,
                cost_center_id: cost_center,
                management_account: account,
                accounting_account: None,
                revenue_group: None,
                channel_id: channel,
                description,
                gross_amount: gross,
                discount,
                interest,
                penalty,
                net_amount: round2(gross - discount + interest + penalty),
                origin: EntryOrigin::Manual,
                notes,
            };
            let id = ops.create_entry(&ctx, &entry)?;
            println!(
                "✅ Entry {} created: {} {} ({})",
                id,
                entry.entry_type,
                format_brl(entry.net_amount),
                entry.status
            );
        }

        EntryAction::List {
            status,
            entry_type,
            branch,
            account,
            from,
            to,
        } => {
            let mut filter = EntryFilter::new()
                .branch_id(branch)
                .management_account(account);
            if let Some(s) = status {
                let status: EntryStatus = s.parse().map_err(|e: String| anyhow!(e))?;
                filter = filter.status(Some(status));
            }
            if let Some(t) = entry_type {
                let entry_type: EntryType = t.parse().map_err(|e: String| anyhow!(e))?;
                filter = filter.entry_type(Some(entry_type));
            }
            if let (Some(from), Some(to)) = (from, to) {
                filter = filter.date_range(DateField::Accrual, from, to);
            }

            let entries = db.list_entries(&filter)?;
            if entries.is_empty() {
                println!("No entries found.");
                return Ok(());
            }

            println!(
                "{:>6}  {:<10}  {:<8}  {:<10}  {:<10}  {:<9}  {:>14}  {}",
                "ID", "TYPE", "STATUS", "ACCRUAL", "DUE", "ACCOUNT", "NET", "DESCRIPTION"
            );
            for e in &entries {
                println!(
                    "{:>6}  {:<10}  {:<8}  {:<10}  {:<10}  {:<9}  {:>14}  {}",
                    e.id,
                    e.entry_type.as_str(),
                    e.status.as_str(),
                    e.accrual_date,
                    e.due_date.map_or("-".to_string(), |d| d.to_string()),
                    e.management_account,
                    format_brl(e.net_amount),
                    truncate(&e.description, 38),
                );
            }
            println!("\n{} entries", entries.len());
        }

        EntryAction::Settle {
            id,
            date,
            interest,
            penalty,
        } => {
            let outcome = ops.settle(&ctx, id, date, interest, penalty)?;
            if outcome.success {
                println!("✅ {}", outcome.message);
            } else {
                println!("⚠️  {}", outcome.message);
            }
        }

        EntryAction::Cancel { id } => {
            let outcome = ops.cancel(&ctx, id)?;
            if outcome.success {
                println!("✅ {}", outcome.message);
            } else {
                println!("⚠️  {}", outcome.message);
            }
        }
    }

    Ok(())
}
