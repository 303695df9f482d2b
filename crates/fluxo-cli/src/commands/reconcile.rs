//! Reconciliation commands

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use fluxo_core::{Cache, Reconciler, RequestContext, RunBudget};

use crate::cli::ReconcileAction;
use crate::commands::{format_brl, open_db, truncate};

/// Wall-clock budget for the bulk pass
const BULK_BUDGET: Duration = Duration::from_secs(240);
const BULK_MARGIN: Duration = Duration::from_secs(30);

pub fn cmd_reconcile(db_path: &Path, action: ReconcileAction, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let cache = Cache::new();
    let reconciler = Reconciler::new(&db, &cache);
    let ctx = RequestContext::new();

    match action {
        ReconcileAction::Suggest { statement_id } => {
            let suggestions = reconciler.suggest_matches(&ctx, statement_id)?;
            if suggestions.is_empty() {
                println!("No candidates for statement line {}.", statement_id);
                return Ok(());
            }
            println!("🔍 Candidates for statement line {}:", statement_id);
            println!();
            println!(
                "{:>6}  {:>10}  {:>14}  {}",
                "ENTRY", "CONFIDENCE", "AMOUNT", "DESCRIPTION"
            );
            for s in &suggestions {
                println!(
                    "{:>6}  {:>9}%  {:>14}  {}",
                    s.entry_id,
                    s.confidence,
                    format_brl(s.amount),
                    truncate(&s.entry_description, 38),
                );
                println!("{:>35}{}", "", s.reason);
            }
        }

        ReconcileAction::Auto => {
            println!("🤝 Auto-reconciling...");
            let result = reconciler.auto_reconcile(&ctx)?;
            println!(
                "✅ Scanned {} lines: {} linked, {} contested, {} failed",
                result.scanned, result.linked, result.contested, result.failed
            );
            if result.contested > 0 {
                println!("   Review contested lines with: fluxo reconcile suggest <id>");
            }
        }

        ReconcileAction::Bulk => {
            println!("🧮 Bulk reconciliation by exact amount...");
            let mut budget = RunBudget::new(BULK_BUDGET, BULK_MARGIN);
            let result = reconciler.bulk_reconcile(&ctx, &mut budget)?;
            println!(
                "✅ {} pools processed, {} lines linked, {} failed",
                result.pools, result.linked, result.failed
            );
        }

        ReconcileAction::Link {
            statement_id,
            entry_id,
        } => {
            reconciler.link(&ctx, statement_id, entry_id)?;
            println!("✅ Statement line {} linked to entry {}", statement_id, entry_id);
        }

        ReconcileAction::Unlink { statement_id } => {
            reconciler.unlink(&ctx, statement_id)?;
            println!("✅ Statement line {} unlinked", statement_id);
        }

        ReconcileAction::Pending => {
            let lines = db.list_statement_lines(Some(false))?;
            if lines.is_empty() {
                println!("All statement lines are reconciled. 🎉");
                return Ok(());
            }
            println!(
                "{:>6}  {:<10}  {:<12}  {:>14}  {}",
                "ID", "DATE", "ACCOUNT", "AMOUNT", "MEMO"
            );
            for line in &lines {
                println!(
                    "{:>6}  {:<10}  {:<12}  {:>14}  {}",
                    line.id,
                    line.movement_date,
                    line.bank_account,
                    format_brl(line.amount),
                    truncate(&line.memo, 40),
                );
            }
            println!("\n{} pending lines", lines.len());
        }
    }

    Ok(())
}
