//! Master data commands: accounts, branches, channels, cost centers

use std::path::Path;

use anyhow::{anyhow, Result};
use fluxo_core::{
    Account, AccountType, Cache, CashflowCategory, CostClass, Database, FixedVariable, LedgerOps,
    LockManager, RequestContext,
};

use crate::cli::{AccountAction, RefAction};
use crate::commands::open_db;

pub fn cmd_account(db_path: &Path, action: Option<AccountAction>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(AccountAction::List) {
        AccountAction::Add {
            code,
            name,
            account_type,
            group,
            subgroup,
            cashflow,
            fixed_variable,
            cost_class,
        } => {
            let account = Account {
                code: code.clone(),
                name,
                account_type: account_type
                    .parse::<AccountType>()
                    .map_err(|e: String| anyhow!(e))?,
                dre_group: group,
                dre_subgroup: subgroup,
                cashflow_category: cashflow
                    .map(|c| c.parse::<CashflowCategory>())
                    .transpose()
                    .map_err(|e: String| anyhow!(e))?,
                fixed_variable: fixed_variable
                    .map(|f| f.parse::<FixedVariable>())
                    .transpose()
                    .map_err(|e: String| anyhow!(e))?,
                cost_class: cost_class
                    .map(|c| c.parse::<CostClass>())
                    .transpose()
                    .map_err(|e: String| anyhow!(e))?,
            };
            let cache = Cache::new();
            let locks = LockManager::new();
            let ops = LedgerOps::new(&db, &cache, &locks);
            ops.save_account(&RequestContext::new(), &account)?;
            println!("✅ Account {} saved", code);
        }

        AccountAction::List => {
            let accounts = db.load_accounts()?;
            if accounts.is_empty() {
                println!("No accounts registered. Add one with: fluxo account add ...");
                return Ok(());
            }
            println!(
                "{:<10}  {:<28}  {:<8}  {:<26}  {:<6}",
                "CODE", "NAME", "TYPE", "DRE GROUP", "CLASS"
            );
            for a in &accounts {
                println!(
                    "{:<10}  {:<28}  {:<8}  {:<26}  {:<6}",
                    a.code,
                    a.name,
                    a.account_type.as_str(),
                    a.dre_group,
                    a.cost_class.map_or("-", |c| c.as_str()),
                );
            }
            println!("\n{} accounts", accounts.len());
        }
    }

    Ok(())
}

/// Which simple reference table a `RefAction` applies to
#[derive(Debug, Clone, Copy)]
pub enum RefKind {
    Branch,
    Channel,
    CostCenter,
}

impl RefKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Channel => "channel",
            Self::CostCenter => "cost center",
        }
    }
}

pub fn cmd_ref(
    db_path: &Path,
    kind: RefKind,
    action: Option<RefAction>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    match action.unwrap_or(RefAction::List) {
        RefAction::Add { name } => {
            let cache = Cache::new();
            let locks = LockManager::new();
            let ops = LedgerOps::new(&db, &cache, &locks);
            let ctx = RequestContext::new();
            let id = match kind {
                RefKind::Branch => ops.save_branch(&ctx, &name)?,
                RefKind::Channel => ops.save_channel(&ctx, &name)?,
                RefKind::CostCenter => ops.save_cost_center(&ctx, &name)?,
            };
            println!("✅ {} '{}' saved (id {})", kind.label(), name, id);
        }
        RefAction::List => {
            let rows = load_refs(&db, kind)?;
            if rows.is_empty() {
                println!("No {}s registered.", kind.label());
                return Ok(());
            }
            println!("{:>4}  NAME", "ID");
            for (id, name) in &rows {
                println!("{:>4}  {}", id, name);
            }
        }
    }

    Ok(())
}

fn load_refs(db: &Database, kind: RefKind) -> Result<Vec<(i64, String)>> {
    let rows = match kind {
        RefKind::Branch => db
            .load_branches()?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect(),
        RefKind::Channel => db
            .load_channels()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect(),
        RefKind::CostCenter => db
            .load_cost_centers()?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect(),
    };
    Ok(rows)
}
