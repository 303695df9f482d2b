//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_status` - Database and ledger status

use std::path::Path;

use anyhow::{Context, Result};
use fluxo_core::{Database, EntryFilter, EntryStatus};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path.to_str().context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    db.upsert_branch("Matriz").context("Failed to seed default branch")?;
    println!("   Seeded default branch (Matriz)");

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Register accounts:  fluxo account add 3.1.1 --name \"Vendas\" --type revenue --group \"Receita Bruta\"");
    println!("  2. Record entries:     fluxo entry add --type receivable --accrual 2025-06-01 ...");
    println!("  3. Import statements:  fluxo import --file extrato.csv --account 001-12345");

    Ok(())
}

pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    let total = db.count_entries(&EntryFilter::new())?;
    let open = db.count_entries(&EntryFilter::new().status(Some(EntryStatus::Forecast)))?;
    let realized = db.count_entries(&EntryFilter::new().status(Some(EntryStatus::Realized)))?;
    let pending_lines = db.list_statement_lines(Some(false))?.len();
    let accounts = db.load_accounts()?.len();
    let branches = db.load_branches()?.len();

    println!("📊 Fluxo status");
    println!("   Database:   {}", db.path());
    println!(
        "   Encryption: {}",
        if no_encrypt { "disabled" } else { "enabled" }
    );
    println!("   Accounts:   {}", accounts);
    println!("   Branches:   {}", branches);
    println!("   Entries:    {} total ({} open, {} realized)", total, open, realized);
    println!("   Statement lines awaiting reconciliation: {}", pending_lines);

    Ok(())
}
