//! Bank statement import command

use std::path::Path;

use anyhow::{Context, Result};
use fluxo_core::import::import_statement_file;

use crate::commands::open_db;

pub fn cmd_import(db_path: &Path, file: &Path, account: &str, no_encrypt: bool) -> Result<()> {
    println!("📥 Importing {} for account {}...", file.display(), account);

    let db = open_db(db_path, no_encrypt)?;
    let result = import_statement_file(&db, file, account)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!(
        "✅ Import complete: {} new lines, {} already known",
        result.imported, result.skipped
    );
    if result.imported > 0 {
        println!();
        println!("Next: fluxo reconcile auto");
    }

    Ok(())
}
