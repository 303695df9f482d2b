//! Fluxo CLI - Small-business financial management
//!
//! Usage:
//!   fluxo init                    Initialize database
//!   fluxo import --file CSV       Import a bank statement
//!   fluxo dre --period 2025-06    Income statement for a month
//!   fluxo reconcile auto          Auto-link statement lines

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
        Commands::Entry { action } => commands::cmd_entry(&cli.db, action, cli.no_encrypt),
        Commands::Account { action } => commands::cmd_account(&cli.db, action, cli.no_encrypt),
        Commands::Branch { action } => {
            commands::cmd_ref(&cli.db, commands::RefKind::Branch, action, cli.no_encrypt)
        }
        Commands::Channel { action } => {
            commands::cmd_ref(&cli.db, commands::RefKind::Channel, action, cli.no_encrypt)
        }
        Commands::CostCenter { action } => {
            commands::cmd_ref(&cli.db, commands::RefKind::CostCenter, action, cli.no_encrypt)
        }
        Commands::Import { file, account } => {
            commands::cmd_import(&cli.db, &file, &account, cli.no_encrypt)
        }
        Commands::Dre {
            period,
            branch,
            json,
        } => commands::cmd_dre(&cli.db, period, branch, json, cli.no_encrypt),
        Commands::Cashflow {
            period,
            months,
            realized_only,
            opening,
            json,
        } => commands::cmd_cashflow(
            &cli.db,
            period,
            months,
            realized_only,
            opening,
            json,
            cli.no_encrypt,
        ),
        Commands::Timeline { days } => commands::cmd_timeline(&cli.db, days, cli.no_encrypt),
        Commands::Kpis {
            period,
            branch,
            channel,
            json,
        } => commands::cmd_kpis(&cli.db, period, branch, channel, json, cli.no_encrypt),
        Commands::Dashboard { period, branch } => {
            commands::cmd_dashboard(&cli.db, period, branch, cli.no_encrypt)
        }
        Commands::Reconcile { action } => commands::cmd_reconcile(&cli.db, action, cli.no_encrypt),
    }
}
