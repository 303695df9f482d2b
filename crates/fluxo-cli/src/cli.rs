//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fluxo_core::Period;

/// Fluxo - Small-business financial management
#[derive(Parser)]
#[command(name = "fluxo")]
#[command(about = "Ledger, cash flow and reconciliation for small businesses", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "fluxo.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set FLUXO_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status (encryption, counts, open items)
    Status,

    /// Manage ledger entries
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },

    /// Manage the management chart of accounts
    Account {
        #[command(subcommand)]
        action: Option<AccountAction>,
    },

    /// Manage branches (filiais)
    Branch {
        #[command(subcommand)]
        action: Option<RefAction>,
    },

    /// Manage sales channels
    Channel {
        #[command(subcommand)]
        action: Option<RefAction>,
    },

    /// Manage cost centers
    CostCenter {
        #[command(subcommand)]
        action: Option<RefAction>,
    },

    /// Import a bank statement CSV
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Bank account identifier the statement belongs to
        #[arg(short, long)]
        account: String,
    },

    /// Management income statement (DRE) for a period
    Dre {
        /// Period as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        period: Option<Period>,

        /// Restrict to one branch
        #[arg(short, long)]
        branch: Option<i64>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Cash-flow statement (DFC)
    Cashflow {
        /// Starting period as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        period: Option<Period>,

        /// Months to project forward
        #[arg(short, long, default_value = "1")]
        months: u32,

        /// Only settled movements, no forecast projection
        #[arg(long)]
        realized_only: bool,

        /// Opening balance for the projected closing balance
        #[arg(short, long, default_value = "0")]
        opening: f64,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Upcoming obligations ordered by due date
    Timeline {
        /// Horizon in days
        #[arg(short, long, default_value = "90")]
        days: i64,
    },

    /// KPI set for a period, graded against benchmarks
    Kpis {
        /// Period as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        period: Option<Period>,

        /// Restrict to one branch
        #[arg(short, long)]
        branch: Option<i64>,

        /// Restrict to one sales channel
        #[arg(short, long)]
        channel: Option<i64>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Month-at-a-glance dashboard
    Dashboard {
        /// Period as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        period: Option<Period>,

        /// Restrict to one branch
        #[arg(short, long)]
        branch: Option<i64>,
    },

    /// Reconcile bank statement lines against the ledger
    Reconcile {
        #[command(subcommand)]
        action: ReconcileAction,
    },
}

#[derive(Subcommand)]
pub enum EntryAction {
    /// Create a ledger entry
    Add {
        /// Entry type: payable, receivable, transfer, adjustment
        #[arg(short = 't', long = "type")]
        entry_type: String,

        /// Accrual (competência) date
        #[arg(long)]
        accrual: NaiveDate,

        /// Due (vencimento) date
        #[arg(long)]
        due: Option<NaiveDate>,

        /// Payment date (marks the entry realized)
        #[arg(long)]
        paid: Option<NaiveDate>,

        /// Management account code
        #[arg(short, long)]
        account: String,

        /// Branch id
        #[arg(short, long, default_value = "1")]
        branch: i64,

        /// Sales channel id
        #[arg(long)]
        channel: Option<i64>,

        /// Cost center id
        #[arg(long)]
        cost_center: Option<i64>,

        #[arg(short, long)]
        description: String,

        /// Gross amount
        #[arg(short, long)]
        gross: f64,

        #[arg(long, default_value = "0")]
        discount: f64,

        #[arg(long, default_value = "0")]
        interest: f64,

        #[arg(long, default_value = "0")]
        penalty: f64,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List entries
    List {
        /// Filter by status: forecast, realized, canceled
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by type: payable, receivable, transfer, adjustment
        #[arg(short = 't', long = "type")]
        entry_type: Option<String>,

        /// Filter by branch
        #[arg(short, long)]
        branch: Option<i64>,

        /// Filter by management account code
        #[arg(short, long)]
        account: Option<String>,

        /// Start of the accrual date range
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End of the accrual date range
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Settle a forecast entry
    Settle {
        /// Entry id
        id: i64,

        /// Payment date
        #[arg(short, long)]
        date: NaiveDate,

        #[arg(long, default_value = "0")]
        interest: f64,

        #[arg(long, default_value = "0")]
        penalty: f64,
    },

    /// Cancel an entry (soft delete)
    Cancel {
        /// Entry id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// Add or update an account (code is the key)
    Add {
        /// Account code, e.g. 5.1.1
        code: String,

        #[arg(short, long)]
        name: String,

        /// Account type: revenue, expense, cost
        #[arg(short = 't', long = "type")]
        account_type: String,

        /// DRE group, e.g. "Despesas Administrativas"
        #[arg(short, long)]
        group: String,

        #[arg(long)]
        subgroup: Option<String>,

        /// Cash-flow category: operating, investing, financing
        #[arg(long)]
        cashflow: Option<String>,

        /// fixed or variable
        #[arg(long)]
        fixed_variable: Option<String>,

        /// Cost class: cma or cmv
        #[arg(long)]
        cost_class: Option<String>,
    },

    /// List accounts
    List,
}

/// Shared add/list actions for the simple reference tables
#[derive(Subcommand)]
pub enum RefAction {
    /// Add by name (idempotent)
    Add { name: String },

    /// List all
    List,
}

#[derive(Subcommand)]
pub enum ReconcileAction {
    /// Rank candidate entries for one statement line
    Suggest {
        /// Statement line id
        statement_id: i64,
    },

    /// Link every line whose best match clears the confidence floor
    Auto,

    /// Greedy bulk pass pairing lines and entries by exact amount
    Bulk,

    /// Manually link a statement line to an entry
    Link {
        statement_id: i64,
        entry_id: i64,
    },

    /// Break an existing link
    Unlink { statement_id: i64 },

    /// List unreconciled statement lines
    Pending,
}
