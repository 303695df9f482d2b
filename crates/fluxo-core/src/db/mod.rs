//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `entries` - Ledger entry CRUD, settlement, and reconciliation links
//! - `entry_filter` - Dynamic filter builder for ledger entry queries
//! - `statements` - Bank statement line import and reconciliation links
//! - `reference` - Accounts, branches, channels, and cost centers (master data)

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod entries;
mod entry_filter;
mod reference;
mod statements;

pub use entry_filter::{DateField, EntryFilter};
pub use statements::StatementImportResult;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "FLUXO_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"fluxo-salt-v1-fx";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    // Extract the hash portion for use as SQLCipher key (hex encoded)
    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `FLUXO_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `FLUXO_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `FLUXO_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/fluxo_test_{}_{}.db", std::process::id(), id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for complex queries)
            PRAGMA temp_store = MEMORY;

            -- Branches (filiais)
            CREATE TABLE IF NOT EXISTS branches (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Sales channels
            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Cost centers
            CREATE TABLE IF NOT EXISTS cost_centers (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Management chart of accounts (reference master data)
            CREATE TABLE IF NOT EXISTS accounts (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                account_type TEXT NOT NULL,        -- revenue, expense, cost
                dre_group TEXT NOT NULL,
                dre_subgroup TEXT,
                cashflow_category TEXT,            -- operating, investing, financing
                fixed_variable TEXT,               -- fixed, variable
                cost_class TEXT,                   -- cma, cmv
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_type ON accounts(account_type);

            -- Ledger entries (accounts payable/receivable)
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY,
                entry_type TEXT NOT NULL,          -- payable, receivable, transfer, adjustment
                status TEXT NOT NULL,              -- forecast, realized, canceled
                accrual_date DATE NOT NULL,        -- competencia
                due_date DATE,                     -- vencimento
                payment_date DATE,                 -- set when realized
                branch_id INTEGER NOT NULL REFERENCES branches(id),
                cost_center_id INTEGER REFERENCES cost_centers(id),
                management_account TEXT NOT NULL,
                accounting_account TEXT,
                revenue_group TEXT,
                channel_id INTEGER REFERENCES channels(id),
                description TEXT NOT NULL,
                gross_amount REAL NOT NULL,
                discount REAL NOT NULL DEFAULT 0,
                interest REAL NOT NULL DEFAULT 0,
                penalty REAL NOT NULL DEFAULT 0,
                net_amount REAL NOT NULL,
                linked_statement_id INTEGER REFERENCES bank_statement_lines(id),
                origin TEXT NOT NULL DEFAULT 'manual',  -- manual, imported
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_entries_accrual ON ledger_entries(accrual_date);
            CREATE INDEX IF NOT EXISTS idx_entries_due ON ledger_entries(due_date);
            CREATE INDEX IF NOT EXISTS idx_entries_payment ON ledger_entries(payment_date);
            CREATE INDEX IF NOT EXISTS idx_entries_status ON ledger_entries(status);
            CREATE INDEX IF NOT EXISTS idx_entries_type ON ledger_entries(entry_type);
            CREATE INDEX IF NOT EXISTS idx_entries_branch ON ledger_entries(branch_id);
            CREATE INDEX IF NOT EXISTS idx_entries_account ON ledger_entries(management_account);
            CREATE INDEX IF NOT EXISTS idx_entries_linked ON ledger_entries(linked_statement_id);

            -- Bank statement lines (imported bank transactions)
            CREATE TABLE IF NOT EXISTS bank_statement_lines (
                id INTEGER PRIMARY KEY,
                movement_date DATE NOT NULL,
                bank_account TEXT NOT NULL,
                memo TEXT NOT NULL,
                document_ref TEXT,
                amount REAL NOT NULL,
                running_balance REAL,
                reconciled BOOLEAN NOT NULL DEFAULT 0,
                linked_entry_id INTEGER REFERENCES ledger_entries(id),
                import_hash TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_statements_date ON bank_statement_lines(movement_date);
            CREATE INDEX IF NOT EXISTS idx_statements_reconciled ON bank_statement_lines(reconciled);
            CREATE INDEX IF NOT EXISTS idx_statements_account ON bank_statement_lines(bank_account);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
