//! Reference master data operations (accounts, branches, channels, cost centers)

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::{Account, Branch, Channel, CostCenter};

impl Database {
    /// Insert or update an account master record, keyed by code
    pub fn upsert_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO accounts (code, name, account_type, dre_group, dre_subgroup,
                                  cashflow_category, fixed_variable, cost_class)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                account_type = excluded.account_type,
                dre_group = excluded.dre_group,
                dre_subgroup = excluded.dre_subgroup,
                cashflow_category = excluded.cashflow_category,
                fixed_variable = excluded.fixed_variable,
                cost_class = excluded.cost_class
            "#,
            params![
                account.code,
                account.name,
                account.account_type.as_str(),
                account.dre_group,
                account.dre_subgroup,
                account.cashflow_category.map(|c| c.as_str()),
                account.fixed_variable.map(|f| f.as_str()),
                account.cost_class.map(|c| c.as_str()),
            ],
        )?;
        Ok(())
    }

    /// Load the full account master list, keyed by natural code order
    pub fn load_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, account_type, dre_group, dre_subgroup,
                    cashflow_category, fixed_variable, cost_class
             FROM accounts ORDER BY code",
        )?;

        let accounts = stmt
            .query_map([], |row| {
                let account_type: String = row.get(2)?;
                let cashflow: Option<String> = row.get(5)?;
                let fixed_variable: Option<String> = row.get(6)?;
                let cost_class: Option<String> = row.get(7)?;
                Ok(Account {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    account_type: account_type.parse().map_err(|e: String| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            e.into(),
                        )
                    })?,
                    dre_group: row.get(3)?,
                    dre_subgroup: row.get(4)?,
                    cashflow_category: cashflow.and_then(|s| s.parse().ok()),
                    fixed_variable: fixed_variable.and_then(|s| s.parse().ok()),
                    cost_class: cost_class.and_then(|s| s.parse().ok()),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Check whether an account code exists in master data
    pub fn account_exists(&self, code: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM accounts WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a branch if missing, returning its id
    pub fn upsert_branch(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM branches WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute("INSERT INTO branches (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn load_branches(&self) -> Result<Vec<Branch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM branches ORDER BY id")?;
        let branches = stmt
            .query_map([], |row| {
                Ok(Branch {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(branches)
    }

    pub fn branch_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM branches WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a channel if missing, returning its id
    pub fn upsert_channel(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM channels WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute("INSERT INTO channels (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn load_channels(&self) -> Result<Vec<Channel>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM channels ORDER BY id")?;
        let channels = stmt
            .query_map([], |row| {
                Ok(Channel {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(channels)
    }

    pub fn channel_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM channels WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a cost center if missing, returning its id
    pub fn upsert_cost_center(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM cost_centers WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO cost_centers (name) VALUES (?1)",
            params![name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn load_cost_centers(&self) -> Result<Vec<CostCenter>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM cost_centers ORDER BY id")?;
        let centers = stmt
            .query_map([], |row| {
                Ok(CostCenter {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(centers)
    }

    pub fn cost_center_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM cost_centers WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
