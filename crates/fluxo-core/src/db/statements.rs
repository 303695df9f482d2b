//! Bank statement line operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{BankStatementLine, NewStatementLine};

/// Column list shared by statement line SELECTs (order matters for row_to_statement)
const STATEMENT_COLUMNS: &str = "id, movement_date, bank_account, memo, document_ref, amount, \
     running_balance, reconciled, linked_entry_id, import_hash, created_at";

/// Counts reported after a statement import batch
#[derive(Debug, Default, Clone)]
pub struct StatementImportResult {
    pub imported: usize,
    /// Lines skipped because their import hash already exists
    pub skipped: usize,
}

impl Database {
    /// Insert a statement line unless its import hash already exists.
    /// Returns the new id, or None for a duplicate.
    pub fn insert_statement_line(&self, line: &NewStatementLine) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM bank_statement_lines WHERE import_hash = ?",
                params![line.import_hash],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            return Ok(None);
        }

        conn.execute(
            r#"
            INSERT INTO bank_statement_lines (
                movement_date, bank_account, memo, document_ref,
                amount, running_balance, import_hash
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                line.movement_date.to_string(),
                line.bank_account,
                line.memo,
                line.document_ref,
                line.amount,
                line.running_balance,
                line.import_hash,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// Import a batch of statement lines, skipping duplicates by hash
    pub fn import_statement_lines(
        &self,
        lines: &[NewStatementLine],
    ) -> Result<StatementImportResult> {
        let mut result = StatementImportResult::default();
        for line in lines {
            match self.insert_statement_line(line)? {
                Some(_) => result.imported += 1,
                None => result.skipped += 1,
            }
        }
        Ok(result)
    }

    /// Get a single statement line by id
    pub fn get_statement_line(&self, id: i64) -> Result<Option<BankStatementLine>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM bank_statement_lines WHERE id = ?",
            STATEMENT_COLUMNS
        );
        let line = conn
            .query_row(&sql, params![id], Self::row_to_statement)
            .optional()?;
        Ok(line)
    }

    /// List statement lines, optionally filtered by reconciliation state,
    /// ordered by movement date
    pub fn list_statement_lines(
        &self,
        reconciled: Option<bool>,
    ) -> Result<Vec<BankStatementLine>> {
        let conn = self.conn()?;

        let (sql, filter_param) = match reconciled {
            Some(flag) => (
                format!(
                    "SELECT {} FROM bank_statement_lines WHERE reconciled = ? ORDER BY movement_date, id",
                    STATEMENT_COLUMNS
                ),
                Some(flag as i64),
            ),
            None => (
                format!(
                    "SELECT {} FROM bank_statement_lines ORDER BY movement_date, id",
                    STATEMENT_COLUMNS
                ),
                None,
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let lines = match filter_param {
            Some(flag) => stmt
                .query_map(params![flag], Self::row_to_statement)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], Self::row_to_statement)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        Ok(lines)
    }

    /// Helper to convert a row to BankStatementLine (column order per STATEMENT_COLUMNS)
    pub(crate) fn row_to_statement(row: &rusqlite::Row) -> rusqlite::Result<BankStatementLine> {
        let date_str: String = row.get(1)?;
        let reconciled_int: i64 = row.get(7)?;
        let created_at_str: String = row.get(10)?;

        Ok(BankStatementLine {
            id: row.get(0)?,
            movement_date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
            bank_account: row.get(2)?,
            memo: row.get(3)?,
            document_ref: row.get(4)?,
            amount: row.get(5)?,
            running_balance: row.get(6)?,
            reconciled: reconciled_int != 0,
            linked_entry_id: row.get(8)?,
            import_hash: row.get(9)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
