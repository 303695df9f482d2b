//! Ledger entry operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::entry_filter::EntryFilter;
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{EntryStatus, LedgerEntry, NewLedgerEntry};

/// Column list shared by all ledger entry SELECTs (order matters for row_to_entry)
const ENTRY_COLUMNS: &str = "id, entry_type, status, accrual_date, due_date, payment_date, \
     branch_id, cost_center_id, management_account, accounting_account, revenue_group, \
     channel_id, description, gross_amount, discount, interest, penalty, net_amount, \
     linked_statement_id, origin, notes, created_at";

fn parse_enum_col<T: std::str::FromStr<Err = String>>(
    idx: usize,
    value: String,
) -> rusqlite::Result<T> {
    value.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn parse_date_col(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

impl Database {
    /// Insert a new ledger entry, returning its id
    ///
    /// Callers are expected to have run `NewLedgerEntry::validate()` first;
    /// the store does not re-check amount consistency.
    pub fn insert_entry(&self, entry: &NewLedgerEntry) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO ledger_entries (
                entry_type, status, accrual_date, due_date, payment_date,
                branch_id, cost_center_id, management_account, accounting_account,
                revenue_group, channel_id, description, gross_amount, discount,
                interest, penalty, net_amount, origin, notes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.entry_type.as_str(),
                entry.status.as_str(),
                entry.accrual_date.to_string(),
                entry.due_date.map(|d| d.to_string()),
                entry.payment_date.map(|d| d.to_string()),
                entry.branch_id,
                entry.cost_center_id,
                entry.management_account,
                entry.accounting_account,
                entry.revenue_group,
                entry.channel_id,
                entry.description,
                entry.gross_amount,
                entry.discount,
                entry.interest,
                entry.penalty,
                entry.net_amount,
                entry.origin.as_str(),
                entry.notes,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a single ledger entry by id
    pub fn get_entry(&self, id: i64) -> Result<Option<LedgerEntry>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM ledger_entries WHERE id = ?", ENTRY_COLUMNS);
        let entry = conn
            .query_row(&sql, params![id], Self::row_to_entry)
            .optional()?;
        Ok(entry)
    }

    /// List ledger entries matching a filter, ordered by accrual date
    pub fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let (where_clause, params) = filter.build();

        let sql = format!(
            "SELECT {} FROM ledger_entries {} ORDER BY accrual_date, id",
            ENTRY_COLUMNS, where_clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(param_refs.as_slice(), Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Count ledger entries matching a filter
    pub fn count_entries(&self, filter: &EntryFilter) -> Result<i64> {
        let conn = self.conn()?;
        let (where_clause, params) = filter.build();
        let sql = format!("SELECT COUNT(*) FROM ledger_entries {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Transition an entry to realized, recording the payment date and any
    /// settlement interest/penalty (net amount is recomputed accordingly)
    pub fn settle_entry(
        &self,
        id: i64,
        payment_date: NaiveDate,
        interest: f64,
        penalty: f64,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE ledger_entries
            SET status = 'realized',
                payment_date = ?2,
                interest = ?3,
                penalty = ?4,
                net_amount = ROUND(gross_amount - discount + ?3 + ?4, 2)
            WHERE id = ?1
            "#,
            params![id, payment_date.to_string(), interest, penalty],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Ledger entry {} not found", id)));
        }
        Ok(())
    }

    /// Soft-delete an entry via canceled status
    pub fn cancel_entry(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE ledger_entries SET status = ?2 WHERE id = ?1",
            params![id, EntryStatus::Canceled.as_str()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Ledger entry {} not found", id)));
        }
        Ok(())
    }

    /// Link or unlink both sides of a reconciliation in one transaction
    ///
    /// Passing `Some` ids sets the pair (entry.linked_statement_id and
    /// statement.linked_entry_id/reconciled together); passing the entry id
    /// as `None` clears whatever the statement currently points at.
    /// Referential symmetry between the two rows is maintained here and
    /// nowhere else.
    pub fn set_reconciliation_link(
        &self,
        statement_id: i64,
        entry_id: Option<i64>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        match entry_id {
            Some(eid) => {
                let updated = tx.execute(
                    "UPDATE ledger_entries SET linked_statement_id = ?2 WHERE id = ?1",
                    params![eid, statement_id],
                )?;
                if updated == 0 {
                    return Err(Error::NotFound(format!("Ledger entry {} not found", eid)));
                }
                let updated = tx.execute(
                    "UPDATE bank_statement_lines SET reconciled = 1, linked_entry_id = ?2 WHERE id = ?1",
                    params![statement_id, eid],
                )?;
                if updated == 0 {
                    return Err(Error::NotFound(format!(
                        "Bank statement line {} not found",
                        statement_id
                    )));
                }
            }
            None => {
                let current: Option<i64> = tx
                    .query_row(
                        "SELECT linked_entry_id FROM bank_statement_lines WHERE id = ?1",
                        params![statement_id],
                        |row| row.get(0),
                    )
                    .optional()?
                    .ok_or_else(|| {
                        Error::NotFound(format!("Bank statement line {} not found", statement_id))
                    })?;

                if let Some(eid) = current {
                    tx.execute(
                        "UPDATE ledger_entries SET linked_statement_id = NULL WHERE id = ?1",
                        params![eid],
                    )?;
                }
                tx.execute(
                    "UPDATE bank_statement_lines SET reconciled = 0, linked_entry_id = NULL WHERE id = ?1",
                    params![statement_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Helper to convert a row to LedgerEntry (column order per ENTRY_COLUMNS)
    pub(crate) fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
        let entry_type: String = row.get(1)?;
        let status: String = row.get(2)?;
        let accrual_str: String = row.get(3)?;
        let due_str: Option<String> = row.get(4)?;
        let payment_str: Option<String> = row.get(5)?;
        let origin: String = row.get(19)?;
        let created_at_str: String = row.get(21)?;

        Ok(LedgerEntry {
            id: row.get(0)?,
            entry_type: parse_enum_col(1, entry_type)?,
            status: parse_enum_col(2, status)?,
            accrual_date: NaiveDate::parse_from_str(&accrual_str, "%Y-%m-%d").unwrap_or_default(),
            due_date: parse_date_col(due_str),
            payment_date: parse_date_col(payment_str),
            branch_id: row.get(6)?,
            cost_center_id: row.get(7)?,
            management_account: row.get(8)?,
            accounting_account: row.get(9)?,
            revenue_group: row.get(10)?,
            channel_id: row.get(11)?,
            description: row.get(12)?,
            gross_amount: row.get(13)?,
            discount: row.get(14)?,
            interest: row.get(15)?,
            penalty: row.get(16)?,
            net_amount: row.get(17)?,
            linked_statement_id: row.get(18)?,
            origin: origin.parse().ok().unwrap_or_default(),
            notes: row.get(20)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
