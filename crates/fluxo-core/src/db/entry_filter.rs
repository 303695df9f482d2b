//! Ledger entry filter builder for constructing dynamic SQL queries
//!
//! Builder pattern for assembling WHERE clauses shared between
//! `list_entries` and `count_entries`. Filter fields follow the ledger
//! store contract: branch, channel, cost center, type, status,
//! management account, and period range.

use chrono::NaiveDate;

use crate::models::{EntryStatus, EntryType};

/// Which date column a period-range filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateField {
    /// Competência (accrual date)
    #[default]
    Accrual,
    /// Vencimento (due date)
    Due,
    /// When cash moved
    Payment,
}

impl DateField {
    fn column(&self) -> &'static str {
        match self {
            Self::Accrual => "accrual_date",
            Self::Due => "due_date",
            Self::Payment => "payment_date",
        }
    }
}

/// Builder for constructing ledger entry query filters
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub branch_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub cost_center_id: Option<i64>,
    pub entry_type: Option<EntryType>,
    pub status: Option<EntryStatus>,
    pub management_account: Option<String>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub date_field: DateField,
    /// Only entries not yet linked to a bank statement line
    pub unlinked_only: bool,
}

impl EntryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch_id(mut self, id: Option<i64>) -> Self {
        self.branch_id = id;
        self
    }

    pub fn channel_id(mut self, id: Option<i64>) -> Self {
        self.channel_id = id;
        self
    }

    pub fn cost_center_id(mut self, id: Option<i64>) -> Self {
        self.cost_center_id = id;
        self
    }

    pub fn entry_type(mut self, entry_type: Option<EntryType>) -> Self {
        self.entry_type = entry_type;
        self
    }

    pub fn status(mut self, status: Option<EntryStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn management_account(mut self, code: Option<String>) -> Self {
        self.management_account = code;
        self
    }

    /// Restrict to a date range on the given field (inclusive on both ends).
    /// Rows with a NULL date never match a range on that field.
    pub fn date_range(mut self, field: DateField, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_field = field;
        self.date_range = Some((from, to));
        self
    }

    pub fn unlinked_only(mut self, value: bool) -> Self {
        self.unlinked_only = value;
        self
    }

    /// Build the WHERE clause (including the WHERE keyword, empty if no
    /// conditions) and its positional parameters
    pub fn build(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(bid) = self.branch_id {
            conditions.push("branch_id = ?".to_string());
            params.push(Box::new(bid));
        }

        if let Some(cid) = self.channel_id {
            conditions.push("channel_id = ?".to_string());
            params.push(Box::new(cid));
        }

        if let Some(ccid) = self.cost_center_id {
            conditions.push("cost_center_id = ?".to_string());
            params.push(Box::new(ccid));
        }

        if let Some(entry_type) = self.entry_type {
            conditions.push("entry_type = ?".to_string());
            params.push(Box::new(entry_type.as_str()));
        }

        if let Some(status) = self.status {
            conditions.push("status = ?".to_string());
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref code) = self.management_account {
            conditions.push("management_account = ?".to_string());
            params.push(Box::new(code.clone()));
        }

        if let Some((from, to)) = self.date_range {
            let column = self.date_field.column();
            conditions.push(format!("{} >= ? AND {} <= ?", column, column));
            params.push(Box::new(from.to_string()));
            params.push(Box::new(to.to_string()));
        }

        if self.unlinked_only {
            conditions.push("linked_statement_id IS NULL".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}
