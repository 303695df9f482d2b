//! Ledger mutation boundary
//!
//! All writes to the ledger go through `LedgerOps`: validation and
//! reference-integrity checks first, then the store, then report-cache
//! invalidation. Business rejections come back as an `Outcome` so callers
//! can show them; infrastructure failures propagate as errors.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::cache::{Cache, NS_REFERENCE, NS_REPORTS};
use crate::context::{RequestContext, RunBudget};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::lock::{LockManager, SCOPE_DOCUMENT};
use crate::models::{Account, EntryStatus, NewLedgerEntry};

/// Result of one mutation attempt, in user-facing terms
#[derive(Debug, Clone)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// One settlement instruction in a batch
#[derive(Debug, Clone)]
pub struct SettleItem {
    pub entry_id: i64,
    pub payment_date: NaiveDate,
    pub interest: f64,
    pub penalty: f64,
}

pub struct LedgerOps<'a> {
    db: &'a Database,
    cache: &'a Cache,
    locks: &'a LockManager,
}

impl<'a> LedgerOps<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache, locks: &'a LockManager) -> Self {
        Self { db, cache, locks }
    }

    /// Create a ledger entry after validating it and checking every
    /// reference it carries against master data.
    pub fn create_entry(&self, ctx: &RequestContext, new: &NewLedgerEntry) -> Result<i64> {
        new.validate()?;
        self.check_references(new)?;
        let id = self.db.insert_entry(new)?;
        self.cache.invalidate_namespace(NS_REPORTS);
        info!(
            correlation = %ctx.correlation_id,
            entry = id,
            entry_type = %new.entry_type,
            amount = new.net_amount,
            "entry created"
        );
        Ok(id)
    }

    /// Settle a forecast entry: record the payment date plus any interest
    /// and penalty incurred. Runs under the document lock.
    pub fn settle(
        &self,
        ctx: &RequestContext,
        entry_id: i64,
        payment_date: NaiveDate,
        interest: f64,
        penalty: f64,
    ) -> Result<Outcome> {
        let _guard = self.locks.acquire_default(SCOPE_DOCUMENT)?;
        debug!(correlation = %ctx.correlation_id, entry = entry_id, "settling entry");
        self.settle_locked(entry_id, payment_date, interest, penalty)
    }

    /// Settle many entries under one lock acquisition. Business rejections
    /// surface per item; a blown time budget aborts the remainder.
    pub fn settle_batch(
        &self,
        ctx: &RequestContext,
        items: &[SettleItem],
        budget: &mut RunBudget,
    ) -> Result<Vec<Outcome>> {
        let _guard = self.locks.acquire_default(SCOPE_DOCUMENT)?;
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            budget.checkpoint(&format!("settle:{}", item.entry_id))?;
            outcomes.push(self.settle_locked(
                item.entry_id,
                item.payment_date,
                item.interest,
                item.penalty,
            )?);
        }
        let settled = outcomes.iter().filter(|o| o.success).count();
        info!(
            correlation = %ctx.correlation_id,
            requested = items.len(),
            settled,
            "batch settlement finished"
        );
        Ok(outcomes)
    }

    /// Cancel an entry. Realized entries are soft-deleted, never removed;
    /// a reconciled entry must be unlinked first.
    pub fn cancel(&self, ctx: &RequestContext, entry_id: i64) -> Result<Outcome> {
        let _guard = self.locks.acquire_default(SCOPE_DOCUMENT)?;
        let Some(entry) = self.db.get_entry(entry_id)? else {
            return Ok(Outcome::rejected(format!("Entry {} not found", entry_id)));
        };
        if entry.status == EntryStatus::Canceled {
            return Ok(Outcome::rejected(format!(
                "Entry {} is already canceled",
                entry_id
            )));
        }
        if entry.linked_statement_id.is_some() {
            return Ok(Outcome::rejected(format!(
                "Entry {} is reconciled against a statement line; unlink it first",
                entry_id
            )));
        }
        self.db.cancel_entry(entry_id)?;
        self.cache.invalidate_namespace(NS_REPORTS);
        info!(correlation = %ctx.correlation_id, entry = entry_id, "entry canceled");
        Ok(Outcome::ok(format!("Entry {} canceled", entry_id)))
    }

    /// Add or update a management account. Drops the cached master data
    /// (and the reports classified through it) before returning, so the
    /// edit is visible to the next resolver lookup.
    pub fn save_account(&self, ctx: &RequestContext, account: &Account) -> Result<()> {
        self.db.upsert_account(account)?;
        self.cache.invalidate_namespace(NS_REFERENCE);
        self.cache.invalidate_namespace(NS_REPORTS);
        info!(correlation = %ctx.correlation_id, account = %account.code, "account saved");
        Ok(())
    }

    /// Add a branch by name (idempotent), invalidating cached master data
    pub fn save_branch(&self, ctx: &RequestContext, name: &str) -> Result<i64> {
        let id = self.db.upsert_branch(name)?;
        self.cache.invalidate_namespace(NS_REFERENCE);
        info!(correlation = %ctx.correlation_id, branch = id, "branch saved");
        Ok(id)
    }

    /// Add a sales channel by name (idempotent)
    pub fn save_channel(&self, ctx: &RequestContext, name: &str) -> Result<i64> {
        let id = self.db.upsert_channel(name)?;
        self.cache.invalidate_namespace(NS_REFERENCE);
        info!(correlation = %ctx.correlation_id, channel = id, "channel saved");
        Ok(id)
    }

    /// Add a cost center by name (idempotent)
    pub fn save_cost_center(&self, ctx: &RequestContext, name: &str) -> Result<i64> {
        let id = self.db.upsert_cost_center(name)?;
        self.cache.invalidate_namespace(NS_REFERENCE);
        info!(correlation = %ctx.correlation_id, cost_center = id, "cost center saved");
        Ok(id)
    }

    fn settle_locked(
        &self,
        entry_id: i64,
        payment_date: NaiveDate,
        interest: f64,
        penalty: f64,
    ) -> Result<Outcome> {
        if !interest.is_finite() || !penalty.is_finite() {
            return Ok(Outcome::rejected(
                "Interest and penalty must be finite numbers".to_string(),
            ));
        }
        let Some(entry) = self.db.get_entry(entry_id)? else {
            return Ok(Outcome::rejected(format!("Entry {} not found", entry_id)));
        };
        match entry.status {
            EntryStatus::Realized => {
                return Ok(Outcome::rejected(format!(
                    "Entry {} is already settled",
                    entry_id
                )));
            }
            EntryStatus::Canceled => {
                return Ok(Outcome::rejected(format!(
                    "Entry {} is canceled",
                    entry_id
                )));
            }
            EntryStatus::Forecast => {}
        }
        self.db.settle_entry(entry_id, payment_date, interest, penalty)?;
        self.cache.invalidate_namespace(NS_REPORTS);
        info!(entry = entry_id, %payment_date, "entry settled");
        Ok(Outcome::ok(format!(
            "Entry {} settled on {}",
            entry_id, payment_date
        )))
    }

    fn check_references(&self, new: &NewLedgerEntry) -> Result<()> {
        if !self.db.branch_exists(new.branch_id)? {
            return Err(Error::ReferenceIntegrity(format!(
                "Unknown branch: {}",
                new.branch_id
            )));
        }
        if !self.db.account_exists(&new.management_account)? {
            warn!(account = %new.management_account, "account missing from master data");
            return Err(Error::ReferenceIntegrity(format!(
                "Unknown management account: {}",
                new.management_account
            )));
        }
        if let Some(channel_id) = new.channel_id {
            if !self.db.channel_exists(channel_id)? {
                return Err(Error::ReferenceIntegrity(format!(
                    "Unknown channel: {}",
                    channel_id
                )));
            }
        }
        if let Some(cost_center_id) = new.cost_center_id {
            if !self.db.cost_center_exists(cost_center_id)? {
                return Err(Error::ReferenceIntegrity(format!(
                    "Unknown cost center: {}",
                    cost_center_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{round2, AccountType, EntryType};
    use crate::reference::ReferenceResolver;
    use crate::reports::testutil::{account, date, forecast_entry, seed_chart};

    fn setup() -> (Database, Cache, LockManager) {
        let db = Database::in_memory().unwrap();
        seed_chart(&db);
        (db, Cache::new(), LockManager::new())
    }

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    fn payable(due: chrono::NaiveDate) -> NewLedgerEntry {
        forecast_entry(EntryType::Payable, due, due, "5.1.1", 400.0)
    }

    #[test]
    fn create_rejects_unknown_account() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let mut entry = payable(date(2025, 6, 10));
        entry.management_account = "nope".to_string();

        let err = ops.create_entry(&ctx(), &entry).unwrap_err();
        assert!(matches!(err, Error::ReferenceIntegrity(_)));
    }

    #[test]
    fn create_rejects_unknown_branch() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let mut entry = payable(date(2025, 6, 10));
        entry.branch_id = 99;

        let err = ops.create_entry(&ctx(), &entry).unwrap_err();
        assert!(matches!(err, Error::ReferenceIntegrity(_)));
    }

    #[test]
    fn settle_updates_status_and_net() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let id = ops.create_entry(&ctx(), &payable(date(2025, 6, 10))).unwrap();

        let outcome = ops.settle(&ctx(), id, date(2025, 6, 15), 12.0, 8.0).unwrap();
        assert!(outcome.success, "{}", outcome.message);

        let entry = db.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Realized);
        assert_eq!(entry.payment_date, Some(date(2025, 6, 15)));
        assert_eq!(entry.net_amount, round2(400.0 + 12.0 + 8.0));
    }

    #[test]
    fn settling_twice_is_rejected_not_an_error() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let id = ops.create_entry(&ctx(), &payable(date(2025, 6, 10))).unwrap();

        assert!(ops.settle(&ctx(), id, date(2025, 6, 15), 0.0, 0.0).unwrap().success);
        let again = ops.settle(&ctx(), id, date(2025, 6, 16), 0.0, 0.0).unwrap();
        assert!(!again.success);
        assert!(again.message.contains("already settled"));
    }

    #[test]
    fn batch_reports_per_item_outcomes() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let good = ops.create_entry(&ctx(), &payable(date(2025, 6, 10))).unwrap();

        let items = vec![
            SettleItem {
                entry_id: good,
                payment_date: date(2025, 6, 12),
                interest: 0.0,
                penalty: 0.0,
            },
            SettleItem {
                entry_id: 9_999,
                payment_date: date(2025, 6, 12),
                interest: 0.0,
                penalty: 0.0,
            },
        ];
        let mut budget = RunBudget::new(Duration::from_secs(240), Duration::from_secs(30));
        let outcomes = ops.settle_batch(&ctx(), &items, &mut budget).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
    }

    #[test]
    fn batch_aborts_on_exhausted_budget() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let id = ops.create_entry(&ctx(), &payable(date(2025, 6, 10))).unwrap();

        let items = vec![SettleItem {
            entry_id: id,
            payment_date: date(2025, 6, 12),
            interest: 0.0,
            penalty: 0.0,
        }];
        let mut budget = RunBudget::new(Duration::from_secs(1), Duration::from_secs(1));
        let err = ops.settle_batch(&ctx(), &items, &mut budget).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded { .. }));
    }

    #[test]
    fn cancel_refuses_reconciled_entries() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let mut entry = payable(date(2025, 6, 10));
        entry.status = EntryStatus::Realized;
        entry.payment_date = Some(date(2025, 6, 10));
        let id = ops.create_entry(&ctx(), &entry).unwrap();

        let line_id = db
            .insert_statement_line(&crate::models::NewStatementLine {
                movement_date: date(2025, 6, 10),
                bank_account: "001".to_string(),
                memo: "pagamento".to_string(),
                document_ref: None,
                amount: -400.0,
                running_balance: None,
                import_hash: "h1".to_string(),
            })
            .unwrap()
            .unwrap();
        db.set_reconciliation_link(line_id, Some(id)).unwrap();

        let outcome = ops.cancel(&ctx(), id).unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains("unlink"));

        db.set_reconciliation_link(line_id, None).unwrap();
        assert!(ops.cancel(&ctx(), id).unwrap().success);
    }

    #[test]
    fn mutations_drop_cached_reports() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        cache
            .set(crate::cache::NS_REPORTS, "stale-report", &1_u32, crate::cache::REPORT_TTL)
            .unwrap();

        ops.create_entry(&ctx(), &payable(date(2025, 6, 10))).unwrap();
        let cached: Option<u32> = cache.get(crate::cache::NS_REPORTS, "stale-report");
        assert!(cached.is_none());
    }

    #[test]
    fn saved_account_is_visible_through_resolver_at_once() {
        let (db, cache, locks) = setup();
        let ops = LedgerOps::new(&db, &cache, &locks);
        let resolver = ReferenceResolver::new(&db, &cache);

        // warm the reference cache before the edit
        assert!(resolver.resolve("7.1.1").unwrap().is_none());

        ops.save_account(&ctx(), &account("7.1.1", AccountType::Expense, "Marketing"))
            .unwrap();
        let resolved = resolver.resolve("7.1.1").unwrap().unwrap();
        assert_eq!(resolved.dre_group, "Marketing");

        // an update lands without waiting out the reference TTL
        let mut renamed = account("7.1.1", AccountType::Expense, "Marketing Digital");
        renamed.name = "Trafego pago".to_string();
        ops.save_account(&ctx(), &renamed).unwrap();
        let resolved = resolver.resolve("7.1.1").unwrap().unwrap();
        assert_eq!(resolved.name, "Trafego pago");
    }
}
