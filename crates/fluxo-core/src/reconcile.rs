//! Bank statement reconciliation
//!
//! Matches imported statement lines against open ledger entries. Three
//! layers: scored suggestions for one line, automatic linking of
//! high-confidence matches, and a greedy bulk pass that pairs lines and
//! entries pooled by exact amount.
//!
//! Linking is symmetric: the statement line records the entry id and the
//! entry records the statement id, updated together in one transaction.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{Cache, NS_REPORTS};
use crate::context::{RequestContext, RunBudget};
use crate::db::{Database, EntryFilter};
use crate::error::{Error, Result};
use crate::models::{BankStatementLine, EntryStatus, EntryType, LedgerEntry};

/// Tuning knobs for the matcher
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Maximum absolute difference for two amounts to count as equal
    pub amount_tolerance: f64,
    /// Candidates farther than this many days from the movement are dropped
    pub max_day_distance: i64,
    /// Minimum confidence for automatic linking
    pub min_confidence: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: 0.01,
            max_day_distance: 7,
            min_confidence: 80,
        }
    }
}

/// A scored candidate pairing for one statement line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub statement_id: i64,
    pub entry_id: i64,
    /// 0-100; 50 base for an amount match, plus payment-date proximity
    /// and settlement status
    pub confidence: u32,
    pub amount: f64,
    /// Days between the statement movement and the entry's effective date
    pub day_distance: i64,
    pub entry_description: String,
    /// Human-readable account of the scoring components
    pub reason: String,
}

/// Tally of an automatic reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct AutoReconcileResult {
    pub scanned: usize,
    pub linked: usize,
    /// Lines skipped because their best candidate was already claimed
    pub contested: usize,
    /// Lines whose link failed at the store; logged and left pending
    pub failed: usize,
}

/// Tally of a greedy bulk pass
#[derive(Debug, Clone, Default)]
pub struct BulkReconcileResult {
    pub pools: usize,
    pub linked: usize,
    /// Pairings whose link failed at the store; logged and left pending
    pub failed: usize,
}

pub struct Reconciler<'a> {
    db: &'a Database,
    cache: &'a Cache,
    config: MatchConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache) -> Self {
        Self::with_config(db, cache, MatchConfig::default())
    }

    pub fn with_config(db: &'a Database, cache: &'a Cache, config: MatchConfig) -> Self {
        Self { db, cache, config }
    }

    /// Rank open entries against one statement line, best first.
    ///
    /// Only entries whose net amount matches the line within tolerance and
    /// whose effective date falls inside the day window are offered.
    pub fn suggest_matches(
        &self,
        ctx: &RequestContext,
        statement_id: i64,
    ) -> Result<Vec<MatchSuggestion>> {
        let line = self.statement_line(statement_id)?;
        if line.reconciled {
            return Err(Error::Validation(format!(
                "Statement line {} is already reconciled",
                statement_id
            )));
        }
        let candidates = self.open_entries()?;
        let mut suggestions: Vec<MatchSuggestion> = candidates
            .iter()
            .filter_map(|entry| self.score(&line, entry))
            .collect();
        suggestions.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| a.day_distance.cmp(&b.day_distance))
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        debug!(
            correlation = %ctx.correlation_id,
            statement = statement_id,
            candidates = suggestions.len(),
            "ranked match candidates"
        );
        Ok(suggestions)
    }

    /// Link every unreconciled line whose best suggestion clears the
    /// confidence floor. Each entry is claimed at most once per pass; a
    /// line whose best candidate is already taken is left for review, and
    /// a link that fails at the store is logged and skipped, never
    /// aborting the pass.
    pub fn auto_reconcile(&self, ctx: &RequestContext) -> Result<AutoReconcileResult> {
        let lines = self.db.list_statement_lines(Some(false))?;
        let candidates = self.open_entries()?;
        let mut claimed: HashSet<i64> = HashSet::new();
        let mut result = AutoReconcileResult::default();

        for line in &lines {
            result.scanned += 1;
            let mut scored: Vec<MatchSuggestion> = candidates
                .iter()
                .filter(|e| !claimed.contains(&e.id))
                .filter_map(|entry| self.score(line, entry))
                .collect();
            scored.sort_by(|a, b| {
                b.confidence
                    .cmp(&a.confidence)
                    .then_with(|| a.day_distance.cmp(&b.day_distance))
            });
            let Some(best) = scored.first() else {
                continue;
            };
            if best.confidence < self.config.min_confidence {
                continue;
            }
            // two equally-confident candidates make the match ambiguous
            if scored.len() > 1 && scored[1].confidence == best.confidence {
                result.contested += 1;
                continue;
            }
            if self.try_link(line.id, best.entry_id) {
                claimed.insert(best.entry_id);
                result.linked += 1;
                debug!(
                    statement = line.id,
                    entry = best.entry_id,
                    confidence = best.confidence,
                    "auto-reconciled"
                );
            } else {
                result.failed += 1;
            }
        }

        if result.linked > 0 {
            self.cache.invalidate_namespace(NS_REPORTS);
        }
        info!(
            correlation = %ctx.correlation_id,
            scanned = result.scanned,
            linked = result.linked,
            contested = result.contested,
            failed = result.failed,
            "auto reconciliation pass finished"
        );
        Ok(result)
    }

    /// Greedy bulk pass: pool lines and entries by signed amount (to the
    /// cent), then pair each pool in date order while the day window holds.
    /// Checkpoints the budget once per pool; a link that fails at the
    /// store is logged and skipped.
    pub fn bulk_reconcile(
        &self,
        ctx: &RequestContext,
        budget: &mut RunBudget,
    ) -> Result<BulkReconcileResult> {
        let lines = self.db.list_statement_lines(Some(false))?;
        let entries = self.open_entries()?;

        let mut line_pools: HashMap<i64, Vec<&BankStatementLine>> = HashMap::new();
        for line in &lines {
            line_pools.entry(cents_key(line.amount)).or_default().push(line);
        }
        let mut entry_pools: HashMap<i64, Vec<&LedgerEntry>> = HashMap::new();
        for entry in &entries {
            entry_pools
                .entry(cents_key(signed_amount(entry)))
                .or_default()
                .push(entry);
        }

        let mut result = BulkReconcileResult::default();
        let mut keys: Vec<i64> = line_pools.keys().copied().collect();
        keys.sort_unstable();

        for key in keys {
            let Some(pool_entries) = entry_pools.get_mut(&key) else {
                continue;
            };
            budget.checkpoint(&format!("bulk:{}", key))?;
            result.pools += 1;

            let mut pool_lines = line_pools.remove(&key).unwrap_or_default();
            pool_lines.sort_by_key(|l| l.movement_date);
            pool_entries.sort_by_key(|e| effective_date(e));

            let mut taken = vec![false; pool_entries.len()];
            for line in pool_lines {
                let mut best: Option<(usize, i64)> = None;
                for (i, entry) in pool_entries.iter().enumerate() {
                    if taken[i] {
                        continue;
                    }
                    let distance = (effective_date(entry) - line.movement_date)
                        .num_days()
                        .abs();
                    if distance > self.config.max_day_distance {
                        continue;
                    }
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((i, distance));
                    }
                }
                if let Some((i, _)) = best {
                    if self.try_link(line.id, pool_entries[i].id) {
                        taken[i] = true;
                        result.linked += 1;
                    } else {
                        result.failed += 1;
                    }
                }
            }
        }

        if result.linked > 0 {
            self.cache.invalidate_namespace(NS_REPORTS);
        }
        info!(
            correlation = %ctx.correlation_id,
            pools = result.pools,
            linked = result.linked,
            failed = result.failed,
            "bulk reconciliation finished"
        );
        Ok(result)
    }

    /// Manually link a statement line to an entry. The amounts still have
    /// to agree; date distance is the operator's call.
    pub fn link(&self, ctx: &RequestContext, statement_id: i64, entry_id: i64) -> Result<()> {
        let line = self.statement_line(statement_id)?;
        if line.reconciled {
            return Err(Error::Validation(format!(
                "Statement line {} is already reconciled",
                statement_id
            )));
        }
        let entry = self
            .db
            .get_entry(entry_id)?
            .ok_or_else(|| Error::NotFound(format!("Ledger entry {} not found", entry_id)))?;
        if !entry.is_open_for_reconciliation() {
            return Err(Error::Validation(format!(
                "Ledger entry {} is not open for reconciliation",
                entry_id
            )));
        }
        if !self.amounts_agree(&line, &entry) {
            return Err(Error::Validation(format!(
                "Amount mismatch: statement {:.2} vs entry {:.2}",
                line.amount,
                signed_amount(&entry)
            )));
        }
        self.db.set_reconciliation_link(statement_id, Some(entry_id))?;
        self.cache.invalidate_namespace(NS_REPORTS);
        info!(
            correlation = %ctx.correlation_id,
            statement = statement_id,
            entry = entry_id,
            "manually linked"
        );
        Ok(())
    }

    /// Break an existing link, restoring both sides to unreconciled
    pub fn unlink(&self, ctx: &RequestContext, statement_id: i64) -> Result<()> {
        let line = self.statement_line(statement_id)?;
        if !line.reconciled {
            return Err(Error::Validation(format!(
                "Statement line {} is not reconciled",
                statement_id
            )));
        }
        self.db.set_reconciliation_link(statement_id, None)?;
        self.cache.invalidate_namespace(NS_REPORTS);
        info!(
            correlation = %ctx.correlation_id,
            statement = statement_id,
            "unlinked"
        );
        Ok(())
    }

    fn statement_line(&self, id: i64) -> Result<BankStatementLine> {
        self.db
            .get_statement_line(id)?
            .ok_or_else(|| Error::NotFound(format!("Statement line {} not found", id)))
    }

    /// Forecast or realized entries with no link yet
    fn open_entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries = self
            .db
            .list_entries(&EntryFilter::new().unlinked_only(true))?;
        entries.retain(|e| {
            e.status != EntryStatus::Canceled
                && matches!(e.entry_type, EntryType::Payable | EntryType::Receivable)
        });
        Ok(entries)
    }

    fn amounts_agree(&self, line: &BankStatementLine, entry: &LedgerEntry) -> bool {
        (line.amount - signed_amount(entry)).abs() <= self.config.amount_tolerance
    }

    /// One link attempt inside a batch pass: a store failure is logged
    /// and reported as `false`, leaving the line pending.
    fn try_link(&self, statement_id: i64, entry_id: i64) -> bool {
        match self.db.set_reconciliation_link(statement_id, Some(entry_id)) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    statement = statement_id,
                    entry = entry_id,
                    %err,
                    "link failed, line left pending"
                );
                false
            }
        }
    }

    fn score(&self, line: &BankStatementLine, entry: &LedgerEntry) -> Option<MatchSuggestion> {
        if !self.amounts_agree(line, entry) {
            return None;
        }
        let distance = (effective_date(entry) - line.movement_date).num_days().abs();
        if distance > self.config.max_day_distance {
            return None;
        }
        let mut confidence = 50;
        let mut reason = vec!["same amount".to_string()];
        // date proximity only counts against an actual payment date; an
        // unpaid forecast stays at the base score
        if entry.payment_date.is_some() {
            confidence += match distance {
                0 => 40,
                1..=3 => 30,
                _ => 10,
            };
            reason.push(match distance {
                0 => "paid the same day".to_string(),
                1 => "paid 1 day apart".to_string(),
                d => format!("paid {} days apart", d),
            });
        } else {
            reason.push("no payment recorded yet".to_string());
        }
        if entry.status == EntryStatus::Realized {
            confidence += 10;
            reason.push("entry already realized".to_string());
        }
        Some(MatchSuggestion {
            statement_id: line.id,
            entry_id: entry.id,
            confidence: confidence.min(100),
            amount: line.amount,
            day_distance: distance,
            entry_description: entry.description.clone(),
            reason: reason.join(", "),
        })
    }
}

/// Outflows are negative on a bank statement; mirror that on the entry side
fn signed_amount(entry: &LedgerEntry) -> f64 {
    match entry.entry_type {
        EntryType::Payable => -entry.net_amount,
        _ => entry.net_amount,
    }
}

/// Payment date when settled; for unpaid entries the due date (accrual as
/// a last resort) only bounds the candidate window, it earns no points
fn effective_date(entry: &LedgerEntry) -> NaiveDate {
    entry
        .payment_date
        .or(entry.due_date)
        .unwrap_or(entry.accrual_date)
}

/// Amount collapsed to integer cents, the bulk pool key
fn cents_key(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
