//! Reference data resolver
//!
//! Resolves management account codes to classification metadata (DRE
//! group, cash-flow category, cost class). The full master list is loaded
//! once per cache window (1 hour) and lookups answer from an in-memory
//! map; a miss past the TTL reloads synchronously from the store. Store
//! failures propagate - stale data is never served past its TTL.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::{Cache, NS_REFERENCE, REFERENCE_TTL};
use crate::db::Database;
use crate::error::Result;
use crate::models::Account;

const ACCOUNTS_KEY: &str = "accounts";

pub struct ReferenceResolver<'a> {
    db: &'a Database,
    cache: &'a Cache,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(db: &'a Database, cache: &'a Cache) -> Self {
        Self { db, cache }
    }

    /// Resolve an account code to its master record, or None if the code
    /// is unknown to master data
    pub fn resolve(&self, code: &str) -> Result<Option<Account>> {
        let accounts = self.accounts()?;
        Ok(accounts.get(code).cloned())
    }

    /// The full account map, loaded through the reference cache
    pub fn accounts(&self) -> Result<HashMap<String, Account>> {
        self.cache
            .get_or_load(NS_REFERENCE, ACCOUNTS_KEY, REFERENCE_TTL, || {
                debug!("loading account master data from store");
                let accounts = self.db.load_accounts()?;
                Ok(accounts
                    .into_iter()
                    .map(|account| (account.code.clone(), account))
                    .collect())
            })
    }

    /// Force a reload on the next lookup (call after master-data edits)
    pub fn invalidate(&self) {
        self.cache.invalidate_namespace(NS_REFERENCE);
    }
}
