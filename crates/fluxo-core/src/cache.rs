//! Namespaced typed cache with per-entry TTL
//!
//! Cache-aside collaborator for the calculators. Values are stored as JSON
//! so any serde type can be cached behind one interface. Two TTL classes
//! exist by convention:
//! - reference/master data changes rarely: 1 hour
//! - derived reports track live transactional data: 2 minutes
//!
//! Mutations to ledger entries, statement lines, or master data must call
//! `invalidate_namespace` before reporting success, so staleness stays
//! bounded by the TTL rather than unbounded.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;

/// TTL for reference/master data
pub const REFERENCE_TTL: Duration = Duration::from_secs(3600);

/// TTL for derived reports (DRE, cashflow, KPIs)
pub const REPORT_TTL: Duration = Duration::from_secs(120);

/// Namespace for reference/master data entries
pub const NS_REFERENCE: &str = "reference";

/// Namespace for derived report entries
pub const NS_REPORTS: &str = "reports";

struct Slot {
    value: serde_json::Value,
    expires_at: Instant,
}

/// In-memory namespaced cache
#[derive(Default)]
pub struct Cache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{}:{}", namespace, key)
    }

    /// Get a cached value, or None if absent or past its TTL
    pub fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let full = Self::full_key(namespace, key);
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

        match slots.get(&full) {
            Some(slot) if slot.expires_at > Instant::now() => {
                serde_json::from_value(slot.value.clone()).ok()
            }
            Some(_) => {
                // Expired: never serve stale data past TTL
                slots.remove(&full);
                None
            }
            None => None,
        }
    }

    /// Store a value under a namespace with the given TTL
    pub fn set<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let full = Self::full_key(namespace, key);
        let slot = Slot {
            value: serde_json::to_value(value)?,
            expires_at: Instant::now() + ttl,
        };
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(full, slot);
        Ok(())
    }

    /// Remove a single cached value
    pub fn remove(&self, namespace: &str, key: &str) {
        let full = Self::full_key(namespace, key);
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(&full);
    }

    /// Drop every entry in a namespace
    pub fn invalidate_namespace(&self, namespace: &str) {
        let prefix = format!("{}:", namespace);
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let before = slots.len();
        slots.retain(|key, _| !key.starts_with(&prefix));
        debug!(
            namespace,
            dropped = before - slots.len(),
            "cache namespace invalidated"
        );
    }

    /// Cache-aside read: return the cached value or load, store, and return
    pub fn get_or_load<T, F>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.get(namespace, key) {
            return Ok(hit);
        }
        let value = loader()?;
        self.set(namespace, key, &value, ttl)?;
        Ok(value)
    }
}
