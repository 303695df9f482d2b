//! Per-call context and cooperative time budgets
//!
//! Computation and mutation entry points take an explicit `RequestContext`
//! instead of reading ambient state; long batch jobs carry a `RunBudget`
//! and check it between major steps, aborting with `BudgetExceeded` once
//! the wall-clock safety margin is reached. There is no cross-call
//! cancellation; a batch either finishes, reports a budget abort, or
//! reports per-item failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{Error, Result};

/// Default wall-clock budget for batch operations
pub const DEFAULT_BATCH_BUDGET: Duration = Duration::from_secs(240);

/// Safety margin subtracted from the budget
pub const DEFAULT_BUDGET_MARGIN: Duration = Duration::from_secs(30);

/// Who is calling, and under which correlation id
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id threaded through logs for one logical request
    pub correlation_id: String,
    /// Acting user, when known (authorization happened upstream)
    pub user: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            correlation_id: format!("req-{}-{}", std::process::id(), seq),
            user: None,
        }
    }

    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::new()
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative wall-clock budget for long batch jobs
#[derive(Debug)]
pub struct RunBudget {
    started: Instant,
    limit: Duration,
    margin: Duration,
    last_step: String,
}

impl RunBudget {
    pub fn new(limit: Duration, margin: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
            margin,
            last_step: "start".to_string(),
        }
    }

    /// Record that `step` completed and verify the remaining budget.
    ///
    /// Fails with `BudgetExceeded` naming the last completed step once
    /// elapsed time crosses `limit - margin`.
    pub fn checkpoint(&mut self, step: &str) -> Result<()> {
        self.last_step = step.to_string();
        let elapsed = self.started.elapsed();
        if elapsed + self.margin >= self.limit {
            warn!(step, elapsed_ms = elapsed.as_millis() as u64, "time budget exhausted");
            return Err(Error::BudgetExceeded {
                last_step: self.last_step.clone(),
            });
        }
        Ok(())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for RunBudget {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_BUDGET, DEFAULT_BUDGET_MARGIN)
    }
}
