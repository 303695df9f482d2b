//! Fluxo Core Library
//!
//! Shared functionality for the Fluxo small-business finance tool:
//! - Encrypted SQLite store for the ledger and bank statement lines
//! - Accounts payable/receivable lifecycle (forecast, settle, cancel)
//! - Management income statement (DRE) and cash-flow (DFC) calculators
//! - KPI aggregation graded against configurable benchmark tiers
//! - Bank statement CSV import with content-hash deduplication
//! - Scored statement-to-ledger reconciliation with auto and bulk passes
//! - Master-data resolver backed by a TTL cache

pub mod benchmark;
pub mod cache;
pub mod context;
pub mod db;
pub mod error;
pub mod import;
pub mod lock;
pub mod models;
pub mod ops;
pub mod reconcile;
pub mod reference;
pub mod reports;

pub use benchmark::{BenchmarkConfig, BenchmarkTier, MetricBenchmark};
pub use cache::Cache;
pub use context::{RequestContext, RunBudget};
pub use db::{Database, DateField, EntryFilter, StatementImportResult};
pub use error::{Error, Result};
pub use lock::{LockGuard, LockManager};
pub use models::{
    Account, AccountType, BankStatementLine, Branch, CashflowCategory, Channel, CostCenter,
    CostClass, EntryOrigin, EntryStatus, EntryType, FixedVariable, LedgerEntry, NewLedgerEntry,
    NewStatementLine, Period,
};
pub use ops::{LedgerOps, Outcome, SettleItem};
pub use reconcile::{
    AutoReconcileResult, BulkReconcileResult, MatchConfig, MatchSuggestion, Reconciler,
};
pub use reference::ReferenceResolver;
pub use reports::{
    CalculatedKpi, CashDirection, CashflowCalculator, CashflowLine, DashboardBuilder,
    DashboardData, DreBucket, DreCalculator, DreLine, DreStatement, DreSummary, ExpenseSummary,
    ForecastOptions, KpiEngine,
};
