//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, status) and shared utilities (open_db)
//! - `entries` - Ledger entry commands (add, list, settle, cancel)
//! - `import` - Bank statement CSV import
//! - `master` - Master data commands (accounts, branches, channels, cost centers)
//! - `reconcile` - Reconciliation commands (suggest, auto, bulk, link, unlink)
//! - `reports` - Report commands (dre, cashflow, timeline, kpis, dashboard)

pub mod core;
pub mod entries;
pub mod import;
pub mod master;
pub mod reconcile;
pub mod reports;

// Re-export command functions for main.rs
pub use self::core::*;
pub use entries::*;
pub use import::*;
pub use master::*;
pub use reconcile::*;
pub use reports::*;

use chrono::Local;
use fluxo_core::Period;

/// The period to report on when none was given
pub fn default_period(requested: Option<Period>) -> Period {
    requested.unwrap_or_else(|| Period::of(Local::now().date_naive()))
}

/// Format an amount as Brazilian currency, e.g. `R$ 1.234,56`
pub fn format_brl(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, frac)
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brl_formatting() {
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(1234.56), "R$ 1.234,56");
        assert_eq!(format_brl(-987654.3), "-R$ 987.654,30");
        assert_eq!(format_brl(10.005), "R$ 10,01");
    }

    #[test]
    fn truncate_respects_multibyte() {
        assert_eq!(truncate("curto", 10), "curto");
        assert_eq!(truncate("Demonstração do Resultado", 10), "Demonst...");
    }
}
