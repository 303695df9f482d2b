use chrono::NaiveDate;

use super::*;
use crate::models::{
    round2, Account, AccountType, CashflowCategory, EntryOrigin, EntryStatus, EntryType,
    NewLedgerEntry, NewStatementLine,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn test_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.upsert_branch("Matriz").unwrap();
    db
}

fn sample_entry() -> NewLedgerEntry {
    NewLedgerEntry {
        entry_type: EntryType::Payable,
        status: EntryStatus::Forecast,
        accrual_date: date(2025, 6, 1),
        due_date: Some(date(2025, 6, 15)),
        payment_date: None,
        branch_id: 1,
        cost_center_id: None,
        management_account: "5.1.1".to_string(),
        accounting_account: Some("2.1.01".to_string()),
        revenue_group: None,
        channel_id: None,
        description: "Aluguel junho".to_string(),
        gross_amount: 2_500.0,
        discount: 0.0,
        interest: 0.0,
        penalty: 0.0,
        net_amount: 2_500.0,
        origin: EntryOrigin::Manual,
        notes: Some("contrato 2024".to_string()),
    }
}

fn sample_line(memo: &str, amount: f64) -> NewStatementLine {
    NewStatementLine {
        movement_date: date(2025, 6, 15),
        bank_account: "001-12345".to_string(),
        memo: memo.to_string(),
        document_ref: None,
        amount,
        running_balance: Some(10_000.0),
        import_hash: format!("{memo}|{amount}"),
    }
}

#[test]
fn test_entry_round_trip() {
    let db = test_db();
    let id = db.insert_entry(&sample_entry()).unwrap();

    let entry = db.get_entry(id).unwrap().unwrap();
    assert_eq!(entry.entry_type, EntryType::Payable);
    assert_eq!(entry.status, EntryStatus::Forecast);
    assert_eq!(entry.accrual_date, date(2025, 6, 1));
    assert_eq!(entry.due_date, Some(date(2025, 6, 15)));
    assert_eq!(entry.payment_date, None);
    assert_eq!(entry.management_account, "5.1.1");
    assert_eq!(entry.net_amount, 2_500.0);
    assert_eq!(entry.notes.as_deref(), Some("contrato 2024"));
    assert_eq!(entry.linked_statement_id, None);
}

#[test]
fn test_get_missing_entry() {
    let db = test_db();
    assert!(db.get_entry(42).unwrap().is_none());
}

#[test]
fn test_filter_by_status_and_type() {
    let db = test_db();
    db.insert_entry(&sample_entry()).unwrap();
    let mut realized = sample_entry();
    realized.status = EntryStatus::Realized;
    realized.payment_date = Some(date(2025, 6, 16));
    realized.entry_type = EntryType::Receivable;
    db.insert_entry(&realized).unwrap();

    let forecasts = db
        .list_entries(&EntryFilter::new().status(Some(EntryStatus::Forecast)))
        .unwrap();
    assert_eq!(forecasts.len(), 1);

    let receivables = db
        .list_entries(&EntryFilter::new().entry_type(Some(EntryType::Receivable)))
        .unwrap();
    assert_eq!(receivables.len(), 1);
    assert_eq!(receivables[0].entry_type, EntryType::Receivable);

    assert_eq!(db.count_entries(&EntryFilter::new()).unwrap(), 2);
}

#[test]
fn test_filter_by_date_field() {
    let db = test_db();
    db.insert_entry(&sample_entry()).unwrap();

    // accrual June 1, due June 15
    let by_accrual = db
        .list_entries(&EntryFilter::new().date_range(
            DateField::Accrual,
            date(2025, 6, 1),
            date(2025, 6, 5),
        ))
        .unwrap();
    assert_eq!(by_accrual.len(), 1);

    let by_due = db
        .list_entries(&EntryFilter::new().date_range(
            DateField::Due,
            date(2025, 6, 1),
            date(2025, 6, 5),
        ))
        .unwrap();
    assert!(by_due.is_empty());
}

#[test]
fn test_settle_recomputes_net() {
    let db = test_db();
    let id = db.insert_entry(&sample_entry()).unwrap();

    db.settle_entry(id, date(2025, 6, 20), 25.5, 10.0).unwrap();

    let entry = db.get_entry(id).unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Realized);
    assert_eq!(entry.payment_date, Some(date(2025, 6, 20)));
    assert_eq!(entry.interest, 25.5);
    assert_eq!(entry.penalty, 10.0);
    assert_eq!(entry.net_amount, round2(2_500.0 + 25.5 + 10.0));
}

#[test]
fn test_settle_missing_entry_is_not_found() {
    let db = test_db();
    let err = db.settle_entry(7, date(2025, 6, 20), 0.0, 0.0).unwrap_err();
    assert!(matches!(err, crate::error::Error::NotFound(_)));
}

#[test]
fn test_cancel_is_a_soft_delete() {
    let db = test_db();
    let id = db.insert_entry(&sample_entry()).unwrap();
    db.cancel_entry(id).unwrap();

    let entry = db.get_entry(id).unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Canceled);
}

#[test]
fn test_statement_import_dedup() {
    let db = test_db();
    let lines = vec![sample_line("PIX", -150.0), sample_line("TED", 900.0)];

    let first = db.import_statement_lines(&lines).unwrap();
    assert_eq!(first.imported, 2);
    assert_eq!(first.skipped, 0);

    let second = db.import_statement_lines(&lines).unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped, 2);

    assert_eq!(db.list_statement_lines(None).unwrap().len(), 2);
}

#[test]
fn test_reconciliation_link_is_symmetric() {
    let db = test_db();
    let entry_id = db.insert_entry(&sample_entry()).unwrap();
    let line_id = db
        .insert_statement_line(&sample_line("boleto", -2_500.0))
        .unwrap()
        .unwrap();

    db.set_reconciliation_link(line_id, Some(entry_id)).unwrap();
    let line = db.get_statement_line(line_id).unwrap().unwrap();
    let entry = db.get_entry(entry_id).unwrap().unwrap();
    assert!(line.reconciled);
    assert_eq!(line.linked_entry_id, Some(entry_id));
    assert_eq!(entry.linked_statement_id, Some(line_id));

    db.set_reconciliation_link(line_id, None).unwrap();
    let line = db.get_statement_line(line_id).unwrap().unwrap();
    let entry = db.get_entry(entry_id).unwrap().unwrap();
    assert!(!line.reconciled);
    assert_eq!(line.linked_entry_id, None);
    assert_eq!(entry.linked_statement_id, None);
}

#[test]
fn test_list_statement_lines_by_reconciled() {
    let db = test_db();
    let entry_id = db.insert_entry(&sample_entry()).unwrap();
    let linked = db
        .insert_statement_line(&sample_line("linked", -2_500.0))
        .unwrap()
        .unwrap();
    db.insert_statement_line(&sample_line("open", 75.0))
        .unwrap()
        .unwrap();
    db.set_reconciliation_link(linked, Some(entry_id)).unwrap();

    assert_eq!(db.list_statement_lines(Some(true)).unwrap().len(), 1);
    assert_eq!(db.list_statement_lines(Some(false)).unwrap().len(), 1);
}

#[test]
fn test_account_upsert_updates_in_place() {
    let db = test_db();
    let mut account = Account {
        code: "5.1.1".to_string(),
        name: "Aluguel".to_string(),
        account_type: AccountType::Expense,
        dre_group: "Despesas Administrativas".to_string(),
        dre_subgroup: None,
        cashflow_category: Some(CashflowCategory::Operating),
        fixed_variable: None,
        cost_class: None,
    };
    db.upsert_account(&account).unwrap();
    account.name = "Aluguel e condomínio".to_string();
    db.upsert_account(&account).unwrap();

    let accounts = db.load_accounts().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Aluguel e condomínio");
    assert!(db.account_exists("5.1.1").unwrap());
    assert!(!db.account_exists("9.9.9").unwrap());
}

#[test]
fn test_branch_upsert_is_idempotent_by_name() {
    let db = test_db();
    let id1 = db.upsert_branch("Filial Sul").unwrap();
    let id2 = db.upsert_branch("Filial Sul").unwrap();
    assert_eq!(id1, id2);
    assert!(db.branch_exists(id1).unwrap());
    assert_eq!(db.load_branches().unwrap().len(), 2);
}

#[test]
fn test_unlinked_only_filter() {
    let db = test_db();
    let linked_entry = db.insert_entry(&sample_entry()).unwrap();
    db.insert_entry(&sample_entry()).unwrap();
    let line = db
        .insert_statement_line(&sample_line("x", -2_500.0))
        .unwrap()
        .unwrap();
    db.set_reconciliation_link(line, Some(linked_entry)).unwrap();

    let open = db
        .list_entries(&EntryFilter::new().unlinked_only(true))
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_ne!(open[0].id, linked_entry);
}
