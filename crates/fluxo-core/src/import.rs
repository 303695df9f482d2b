//! Bank statement CSV import
//!
//! Accepts the common export shapes Brazilian banks produce: comma or
//! semicolon delimited, dates as ISO or dd/mm/yyyy, amounts as `1234.56`
//! or `1.234,56`. Each parsed line carries a content hash so re-importing
//! the same file (or overlapping exports) never duplicates rows.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::db::{Database, StatementImportResult};
use crate::error::{Error, Result};
use crate::models::{round2, NewStatementLine};

/// Content hash identifying one statement movement across imports
pub fn generate_hash(date: NaiveDate, bank_account: &str, memo: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{date}|{bank_account}|{memo}|{amount:.2}"));
    hex::encode(hasher.finalize())
}

/// Parse statement CSV content into importable lines.
///
/// Required columns (matched case-insensitively, Portuguese or English):
/// date/data, memo/historico/descricao, amount/valor. Optional:
/// document/documento, balance/saldo.
pub fn parse_statement_csv(content: &str, bank_account: &str) -> Result<Vec<NewStatementLine>> {
    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut lines = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 2; // 1-based, after the header
        let date_raw = columns.field(&record, columns.date);
        if date_raw.is_empty() {
            debug!(row, "skipping blank row");
            continue;
        }
        let date = parse_date(date_raw)
            .ok_or_else(|| Error::Import(format!("Row {}: unparseable date '{}'", row, date_raw)))?;
        let memo = columns.field(&record, columns.memo).to_string();
        let amount_raw = columns.field(&record, columns.amount);
        let amount = parse_amount(amount_raw).ok_or_else(|| {
            Error::Import(format!("Row {}: unparseable amount '{}'", row, amount_raw))
        })?;
        let document_ref = columns
            .document
            .map(|i| columns.field(&record, i))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let running_balance = columns
            .balance
            .map(|i| columns.field(&record, i))
            .filter(|s| !s.is_empty())
            .and_then(parse_amount);

        lines.push(NewStatementLine {
            movement_date: date,
            bank_account: bank_account.to_string(),
            import_hash: generate_hash(date, bank_account, &memo, amount),
            memo,
            document_ref,
            amount,
            running_balance,
        });
    }

    if lines.is_empty() {
        return Err(Error::Import("No statement rows found in file".to_string()));
    }
    Ok(lines)
}

/// Parse a CSV file and store its lines, deduplicating by content hash
pub fn import_statement_file(
    db: &Database,
    path: &Path,
    bank_account: &str,
) -> Result<StatementImportResult> {
    let content = fs::read_to_string(path)?;
    let lines = parse_statement_csv(&content, bank_account)?;
    let result = db.import_statement_lines(&lines)?;
    info!(
        file = %path.display(),
        imported = result.imported,
        skipped = result.skipped,
        "statement import finished"
    );
    Ok(result)
}

struct ColumnMap {
    date: usize,
    memo: usize,
    amount: usize,
    document: Option<usize>,
    balance: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| -> Option<usize> {
            headers.iter().position(|h| {
                let h = normalize(h);
                names.iter().any(|n| h == *n)
            })
        };
        let date = find(&["date", "data"])
            .ok_or_else(|| Error::Import("Missing date column".to_string()))?;
        let memo = find(&["memo", "historico", "history", "descricao", "description"])
            .ok_or_else(|| Error::Import("Missing memo column".to_string()))?;
        let amount = find(&["amount", "valor", "value"])
            .ok_or_else(|| Error::Import("Missing amount column".to_string()))?;
        Ok(Self {
            date,
            memo,
            amount,
            document: find(&["document", "documento", "doc"]),
            balance: find(&["balance", "saldo"]),
        })
    }

    fn field<'r>(&self, record: &'r csv::StringRecord, index: usize) -> &'r str {
        record.get(index).unwrap_or("").trim()
    }
}

/// Lowercase and strip the accents that show up in bank headers
fn normalize(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ã' | 'â' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn detect_delimiter(content: &str) -> u8 {
    let first_line = content.lines().next().unwrap_or("");
    if first_line.matches(';').count() > first_line.matches(',').count() {
        b';'
    } else {
        b','
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

/// Handle `-1234.56`, `-1.234,56`, and currency prefixes
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.replace("R$", "").replace(' ', "").replace('\u{a0}', "");
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok().map(round2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_comma_csv_with_english_headers() {
        let content = "date,memo,document,amount,balance\n\
                       2025-06-10,PIX recebido,DOC1,1500.00,2500.00\n\
                       2025-06-11,Boleto fornecedor,,-320.50,2179.50\n";
        let lines = parse_statement_csv(content, "001-12345").unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].movement_date, date(2025, 6, 10));
        assert_eq!(lines[0].amount, 1500.0);
        assert_eq!(lines[0].document_ref.as_deref(), Some("DOC1"));
        assert_eq!(lines[1].amount, -320.5);
        assert_eq!(lines[1].document_ref, None);
        assert_eq!(lines[1].running_balance, Some(2179.5));
    }

    #[test]
    fn parses_semicolon_csv_with_brazilian_headers() {
        let content = "Data;Histórico;Valor;Saldo\n\
                       10/06/2025;TED recebida;1.234,56;5.000,00\n";
        let lines = parse_statement_csv(content, "237-9876").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].movement_date, date(2025, 6, 10));
        assert_eq!(lines[0].amount, 1234.56);
        assert_eq!(lines[0].running_balance, Some(5000.0));
    }

    #[test]
    fn same_content_hashes_identically_across_calls() {
        let a = generate_hash(date(2025, 6, 10), "001", "PIX", 150.0);
        let b = generate_hash(date(2025, 6, 10), "001", "PIX", 150.0);
        let c = generate_hash(date(2025, 6, 10), "001", "PIX", 150.01);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn missing_amount_column_is_an_import_error() {
        let content = "date,memo\n2025-06-10,algo\n";
        let err = parse_statement_csv(content, "001").unwrap_err();
        assert!(matches!(err, Error::Import(_)));
    }

    #[test]
    fn unparseable_date_names_the_row() {
        let content = "date,memo,amount\nnot-a-date,x,10.0\n";
        let err = parse_statement_csv(content, "001").unwrap_err();
        assert!(err.to_string().contains("Row 2"));
    }

    #[test]
    fn reimport_skips_existing_hashes() {
        let db = Database::in_memory().unwrap();
        let content = "date,memo,amount\n2025-06-10,PIX,100.00\n2025-06-11,TED,200.00\n";

        let first = db
            .import_statement_lines(&parse_statement_csv(content, "001").unwrap())
            .unwrap();
        assert_eq!(first.imported, 2);
        assert_eq!(first.skipped, 0);

        let second = db
            .import_statement_lines(&parse_statement_csv(content, "001").unwrap())
            .unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 2);
    }
}
