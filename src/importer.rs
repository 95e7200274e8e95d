use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db::{self, ImportBatch};
use crate::duplicates::{detect_duplicates, Verdict};
use crate::error::{FinmanError, Result};
use crate::models::{CurrencyAmount, Transaction, TransactionCategory};
use crate::scheduler::{BackgroundScheduler, Progress};

const CONSORSBANK_COLUMNS: usize = 11;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_empty(raw: &str) -> Option<String> {
    let s = raw.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// German number format: `.` groups thousands, `,` separates decimals.
/// An empty field is zero.
pub fn parse_german_amount(raw: &str) -> Result<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    s.replace('.', "")
        .replace(',', ".")
        .parse()
        .map_err(|_| FinmanError::Parse(format!("invalid amount {raw:?}")))
}

/// `dd.mm.yyyy`; an empty field is no date.
pub fn parse_german_date(raw: &str) -> Result<Option<NaiveDate>> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .map(Some)
        .map_err(|_| FinmanError::Parse(format!("invalid date {raw:?}")))
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn date_range(transactions: &[Transaction]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = transactions.iter().filter_map(|t| t.booking_date);
    let min = dates.clone().min()?;
    let max = dates.max()?;
    Some((min, max))
}

// ---------------------------------------------------------------------------
// Consorsbank parser
// ---------------------------------------------------------------------------

/// Parse a Consorsbank account export: `;`-separated, one header line.
///
/// Columns: booking date, value date, counterparty, IBAN, BIC, booking text,
/// usage text, category, tag, (unused), amount. Every row gets a fresh
/// identity and `currency`.
pub fn parse_consorsbank_csv(file_path: &Path, currency: &str) -> Result<Vec<Transaction>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let mut transactions = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // index 0 is the first line after the header
        let line = index + 2;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() < CONSORSBANK_COLUMNS {
            return Err(FinmanError::Parse(format!(
                "line {line}: expected {CONSORSBANK_COLUMNS} columns, found {}",
                record.len()
            )));
        }
        let with_line = |e: FinmanError| match e {
            FinmanError::Parse(msg) => FinmanError::Parse(format!("line {line}: {msg}")),
            other => other,
        };

        transactions.push(Transaction {
            booking_date: parse_german_date(&record[0]).map_err(with_line)?,
            value_date: parse_german_date(&record[1]).map_err(with_line)?,
            counterparty: non_empty(&record[2]),
            iban: non_empty(&record[3]),
            bic: non_empty(&record[4]),
            booking_text: non_empty(&record[5]),
            usage_text: non_empty(&record[6]),
            category: non_empty(&record[7])
                .map(|label| TransactionCategory::from_bank_label(&label))
                .transpose()?,
            tags: non_empty(&record[8]).into_iter().collect(),
            ..Transaction::new(CurrencyAmount::new(
                parse_german_amount(&record[10]).map_err(with_line)?,
                currency,
            ))
        });
    }
    Ok(transactions)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub imported: usize,
    /// Identical to a transaction already stored in any account.
    pub skipped_existing: usize,
    /// Matched a stored transaction of the same dates by similarity.
    pub skipped_duplicates: usize,
    /// Missing booking or value date.
    pub skipped_incomplete: usize,
    pub duplicate_file: bool,
}

/// Import a Consorsbank export into `account_name`.
///
/// A file already imported into the account (same checksum) is skipped as a
/// whole. Rows equal to a transaction stored in any account are dropped, and
/// the remaining rows are screened for fuzzy duplicates against every stored
/// transaction on the scheduler's parallel pool. The batch record and its rows
/// are written in one database transaction.
pub fn import_file(
    conn: &Connection,
    scheduler: &BackgroundScheduler,
    file_path: &Path,
    account_name: &str,
    currency: &str,
    progress: &Progress,
) -> Result<ImportResult> {
    let account_id = db::account_id_by_name(conn, account_name)?;

    let checksum = compute_checksum(file_path)?;
    if db::import_exists(conn, &checksum, account_id)? {
        info!(file = %file_path.display(), "file already imported");
        return Ok(ImportResult {
            duplicate_file: true,
            ..ImportResult::default()
        });
    }

    let parsed = parse_consorsbank_csv(file_path, currency)?;
    let existing = db::load_transactions(conn, None)?;

    let mut result = ImportResult::default();
    let candidates: Vec<Transaction> = parsed
        .into_iter()
        .filter(|candidate| {
            let known = existing.iter().any(|stored| stored.same_record(candidate));
            if known {
                result.skipped_existing += 1;
            }
            !known
        })
        .collect();

    let verdicts =
        scheduler.install_parallel(|| detect_duplicates(&candidates, &existing, progress));
    let mut accepted = Vec::with_capacity(candidates.len());
    for (candidate, verdict) in candidates.into_iter().zip(&verdicts) {
        match verdict.verdict {
            Verdict::Incomplete => {
                warn!(label = candidate.label(), "skipping row without booking or value date");
                result.skipped_incomplete += 1;
            }
            Verdict::Duplicate { similarity } => {
                info!(label = candidate.label(), similarity, "skipping probable duplicate");
                result.skipped_duplicates += 1;
            }
            Verdict::NoComparable | Verdict::Unique { .. } => accepted.push(candidate),
        }
    }

    let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    db::store_import(
        conn,
        &ImportBatch {
            filename,
            account_id,
            record_count: accepted.len(),
            date_range: date_range(&accepted),
            checksum: &checksum,
        },
        &accepted,
    )?;
    result.imported = accepted.len();

    info!(
        file = filename,
        imported = result.imported,
        skipped_existing = result.skipped_existing,
        skipped_duplicates = result.skipped_duplicates,
        skipped_incomplete = result.skipped_incomplete,
        "import finished"
    );
    Ok(result)
}
