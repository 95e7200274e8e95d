use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{FinmanError, Result};
use crate::models::{
    Account, CurrencyAmount, RecurringGroup, RecurringGroupId, Transaction, TransactionCategory,
    TransactionId,
};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    account_id INTEGER NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS recurring_groups (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    account_id INTEGER NOT NULL,
    booking_date TEXT,
    value_date TEXT,
    counterparty TEXT,
    iban TEXT,
    bic TEXT,
    booking_text TEXT,
    usage_text TEXT,
    category TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    amount REAL NOT NULL,
    currency TEXT NOT NULL,
    recurring_group_id TEXT,
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (recurring_group_id) REFERENCES recurring_groups(id),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_dates
    ON transactions (booking_date, value_date);

CREATE TABLE IF NOT EXISTS preferences (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub fn add_account(conn: &Connection, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FinmanError::Other("account name must not be empty".to_string()));
    }
    conn.execute("INSERT INTO accounts (name) VALUES (?1)", [name])?;
    Ok(conn.last_insert_rowid())
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, name FROM accounts ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(Account {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn account_id_by_name(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM accounts WHERE name = ?1", [name], |row| row.get(0))
        .optional()?
        .ok_or_else(|| FinmanError::UnknownAccount(name.to_string()))
}

pub fn rename_account(conn: &Connection, name: &str, new_name: &str) -> Result<()> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(FinmanError::Other("account name must not be empty".to_string()));
    }
    let changed = conn.execute(
        "UPDATE accounts SET name = ?1 WHERE name = ?2",
        [new_name, name],
    )?;
    if changed == 0 {
        return Err(FinmanError::UnknownAccount(name.to_string()));
    }
    Ok(())
}

/// Delete an account together with its transactions and import batches.
/// Returns the number of transactions removed.
pub fn delete_account(conn: &Connection, name: &str) -> Result<usize> {
    let account_id = account_id_by_name(conn, name)?;
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM transactions WHERE account_id = ?1", [account_id])?;
    tx.execute("DELETE FROM imports WHERE account_id = ?1", [account_id])?;
    tx.execute("DELETE FROM accounts WHERE id = ?1", [account_id])?;
    drop_empty_groups(&tx)?;
    tx.commit()?;
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| FinmanError::Parse(format!("stored date {s:?}: {e}")))
    })
    .transpose()
}

/// Insert `transactions` into `account_id` in one database transaction.
pub fn insert_transactions(
    conn: &Connection,
    account_id: i64,
    import_id: Option<i64>,
    transactions: &[Transaction],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    write_transactions(&tx, account_id, import_id, transactions)?;
    tx.commit()?;
    Ok(transactions.len())
}

fn write_transactions(
    conn: &Connection,
    account_id: i64,
    import_id: Option<i64>,
    transactions: &[Transaction],
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO transactions (id, account_id, booking_date, value_date, counterparty, iban, bic, \
         booking_text, usage_text, category, tags, amount, currency, recurring_group_id, import_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    for t in transactions {
        stmt.execute(rusqlite::params![
            t.id.to_string(),
            account_id,
            format_date(t.booking_date),
            format_date(t.value_date),
            t.counterparty,
            t.iban,
            t.bic,
            t.booking_text,
            t.usage_text,
            t.category.map(|c| c.as_str()),
            serde_json::to_string(&t.tags)?,
            t.amount.amount,
            t.amount.currency,
            t.recurring_group.map(|g| g.to_string()),
            import_id,
        ])?;
    }
    Ok(())
}

/// Delete one transaction. Returns false when no such transaction exists.
pub fn delete_transaction(conn: &Connection, id: &TransactionId) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let deleted = tx.execute("DELETE FROM transactions WHERE id = ?1", [id.to_string()])?;
    drop_empty_groups(&tx)?;
    tx.commit()?;
    Ok(deleted > 0)
}

// Raw column values; converted outside the rusqlite row closure so that
// parse failures surface as our own errors.
struct StoredTransaction {
    id: String,
    booking_date: Option<String>,
    value_date: Option<String>,
    counterparty: Option<String>,
    iban: Option<String>,
    bic: Option<String>,
    booking_text: Option<String>,
    usage_text: Option<String>,
    category: Option<String>,
    tags: String,
    amount: f64,
    currency: String,
    recurring_group_id: Option<String>,
}

impl StoredTransaction {
    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: TransactionId::parse(&self.id)?,
            booking_date: parse_date(self.booking_date)?,
            value_date: parse_date(self.value_date)?,
            counterparty: self.counterparty,
            iban: self.iban,
            bic: self.bic,
            booking_text: self.booking_text,
            usage_text: self.usage_text,
            category: self
                .category
                .map(|c| c.parse::<TransactionCategory>())
                .transpose()?,
            tags: serde_json::from_str(&self.tags)?,
            amount: CurrencyAmount {
                amount: self.amount,
                currency: self.currency,
            },
            recurring_group: self
                .recurring_group_id
                .as_deref()
                .map(RecurringGroupId::parse)
                .transpose()?,
        })
    }
}

/// Stored transactions, oldest booking first. `None` loads every account.
pub fn load_transactions(conn: &Connection, account_id: Option<i64>) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_date, value_date, counterparty, iban, bic, booking_text, usage_text, \
         category, tags, amount, currency, recurring_group_id \
         FROM transactions WHERE ?1 IS NULL OR account_id = ?1 \
         ORDER BY booking_date, rowid",
    )?;
    let rows = stmt
        .query_map([account_id], |row| {
            Ok(StoredTransaction {
                id: row.get(0)?,
                booking_date: row.get(1)?,
                value_date: row.get(2)?,
                counterparty: row.get(3)?,
                iban: row.get(4)?,
                bic: row.get(5)?,
                booking_text: row.get(6)?,
                usage_text: row.get(7)?,
                category: row.get(8)?,
                tags: row.get(9)?,
                amount: row.get(10)?,
                currency: row.get(11)?,
                recurring_group_id: row.get(12)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(StoredTransaction::into_transaction).collect()
}

pub fn transaction_count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
}

// ---------------------------------------------------------------------------
// Recurring groups
// ---------------------------------------------------------------------------

/// Create or relabel `group` and attach `members` to it.
pub fn save_recurring_group(
    conn: &Connection,
    group: &RecurringGroup,
    members: &[TransactionId],
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO recurring_groups (id, description) VALUES (?1, ?2) \
         ON CONFLICT(id) DO UPDATE SET description = excluded.description",
        rusqlite::params![group.id.to_string(), group.description],
    )?;
    {
        let mut stmt =
            tx.prepare_cached("UPDATE transactions SET recurring_group_id = ?1 WHERE id = ?2")?;
        for id in members {
            stmt.execute(rusqlite::params![group.id.to_string(), id.to_string()])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// A group whose last member is gone has nothing left to label.
fn drop_empty_groups(conn: &Connection) -> Result<()> {
    conn.execute(
        "DELETE FROM recurring_groups WHERE id NOT IN \
         (SELECT recurring_group_id FROM transactions WHERE recurring_group_id IS NOT NULL)",
        [],
    )?;
    Ok(())
}

pub struct RecurringGroupSummary {
    pub group: RecurringGroup,
    pub members: i64,
    pub total: f64,
}

pub fn list_recurring_groups(conn: &Connection) -> Result<Vec<RecurringGroupSummary>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.description, COUNT(t.id), COALESCE(SUM(t.amount), 0) \
         FROM recurring_groups g LEFT JOIN transactions t ON t.recurring_group_id = g.id \
         GROUP BY g.id ORDER BY g.description",
    )?;
    let raw: Vec<(String, String, i64, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(id, description, members, total)| {
            Ok(RecurringGroupSummary {
                group: RecurringGroup {
                    id: RecurringGroupId::parse(&id)?,
                    description,
                },
                members,
                total,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Import batches
// ---------------------------------------------------------------------------

pub fn import_exists(conn: &Connection, checksum: &str, account_id: i64) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND account_id = ?2")?;
    Ok(stmt.exists(rusqlite::params![checksum, account_id])?)
}

pub struct ImportBatch<'a> {
    pub filename: &'a str,
    pub account_id: i64,
    pub record_count: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub checksum: &'a str,
}

pub fn record_import(conn: &Connection, batch: &ImportBatch<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO imports (filename, account_id, record_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            batch.filename,
            batch.account_id,
            batch.record_count as i64,
            format_date(batch.date_range.map(|(start, _)| start)),
            format_date(batch.date_range.map(|(_, end)| end)),
            batch.checksum,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Record an import batch and insert its transactions atomically: if any row
/// fails, neither the batch nor its checksum is kept.
pub fn store_import(
    conn: &Connection,
    batch: &ImportBatch<'_>,
    transactions: &[Transaction],
) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let import_id = record_import(&tx, batch)?;
    write_transactions(&tx, batch.account_id, Some(import_id), transactions)?;
    tx.commit()?;
    Ok(import_id)
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

pub fn get_preference(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM preferences WHERE key = ?1", [key], |r| r.get(0))
        .optional()?)
}

pub fn set_preference(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO preferences (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}
