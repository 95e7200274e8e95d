use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDate};
use rusqlite::Connection;

use crate::db;
use crate::error::{FinmanError, Result};
use crate::models::{Account, TransactionCategory};

pub const WINDOW_UNIT_KEY: &str = "report_window_unit";
pub const WINDOW_AMOUNT_KEY: &str = "report_window_amount";

// ---------------------------------------------------------------------------
// Time window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl WindowUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

impl FromStr for WindowUnit {
    type Err = FinmanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => Ok(Self::Days),
            "weeks" | "week" | "w" => Ok(Self::Weeks),
            "months" | "month" | "m" => Ok(Self::Months),
            "years" | "year" | "y" => Ok(Self::Years),
            other => Err(FinmanError::Parse(format!(
                "unknown time unit {other:?} (expected days, weeks, months or years)"
            ))),
        }
    }
}

impl fmt::Display for WindowUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "The last `amount` `unit`s", counted back from a reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub unit: WindowUnit,
    pub amount: u32,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            unit: WindowUnit::Months,
            amount: 1,
        }
    }
}

impl TimeWindow {
    /// First day inside the window ending on `today`. Month arithmetic clamps
    /// to the end of shorter months.
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        let start = match self.unit {
            WindowUnit::Days => today.checked_sub_signed(Duration::days(i64::from(self.amount))),
            WindowUnit::Weeks => today.checked_sub_signed(Duration::weeks(i64::from(self.amount))),
            WindowUnit::Months => today.checked_sub_months(Months::new(self.amount)),
            WindowUnit::Years => {
                today.checked_sub_months(Months::new(self.amount.saturating_mul(12)))
            }
        };
        start.unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "last {} {}", self.amount, self.unit)
    }
}

/// The remembered report window, or the default when none was saved.
pub fn load_time_window(conn: &Connection) -> Result<TimeWindow> {
    let mut window = TimeWindow::default();
    if let Some(unit) = db::get_preference(conn, WINDOW_UNIT_KEY)? {
        window.unit = unit.parse()?;
    }
    if let Some(amount) = db::get_preference(conn, WINDOW_AMOUNT_KEY)? {
        window.amount = amount
            .parse()
            .map_err(|_| FinmanError::Parse(format!("stored window amount {amount:?}")))?;
    }
    Ok(window)
}

pub fn save_time_window(conn: &Connection, window: &TimeWindow) -> Result<()> {
    db::set_preference(conn, WINDOW_UNIT_KEY, window.unit.as_str())?;
    db::set_preference(conn, WINDOW_AMOUNT_KEY, &window.amount.to_string())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

pub struct AccountBalance {
    pub account: Account,
    /// `None` for an account without transactions.
    pub currency: Option<String>,
    pub balance: f64,
    pub count: i64,
}

/// Sum of transaction amounts per account and currency.
pub fn get_account_balances(conn: &Connection) -> Result<Vec<AccountBalance>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.name, t.currency, COALESCE(SUM(t.amount), 0) as balance, COUNT(t.id) \
         FROM accounts a LEFT JOIN transactions t ON a.id = t.account_id \
         GROUP BY a.id, t.currency ORDER BY a.name, t.currency",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AccountBalance {
            account: Account {
                id: row.get(0)?,
                name: row.get(1)?,
            },
            currency: row.get(2)?,
            balance: row.get(3)?,
            count: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Category breakdown
// ---------------------------------------------------------------------------

pub struct CategoryTotal {
    /// `None` collects uncategorized transactions.
    pub category: Option<TransactionCategory>,
    pub currency: String,
    pub total: f64,
    pub count: i64,
}

/// Income and expenses of one currency; amounts are never summed across
/// currencies.
pub struct CurrencyTotals {
    pub currency: String,
    pub income: f64,
    pub expenses: f64,
}

pub struct CategoryBreakdown {
    pub since: NaiveDate,
    pub categories: Vec<CategoryTotal>,
    /// One entry per currency, ordered by currency code.
    pub totals: Vec<CurrencyTotals>,
}

/// Totals per category for transactions booked on or after `since`.
/// Transactions without a booking date are left out.
pub fn get_category_breakdown(conn: &Connection, since: NaiveDate) -> Result<CategoryBreakdown> {
    let mut stmt = conn.prepare(
        "SELECT category, currency, SUM(amount) as total, COUNT(*) \
         FROM transactions WHERE booking_date >= ?1 \
         GROUP BY category, currency ORDER BY total ASC",
    )?;
    let raw: Vec<(Option<String>, String, f64, i64)> = stmt
        .query_map([since.format("%Y-%m-%d").to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let categories = raw
        .into_iter()
        .map(|(category, currency, total, count)| {
            Ok(CategoryTotal {
                category: category.map(|c| c.parse()).transpose()?,
                currency,
                total,
                count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT currency, \
                COALESCE(SUM(CASE WHEN amount > 0 THEN amount END), 0), \
                COALESCE(SUM(CASE WHEN amount < 0 THEN amount END), 0) \
         FROM transactions WHERE booking_date >= ?1 \
         GROUP BY currency ORDER BY currency",
    )?;
    let totals = stmt
        .query_map([since.format("%Y-%m-%d").to_string()], |row| {
            Ok(CurrencyTotals {
                currency: row.get(0)?,
                income: row.get(1)?,
                expenses: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(CategoryBreakdown {
        since,
        categories,
        totals,
    })
}
