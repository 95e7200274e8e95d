use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db::{account_id_by_name, delete_transaction, load_transactions};
use crate::error::{FinmanError, Result};
use crate::fmt::money;
use crate::models::TransactionId;
use crate::settings::load_settings;

pub fn list(account: Option<&str>) -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    let account_id = account.map(|name| account_id_by_name(&conn, name)).transpose()?;
    let transactions = load_transactions(&conn, account_id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Counterparty", "Usage", "Amount"]);
    for t in &transactions {
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(t.booking_date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(t.counterparty.as_deref().unwrap_or("")),
            Cell::new(t.usage_text.as_deref().unwrap_or("")),
            Cell::new(money(t.amount.amount, &t.amount.currency)),
        ]);
    }
    println!("Transactions ({})\n{table}", transactions.len());
    Ok(())
}

pub fn remove(id: &str) -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    let id = TransactionId::parse(id)?;
    if !delete_transaction(&conn, &id)? {
        return Err(FinmanError::Other(format!("no transaction with id {id}")));
    }
    println!("Deleted transaction {id}");
    Ok(())
}
