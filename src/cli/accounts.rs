use colored::Colorize;
use comfy_table::{Cell, Table};
use dialoguer::Confirm;

use crate::cli::open_db;
use crate::db::{add_account, delete_account, rename_account};
use crate::error::Result;
use crate::fmt::money;
use crate::reports::get_account_balances;
use crate::settings::load_settings;

pub fn add(name: &str) -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    add_account(&conn, name)?;
    println!("Added account: {}", name.trim());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    let balances = get_account_balances(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Transactions", "Balance"]);
    for row in balances {
        let balance = match &row.currency {
            Some(currency) => money(row.balance, currency),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(row.account.id),
            Cell::new(row.account.name),
            Cell::new(row.count),
            Cell::new(balance),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn rename(name: &str, new_name: &str) -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    rename_account(&conn, name, new_name)?;
    println!("Renamed account {name} to {}", new_name.trim());
    Ok(())
}

pub fn remove(name: &str, yes: bool) -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete account {name} and all of its transactions?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }
    let removed = delete_account(&conn, name)?;
    println!("Deleted account {name} ({removed} transactions)");
    Ok(())
}
