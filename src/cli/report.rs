use std::collections::BTreeMap;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db::list_recurring_groups;
use crate::error::Result;
use crate::fmt::money;
use crate::reports::{self, WindowUnit};
use crate::settings::load_settings;

pub fn balance() -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    let balances = reports::get_account_balances(&conn)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    let mut table = Table::new();
    table.set_header(vec!["Account", "Balance"]);
    for row in &balances {
        let Some(currency) = &row.currency else {
            table.add_row(vec![Cell::new(&row.account.name), Cell::new("-")]);
            continue;
        };
        *totals.entry(currency.clone()).or_default() += row.balance;
        table.add_row(vec![
            Cell::new(&row.account.name),
            Cell::new(money(row.balance, currency)),
        ]);
    }
    for (currency, total) in &totals {
        let label = format!("TOTAL {currency}").bold();
        let amount = if *total >= 0.0 {
            money(*total, currency).green()
        } else {
            money(*total, currency).red()
        };
        table.add_row(vec![Cell::new(label), Cell::new(amount)]);
    }

    println!("Balances\n{table}");
    Ok(())
}

pub fn categories(unit: Option<WindowUnit>, amount: Option<u32>) -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    let mut window = reports::load_time_window(&conn)?;
    if unit.is_some() || amount.is_some() {
        window.unit = unit.unwrap_or(window.unit);
        window.amount = amount.unwrap_or(window.amount);
        reports::save_time_window(&conn, &window)?;
    }

    let today = chrono::Local::now().date_naive();
    let breakdown = reports::get_category_breakdown(&conn, window.start(today))?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Count", "Total"]);
    for item in &breakdown.categories {
        let name = item
            .category
            .map(|c| c.to_string())
            .unwrap_or_else(|| "Uncategorized".to_string());
        table.add_row(vec![
            Cell::new(name),
            Cell::new(item.count),
            Cell::new(money(item.total, &item.currency)),
        ]);
    }

    println!("Categories, {window} (since {})\n{table}", breakdown.since);
    for totals in &breakdown.totals {
        println!(
            "Income:   {}   Expenses: {}",
            money(totals.income, &totals.currency).green(),
            money(totals.expenses, &totals.currency).red()
        );
    }
    Ok(())
}

pub fn recurring() -> Result<()> {
    let conn = open_db(&load_settings()?)?;
    let groups = list_recurring_groups(&conn)?;
    if groups.is_empty() {
        println!("No recurring payments labelled yet. Run `finman recurring` to review suggestions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Group", "Transactions", "Total"]);
    for summary in &groups {
        table.add_row(vec![
            Cell::new(&summary.group.description),
            Cell::new(summary.members),
            Cell::new(format!("{:.2}", summary.total)),
        ]);
    }
    println!("Recurring payments\n{table}");
    Ok(())
}
