use crate::db::{get_connection, list_accounts, list_recurring_groups, transaction_count};
use crate::error::Result;
use crate::reports::load_time_window;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Threshold:  {}", settings.suggestion_threshold);
    println!("Workers:    {}", settings.worker_threads);
    println!("Currency:   {}", settings.default_currency);

    if db_path.exists() {
        let conn = get_connection(&db_path)?;
        let accounts = list_accounts(&conn)?.len();
        let transactions = transaction_count(&conn)?;
        let groups = list_recurring_groups(&conn)?;
        let grouped: i64 = groups.iter().map(|g| g.members).sum();

        println!();
        println!("Accounts:         {accounts}");
        println!("Transactions:     {transactions}");
        println!("Recurring groups: {} ({grouped} transactions)", groups.len());
        println!("Report window:    {}", load_time_window(&conn)?);
    } else {
        println!();
        println!("Database not found. Run `finman init` to set up.");
    }

    Ok(())
}
