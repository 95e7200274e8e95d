pub mod accounts;
pub mod import;
pub mod init;
pub mod recurring;
pub mod report;
pub mod status;
pub mod transactions;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{FinmanError, Result};
use crate::reports::WindowUnit;
use crate::scheduler::Progress;
use crate::settings::Settings;

/// Connection to the configured database; fails if `finman init` was never run.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    let path = settings.db_path();
    if !path.exists() {
        return Err(FinmanError::Other(format!(
            "database not found at {}; run `finman init` first",
            path.display()
        )));
    }
    get_connection(&path)
}

/// Terminal progress bar fed by a [`Progress`] listener.
pub(crate) fn progress_bar(message: &'static str) -> (ProgressBar, Progress) {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] {bar:25.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message);
    let listener = bar.clone();
    let progress = Progress::with_listener(move |done, total| {
        listener.set_length(total);
        listener.set_position(done);
    });
    (bar, progress)
}

#[derive(Parser)]
#[command(
    name = "finman",
    about = "Personal finance manager: bank imports, balances and recurring payments."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for finman data (default: platform data dir)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// List or delete single transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Import a Consorsbank CSV export, skipping duplicates.
    Import {
        /// Path to the CSV file
        file: String,
        /// Account name to import into
        #[arg(long)]
        account: String,
    },
    /// Review suggested recurring payments and label them.
    Recurring {
        /// Minimum similarity for two transactions to be grouped (0-1)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show current configuration and summary statistics.
    Status,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'Girokonto'
        name: String,
    },
    /// List all accounts with their balances.
    List,
    /// Rename an account.
    Rename {
        /// Current account name
        name: String,
        /// New account name
        new_name: String,
    },
    /// Delete an account together with its transactions.
    Remove {
        /// Account name
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// List stored transactions with their ids.
    List {
        /// Only transactions of this account
        #[arg(long)]
        account: Option<String>,
    },
    /// Delete one transaction by id.
    Remove {
        /// Transaction id, as shown by `transactions list`
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Balance of every account.
    Balance,
    /// Totals per category over a recent time window.
    Categories {
        /// Window unit: days, weeks, months, years (remembered)
        #[arg(long)]
        unit: Option<WindowUnit>,
        /// Number of units back from today (remembered)
        #[arg(long)]
        amount: Option<u32>,
    },
    /// Confirmed recurring payment groups.
    Recurring,
}
