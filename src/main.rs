use clap::Parser;
use tracing_subscriber::EnvFilter;

use finman::cli::{self, AccountsCommands, Cli, Commands, ReportCommands, TransactionsCommands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add { name } => cli::accounts::add(&name),
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::Rename { name, new_name } => cli::accounts::rename(&name, &new_name),
            AccountsCommands::Remove { name, yes } => cli::accounts::remove(&name, yes),
        },
        Commands::Transactions { command } => match command {
            TransactionsCommands::List { account } => cli::transactions::list(account.as_deref()),
            TransactionsCommands::Remove { id } => cli::transactions::remove(&id),
        },
        Commands::Import { file, account } => cli::import::run(&file, &account),
        Commands::Recurring { threshold } => cli::recurring::run(threshold),
        Commands::Report { command } => match command {
            ReportCommands::Balance => cli::report::balance(),
            ReportCommands::Categories { unit, amount } => cli::report::categories(unit, amount),
            ReportCommands::Recurring => cli::report::recurring(),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
