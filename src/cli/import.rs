use std::path::PathBuf;

use colored::Colorize;

use crate::cli::{open_db, progress_bar};
use crate::error::Result;
use crate::importer::import_file;
use crate::scheduler::BackgroundScheduler;
use crate::settings::load_settings;

pub fn run(file: &str, account: &str) -> Result<()> {
    let settings = load_settings()?;
    let conn = open_db(&settings)?;
    let scheduler = BackgroundScheduler::new(settings.worker_threads)?;
    let file_path = PathBuf::from(file);

    let (bar, progress) = progress_bar("Screening for duplicates");
    let result = import_file(
        &conn,
        &scheduler,
        &file_path,
        account,
        &settings.default_currency,
        &progress,
    );
    bar.finish_and_clear();
    let result = result?;

    if result.duplicate_file {
        println!("{}", "This file has already been imported (duplicate checksum).".yellow());
        return Ok(());
    }

    println!("{} imported", result.imported.to_string().green());
    if result.skipped_existing > 0 {
        println!("{} already present", result.skipped_existing);
    }
    if result.skipped_duplicates > 0 {
        println!("{} skipped as probable duplicates", result.skipped_duplicates);
    }
    if result.skipped_incomplete > 0 {
        println!(
            "{}",
            format!(
                "{} skipped without booking or value date",
                result.skipped_incomplete
            )
            .yellow()
        );
    }
    Ok(())
}
