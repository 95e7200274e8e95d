use std::collections::HashMap;

use colored::Colorize;
use comfy_table::{Cell, Table};
use dialoguer::{Confirm, Input, MultiSelect};
use tracing::info;

use crate::cli::{open_db, progress_bar};
use crate::db::{get_connection, list_recurring_groups, load_transactions, save_recurring_group};
use crate::error::{FinmanError, Result};
use crate::fmt::{money, percent};
use crate::models::{RecurringGroupId, TransactionId};
use crate::recurring::{RecurringCluster, SessionState, Suggestion, SuggestionSession};
use crate::scheduler::{BackgroundScheduler, TaskHandle};
use crate::settings::load_settings;

fn print_cluster(cluster: &RecurringCluster, position: usize, total: usize) {
    println!("{}", "\u{2500}".repeat(60));
    println!(
        "  Suggestion {}/{}: {} transactions, {} similar",
        position + 1,
        total,
        cluster.members.len(),
        percent(cluster.average_similarity)
    );
    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Counterparty", "Usage", "Amount"]);
    for (i, t) in cluster.members.iter().enumerate() {
        let amount = money(t.amount.amount, &t.amount.currency);
        let amount = if t.amount.amount < 0.0 {
            amount.red()
        } else {
            amount.green()
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(t.booking_date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(t.counterparty.as_deref().unwrap_or("")),
            Cell::new(t.usage_text.as_deref().unwrap_or("")),
            Cell::new(amount),
        ]);
    }
    println!("{table}");
}

/// `None` takes the whole cluster.
fn pick_members(cluster: &RecurringCluster) -> Result<Option<Vec<TransactionId>>> {
    let take_all = Confirm::new()
        .with_prompt("Include all transactions?")
        .default(true)
        .interact()?;
    if take_all {
        return Ok(None);
    }
    let items: Vec<String> = cluster
        .members
        .iter()
        .map(|t| {
            format!(
                "{} {} {}",
                t.booking_date.map(|d| d.to_string()).unwrap_or_default(),
                t.label(),
                money(t.amount.amount, &t.amount.currency)
            )
        })
        .collect();
    let chosen = MultiSelect::new()
        .with_prompt("Select transactions (space to toggle)")
        .items(&items)
        .interact()?;
    Ok(Some(chosen.into_iter().map(|i| cluster.members[i].id).collect()))
}

pub fn run(threshold: Option<f64>) -> Result<()> {
    let settings = load_settings()?;
    let threshold = threshold.unwrap_or(settings.suggestion_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(FinmanError::Other(format!(
            "threshold must be between 0 and 1, got {threshold}"
        )));
    }

    let conn = open_db(&settings)?;
    let mut transactions = load_transactions(&conn, None)?;
    if transactions.len() < 2 {
        println!("{}", "Not enough transactions to look for recurring payments.".yellow());
        return Ok(());
    }
    let mut labels: HashMap<RecurringGroupId, String> = list_recurring_groups(&conn)?
        .into_iter()
        .map(|summary| (summary.group.id, summary.group.description))
        .collect();

    let scheduler = BackgroundScheduler::new(settings.worker_threads)?;
    let mut session = SuggestionSession::new(threshold);
    let mut pending: Vec<TaskHandle<Result<()>>> = Vec::new();
    let mut use_cache = false;

    // Saves already queued are awaited even when the review stops on an error.
    let outcome: Result<()> = 'search: loop {
        let (bar, progress) = progress_bar("Comparing transactions");
        let computed = scheduler.install_parallel(|| {
            session
                .compute(&transactions, use_cache, &progress)
                .map(|_| ())
        });
        bar.finish_and_clear();
        if let Err(e) = computed {
            break 'search Err(e);
        }

        loop {
            let total = session.clusters().len();
            let position = match session.state() {
                SessionState::Presenting(i) => i,
                _ => 0,
            };
            let cluster = match session.current() {
                Ok(Suggestion::Exhausted) => {
                    println!("{}", "No more suggestions.".green());
                    break 'search Ok(());
                }
                Ok(Suggestion::Cluster(cluster)) => cluster.clone(),
                Err(e) => break 'search Err(e),
            };
            print_cluster(&cluster, position, total);

            let default_label = cluster
                .suggested_group()
                .and_then(|id| labels.get(&id).cloned())
                .unwrap_or_else(|| cluster.members[0].label().to_string());
            let choice: String = match Input::new()
                .with_prompt("Group name (s=skip, q=quit)")
                .default(default_label)
                .interact_text()
            {
                Ok(choice) => choice,
                Err(e) => break 'search Err(e.into()),
            };

            match choice.trim() {
                "q" | "Q" => {
                    println!("{}", "Review paused.".yellow());
                    session.cancel();
                    break 'search Ok(());
                }
                "s" | "S" => {
                    if let Err(e) = session.skip() {
                        break 'search Err(e);
                    }
                }
                label => {
                    let selection = match pick_members(&cluster) {
                        Ok(selection) => selection,
                        Err(e) => break 'search Err(e),
                    };
                    if selection.as_ref().is_some_and(|ids| ids.is_empty()) {
                        println!("{}", "Nothing selected.".yellow());
                        continue;
                    }
                    let confirmation = match session.confirm(label, selection.as_deref()) {
                        Ok(confirmation) => confirmation,
                        Err(e) => break 'search Err(e),
                    };
                    confirmation.apply(&mut transactions);
                    labels.insert(confirmation.group.id, confirmation.group.description.clone());
                    println!(
                        "{}",
                        format!(
                            "\u{2192} {} transactions labelled as {}",
                            confirmation.members.len(),
                            confirmation.group.description
                        )
                        .green()
                    );

                    let db_path = settings.db_path();
                    pending.push(scheduler.submit_serial("save recurring group", move || {
                        let conn = get_connection(&db_path)?;
                        save_recurring_group(&conn, &confirmation.group, &confirmation.members)
                    }));
                    use_cache = true;
                    continue 'search;
                }
            }
        }
    };

    let saved = pending.len();
    for handle in pending {
        handle.wait()??;
    }
    outcome?;
    info!(saved, "recurring review finished");
    if saved > 0 {
        println!("{saved} recurring group(s) saved.");
    }
    Ok(())
}
