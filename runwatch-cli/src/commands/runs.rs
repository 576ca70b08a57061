//! Run command handlers
//!
//! One-shot queries against the remote run API.

use anyhow::{Context, Result};
use colored::*;
use runwatch_client::RunsClient;
use runwatch_core::domain::run::{Run, RunStatus};
use tracing::warn;

use crate::config::Config;

/// List the most recent runs
pub async fn list_runs(config: &Config, limit: usize, offset: usize) -> Result<()> {
    let client = RunsClient::new(config.remote_url.clone());
    let records = client
        .list_runs(limit, offset)
        .await
        .context("Failed to list runs")?;

    let runs: Vec<Run> = records
        .into_iter()
        .filter_map(|record| match Run::try_from(record) {
            Ok(run) => Some(run),
            Err(e) => {
                warn!("Skipping malformed run record: {}", e);
                None
            }
        })
        .collect();

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in &runs {
            print_run_summary(run);
        }
    }

    Ok(())
}

/// Get and display a single run
pub async fn get_run(config: &Config, id: &str) -> Result<()> {
    let client = RunsClient::new(config.remote_url.clone());

    let record = match client.get_run(id).await {
        Ok(record) => record,
        Err(e) if e.is_not_found() => {
            println!("{}", format!("Run {} not found.", id).yellow());
            return Ok(());
        }
        Err(e) => return Err(e).context(format!("Failed to get run {}", id)),
    };

    let run = Run::try_from(record).context("Remote returned a malformed run")?;
    print_run_details(&run);

    Ok(())
}

/// Print a run summary
pub(crate) fn print_run_summary(run: &Run) {
    println!("  {} {} {}", "▸".cyan(), run.display_name.bold(), run.id.dimmed());
    println!("    Status:   {}", colorize_status(run.status));
    println!(
        "    Created:  {}",
        run.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(duration) = run.duration() {
        println!("    Duration: {}s", duration.num_seconds());
    }
    println!();
}

/// Print detailed run information
fn print_run_details(run: &Run) {
    println!("{}", "Run Details:".bold());
    println!("  ID:        {}", run.id.cyan());
    println!("  Name:      {}", run.display_name);
    println!("  Status:    {}", colorize_status(run.status));
    println!("  Created:   {}", run.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:   {}", run.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(completed) = run.completed_at {
        println!("  Completed: {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(duration) = run.duration() {
        println!("  Duration:  {}s", duration.num_seconds());
    }

    if let Some(result) = &run.result {
        println!("\n{}", "Result:".bold());
        match serde_json::to_string_pretty(result) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{:?}", result),
        }
    }

    if let Some(error) = &run.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize run status for display
fn colorize_status(status: RunStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        RunStatus::Pending | RunStatus::Queued => label.yellow(),
        RunStatus::Running => label.cyan(),
        RunStatus::Completed => label.green(),
        RunStatus::Failed => label.red(),
    }
}
