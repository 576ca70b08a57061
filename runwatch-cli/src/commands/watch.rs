//! Watch command handler
//!
//! Runs the synchronization engine against the remote API and prints
//! lifecycle events until interrupted. Stdin lines stand in for the UI
//! signals a desktop client would send.

use anyhow::{Context, Result};
use colored::*;
use runwatch_core::domain::event::RunEvent;
use runwatch_core::domain::run::RunStatus;
use runwatch_core::dto::run::RunAnnounced;
use runwatch_engine::{SyncEngine, TickOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::commands::runs::print_run_summary;
use crate::config::Config;

/// A line read from stdin
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Refresh,
    Announce { id: String, name: Option<String> },
    Idle,
    Status,
    Activity,
    Usage(&'static str),
}

impl Input {
    fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("refresh") => Input::Refresh,
            Some("announce") => match parts.next() {
                Some(id) => {
                    let name = parts.collect::<Vec<_>>().join(" ");
                    Input::Announce {
                        id: id.to_string(),
                        name: (!name.is_empty()).then_some(name),
                    }
                }
                None => Input::Usage("announce <id> [name]"),
            },
            Some("idle") => Input::Idle,
            Some("status") => Input::Status,
            _ => Input::Activity,
        }
    }
}

/// Track runs until Ctrl-C
pub async fn watch_runs(config: &Config, limit: usize) -> Result<()> {
    let engine = SyncEngine::connect(config.engine_config(limit)?)
        .context("Failed to set up run tracking")?;
    let (_, mut events) = engine.subscribe_channel();

    println!(
        "{}",
        format!("Watching runs at {}", engine.config().remote_url).bold()
    );
    println!(
        "{}",
        "Commands: refresh | announce <id> [name] | idle | status".dimmed()
    );
    println!();

    engine.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&engine, &event),
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => handle_input(&engine, Input::parse(&line)).await,
                    None => {
                        info!("Stdin closed, still watching until Ctrl-C");
                        stdin_open = false;
                    }
                }
            }
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    engine.close();
    println!("{}", "Stopped watching.".dimmed());

    Ok(())
}

async fn handle_input(engine: &SyncEngine, input: Input) {
    match input {
        Input::Refresh => {
            let outcome = engine.refresh().await;
            print_outcome(engine, &outcome);
        }
        Input::Announce { id, name } => {
            let announced = RunAnnounced {
                display_name: name.unwrap_or_else(|| id.clone()),
                id,
                initial_status: RunStatus::Running,
            };
            let outcome = engine.announce(announced).await;
            print_outcome(engine, &outcome);
        }
        Input::Idle => {
            engine.set_user_active(false);
            println!("{}", "Marked user inactive.".dimmed());
        }
        Input::Status => print_status(engine),
        Input::Activity => engine.mark_user_activity(),
        Input::Usage(usage) => println!("{}", format!("Usage: {}", usage).yellow()),
    }
}

fn print_event(engine: &SyncEngine, event: &RunEvent) {
    let name = engine
        .run(event.run_id())
        .map(|run| run.display_name)
        .unwrap_or_else(|| event.run_id().to_string());

    match event {
        RunEvent::RunCompleted { result, .. } => {
            println!("{} {} {}", "✓".green(), name.bold(), "completed".green());
            if let Some(result) = result {
                println!("  {}", result.to_string().dimmed());
            }
        }
        RunEvent::RunFailed { error, .. } => {
            println!("{} {} {}", "✗".red(), name.bold(), "failed".red());
            println!("  {}", error.red());
        }
    }
}

fn print_outcome(engine: &SyncEngine, outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Fetched { emitted } => {
            println!("{}", format!("Fetched, {} new event(s)", emitted).dimmed())
        }
        TickOutcome::Failed => {
            let error = engine.last_error().unwrap_or_default();
            println!("{}", format!("Fetch failed: {}", error).red());
        }
        TickOutcome::Skipped(reason) => {
            println!("{}", format!("Skipped: {:?}", reason).yellow())
        }
        TickOutcome::Discarded => println!("{}", "Tracking stopped meanwhile.".dimmed()),
    }
}

fn print_status(engine: &SyncEngine) {
    let snapshot = engine.polling_snapshot();
    let runs = engine.runs();

    println!("{}", "Tracking Status:".bold());
    println!("  Running:     {}", snapshot.running);
    println!("  User active: {}", snapshot.user_active);
    println!(
        "  Tier:        {:?} (every {}s)",
        snapshot.tier,
        snapshot.interval.as_secs()
    );
    println!("  Backoff:     {}s", snapshot.state.backoff_interval.as_secs());
    println!("  Active runs: {}", engine.active_count());
    if let Some(error) = engine.last_error() {
        println!("  Last error:  {}", error.red());
    }
    println!();

    if runs.is_empty() {
        println!("{}", "No runs known yet.".yellow());
    }
    for run in &runs {
        print_run_summary(run);
    }
}
