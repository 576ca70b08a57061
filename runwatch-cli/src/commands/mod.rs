//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod runs;
mod watch;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List the most recent runs
    List {
        /// Maximum number of runs to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Number of most recent runs to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Show a single run
    Get {
        /// Run ID
        id: String,
    },
    /// Track runs live and print lifecycle events
    ///
    /// Reads commands from stdin: `refresh`, `announce <id> [name]`,
    /// `idle`, `status`. Any other line counts as user activity.
    Watch {
        /// Number of most recent runs to track
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::List { limit, offset } => runs::list_runs(config, limit, offset).await,
        Commands::Get { id } => runs::get_run(config, &id).await,
        Commands::Watch { limit } => watch::watch_runs(config, limit).await,
    }
}
