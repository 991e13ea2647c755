//! CLI command definitions
//!
//! Defines the clap commands for the tour CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tours of a scenario file and check their outcomes
    Run {
        /// Path to the scenario YAML file
        scenario: PathBuf,

        /// Only run this tour
        #[arg(long, short)]
        tour: Option<String>,

        /// Maximum wait for each step's trigger, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Delay between consecutive steps, in milliseconds
        #[arg(long)]
        step_delay_ms: Option<u64>,

        /// Delay between trigger rechecks, in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Log every step as it runs
        #[arg(long)]
        debug: bool,

        /// Print the results as JSON instead of progress output
        #[arg(long)]
        json: bool,
    },

    /// List the tours of a scenario file
    #[command(alias = "ls")]
    List {
        /// Path to the scenario YAML file
        scenario: PathBuf,
    },

    /// Validate a scenario file without running it
    Check {
        /// Path to the scenario YAML file
        scenario: PathBuf,
    },
}

impl Commands {
    /// Whether verbose step logging was requested
    pub fn debug(&self) -> bool {
        matches!(self, Commands::Run { debug: true, .. })
    }
}
