//! CLI command handling
//!
//! Dispatches CLI commands to the scenario harness and formats output.

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{load_scenario, run_scenario};
use crate::tour::StepKind;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            scenario,
            tour,
            timeout_ms,
            step_delay_ms,
            poll_interval_ms,
            debug,
            json,
        } => {
            let mut options = Config::load()?.run_options();
            if let Some(ms) = timeout_ms {
                options.timeout_ms_per_step = ms;
            }
            if let Some(ms) = step_delay_ms {
                options.step_delay_ms = ms;
            }
            if let Some(ms) = poll_interval_ms {
                options.poll_interval_ms = ms;
            }
            options.debug |= debug;

            let result = run_scenario(&scenario, tour.as_deref(), options, json).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }

            if result.passed() {
                Ok(())
            } else if result.interrupted {
                Err(Error::TestAssertion(format!(
                    "Interrupted after {} tour(s)",
                    result.tours.len()
                )))
            } else {
                let failed = result.tours.iter().filter(|t| !t.passed).count();
                Err(Error::TestAssertion(format!(
                    "{} of {} tours did not meet expectations",
                    failed,
                    result.tours.len()
                )))
            }
        }

        Commands::List { scenario } => {
            let (_, registry) = load_scenario(&scenario)?;

            if registry.is_empty() {
                println!("No tours defined");
                return Ok(());
            }

            println!("Tours:");
            for tour in registry.iter() {
                let actions = tour
                    .steps()
                    .iter()
                    .filter(|s| matches!(s.kind(), StepKind::Act(_)))
                    .count();
                println!(
                    "  {} {}",
                    tour.name().bold(),
                    format!("({} steps, {} actions)", tour.len(), actions).dimmed()
                );
            }

            Ok(())
        }

        Commands::Check { scenario } => {
            let (loaded, registry) = load_scenario(&scenario)?;
            let steps: usize = registry.iter().map(|t| t.len()).sum();

            println!(
                "{} {} is valid: {} tours, {} steps, {} reactions",
                "✓".green(),
                loaded.name,
                registry.len(),
                steps,
                loaded.reactions.len()
            );

            Ok(())
        }
    }
}
