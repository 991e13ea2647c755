//! Scenario runner implementation
//!
//! Registers a scenario's tours and runs each one against a fresh in-memory
//! document built from the scenario's fixture, then compares every run with
//! its expected outcome.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;

use crate::common::{Error, Result};
use crate::document::MemoryDocument;
use crate::tour::{Run, RunOptions, RunStatus, TourRegistry, TourRunner};

use super::config::{ExpectedStatus, TourExpectation, TourScenario};

/// Outcome of one tour within a scenario
#[derive(Debug, Serialize)]
pub struct TourResult {
    pub name: String,
    /// Whether the run matched its expectation
    pub passed: bool,
    pub run: Run,
    /// Why the expectation was not met
    pub error: Option<String>,
}

/// Outcome of a whole scenario
#[derive(Debug, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub tours: Vec<TourResult>,
    /// Set when the scenario was stopped before every tour ran
    pub interrupted: bool,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        !self.interrupted && self.tours.iter().all(|t| t.passed)
    }
}

/// Load a scenario and register its tours
pub fn load_scenario(path: &Path) -> Result<(TourScenario, TourRegistry)> {
    let mut scenario = TourScenario::from_file(path)?;
    let mut registry = TourRegistry::new();
    registry.extend(std::mem::take(&mut scenario.tours))?;
    Ok((scenario, registry))
}

/// Run a scenario from a YAML file
///
/// `only` restricts the run to one tour. `quiet` suppresses progress output.
/// Ctrl-C cancels the tour in progress and skips the rest.
pub async fn run_scenario(
    path: &Path,
    only: Option<&str>,
    options: RunOptions,
    quiet: bool,
) -> Result<ScenarioResult> {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: never interrupt
            std::future::pending::<()>().await;
        }
    };
    run_scenario_until(path, only, options, quiet, ctrl_c).await
}

/// [`run_scenario`], stopping when `interrupt` completes
///
/// The tour in progress is cancelled and recorded; later tours are not run
/// and the result is marked `interrupted`.
pub async fn run_scenario_until(
    path: &Path,
    only: Option<&str>,
    options: RunOptions,
    quiet: bool,
    interrupt: impl Future<Output = ()>,
) -> Result<ScenarioResult> {
    tokio::pin!(interrupt);
    let (scenario, registry) = load_scenario(path)?;
    let options = scenario.options.apply(options);

    let names: Vec<String> = match only {
        Some(name) => vec![registry.get(name)?.name().to_string()],
        None => registry.names().into_iter().map(str::to_string).collect(),
    };

    if !quiet {
        println!(
            "\n{} {}",
            "Running Scenario:".blue().bold(),
            scenario.name.white().bold()
        );
        if let Some(desc) = &scenario.description {
            println!("  {}", desc.dimmed());
        }
    }

    let total = names.len();
    let mut interrupted = false;
    let mut tours = Vec::with_capacity(total);
    for name in names {
        let document = Arc::new(MemoryDocument::with_reactions(
            scenario.document.clone(),
            scenario.reactions.clone(),
        ));
        let runner = TourRunner::with_defaults(document, options);
        let handle = runner.run(&registry, &name, None)?;

        let run = tokio::select! {
            run = handle.wait() => run,
            _ = &mut interrupt => {
                interrupted = true;
                handle.cancel();
                handle.wait().await
            }
        };

        let expectation = scenario.expectation(&name);
        let error = check_expectation(&run, &expectation).err().map(|e| e.to_string());
        let result = TourResult {
            name,
            passed: error.is_none(),
            run,
            error,
        };

        if !quiet {
            print_tour_result(&result);
        }
        tours.push(result);

        if interrupted {
            break;
        }
    }

    if interrupted && !quiet {
        println!(
            "\n{} {}",
            "Interrupted:".yellow().bold(),
            format!("{} of {} tours not run", total - tours.len(), total).yellow()
        );
    }

    let result = ScenarioResult {
        name: scenario.name,
        tours,
        interrupted,
    };

    if !quiet {
        if result.passed() {
            println!("\n{} {}\n", "✓".green().bold(), "Scenario Passed".green().bold());
        } else {
            println!("\n{} {}\n", "✗".red().bold(), "Scenario Failed".red().bold());
        }
    }

    Ok(result)
}

/// Compare a terminal run with what the scenario expects of it
fn check_expectation(run: &Run, expectation: &TourExpectation) -> Result<()> {
    let expected = match expectation.status {
        ExpectedStatus::Passed => RunStatus::Passed,
        ExpectedStatus::Failed => RunStatus::Failed,
    };
    if run.status != expected {
        let detail = run
            .last_error
            .as_ref()
            .map(|e| format!(": {}", e))
            .unwrap_or_default();
        return Err(Error::TestAssertion(format!(
            "Tour '{}' expected {}, got {}{}",
            run.tour, expected, run.status, detail
        )));
    }

    if let Some(expected_index) = expectation.step_index {
        let actual = run.last_error.as_ref().map(|e| e.step_index());
        if actual != Some(expected_index) {
            return Err(Error::TestAssertion(format!(
                "Tour '{}' expected to fail at step {}, failed at {:?}",
                run.tour, expected_index, actual
            )));
        }
    }

    if let Some(expected_completed) = expectation.steps_completed {
        if run.steps_completed != expected_completed {
            return Err(Error::TestAssertion(format!(
                "Tour '{}' expected {} completed steps, got {}",
                run.tour, expected_completed, run.steps_completed
            )));
        }
    }

    Ok(())
}

fn print_tour_result(result: &TourResult) {
    let run = &result.run;
    let progress = format!("{}/{} steps", run.steps_completed, run.steps_total);
    let outcome = match &run.last_error {
        Some(e) => format!("{} ({})", run.status, e),
        None => run.status.to_string(),
    };

    if result.passed {
        println!(
            "  {} {} {} {}",
            "✓".green(),
            result.name,
            progress.dimmed(),
            outcome.dimmed()
        );
    } else {
        println!("  {} {} {} {}", "✗".red(), result.name, progress.dimmed(), outcome);
        if let Some(error) = &result.error {
            println!("    {}", error.red());
        }
    }
}
