//! Scenario harness
//!
//! Reads YAML scenarios that bundle a page fixture, its scripted reactions
//! and the tours to run, and checks each run against its expected outcome.

mod config;
mod runner;

pub use config::*;
pub use runner::{load_scenario, run_scenario, run_scenario_until, ScenarioResult, TourResult};
