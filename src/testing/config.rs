//! Scenario configuration types
//!
//! Defines the data structures for deserializing YAML tour scenarios: a page
//! fixture, the reactions that script it, the tours to run against it, and
//! what each tour is expected to end with.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::common::{Error, Result};
use crate::document::{ElementFixture, Reaction};
use crate::tour::{RunOptions, TourDef};

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TourScenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Root element of the page every tour starts from
    pub document: ElementFixture,
    /// Scripted page behaviour
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Tours to register and run
    pub tours: Vec<TourDef>,
    /// Expected outcomes; tours without an entry are expected to pass
    #[serde(default)]
    pub expect: Vec<TourExpectation>,
    /// Run settings overriding the configured defaults
    #[serde(default)]
    pub options: ScenarioOptions,
}

/// Expected outcome of one tour
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TourExpectation {
    /// Tour name
    pub tour: String,
    /// Expected terminal status (default: passed)
    #[serde(default)]
    pub status: ExpectedStatus,
    /// Expected failing step index (0-based)
    pub step_index: Option<usize>,
    /// Expected number of completed steps
    pub steps_completed: Option<usize>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedStatus {
    #[default]
    Passed,
    Failed,
}

/// Per-scenario run settings
#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct ScenarioOptions {
    pub timeout_ms_per_step: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub step_delay_ms: Option<u64>,
}

impl ScenarioOptions {
    /// Layer these settings over `base`
    pub fn apply(&self, base: RunOptions) -> RunOptions {
        RunOptions {
            timeout_ms_per_step: self.timeout_ms_per_step.unwrap_or(base.timeout_ms_per_step),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(base.poll_interval_ms),
            step_delay_ms: self.step_delay_ms.unwrap_or(base.step_delay_ms),
            debug: base.debug,
        }
    }
}

impl TourScenario {
    /// Parse a scenario from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let scenario: TourScenario = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse tour scenario: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_yaml(&content)
    }

    /// Expectation for `tour`, defaulting to "passes"
    pub fn expectation(&self, tour: &str) -> TourExpectation {
        self.expect
            .iter()
            .find(|e| e.tour == tour)
            .cloned()
            .unwrap_or_else(|| TourExpectation {
                tour: tour.to_string(),
                status: ExpectedStatus::Passed,
                step_index: None,
                steps_completed: None,
            })
    }

    fn validate(&self) -> Result<()> {
        for expectation in &self.expect {
            if !self.tours.iter().any(|t| t.name == expectation.tour) {
                return Err(Error::Config(format!(
                    "Expectation refers to unknown tour '{}'",
                    expectation.tour
                )));
            }
        }
        Ok(())
    }
}
