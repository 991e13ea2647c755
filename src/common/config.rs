//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::Result;
use crate::tour::RunOptions;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Default run settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Default settings applied to every run unless overridden
///
/// Keys mirror the fields of [`RunOptions`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Maximum time to wait for a step's trigger
    #[serde(default = "default_timeout_per_step")]
    pub timeout_ms_per_step: u64,

    /// Delay between trigger rechecks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Throttle inserted between consecutive steps
    #[serde(default)]
    pub step_delay_ms: u64,

    /// Log every step at INFO
    #[serde(default)]
    pub debug: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms_per_step: default_timeout_per_step(),
            poll_interval_ms: default_poll_interval(),
            step_delay_ms: 0,
            debug: false,
        }
    }
}

fn default_timeout_per_step() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    50
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| super::Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Run options derived from the `[runner]` table
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            step_delay_ms: self.runner.step_delay_ms,
            timeout_ms_per_step: self.runner.timeout_ms_per_step,
            poll_interval_ms: self.runner.poll_interval_ms,
            debug: self.runner.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.runner.timeout_ms_per_step, 10_000);
        assert_eq!(config.runner.poll_interval_ms, 50);
        assert_eq!(config.runner.step_delay_ms, 0);
        assert!(!config.runner.debug);
    }

    #[test]
    fn test_runner_table_overrides() {
        let config = Config::parse(
            r#"
[runner]
timeout_ms_per_step = 2500
step_delay_ms = 100
debug = true
"#,
        )
        .unwrap();

        let options = config.run_options();
        assert_eq!(options.timeout_ms_per_step, 2500);
        assert_eq!(options.step_delay_ms, 100);
        assert_eq!(options.poll_interval_ms, 50);
        assert!(options.debug);
    }

    #[test]
    fn test_defaults_match_run_options() {
        assert_eq!(Config::default().run_options(), RunOptions::default());
    }

    #[test]
    fn test_unknown_runner_key_is_rejected() {
        let err = Config::parse("[runner]\nstep_timeout_ms = 2500\n").unwrap_err();
        assert!(err.to_string().contains("step_timeout_ms"), "{}", err);
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::parse("[runner\ntimeout_ms_per_step = ").unwrap_err();
        assert!(matches!(err, crate::Error::ConfigParse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[runner]\npoll_interval_ms = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.runner.poll_interval_ms, 5);
    }
}
