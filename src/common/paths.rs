//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/tour-runner/`
//! - macOS: `~/Library/Application Support/tour-runner/`
//! - Windows: `%APPDATA%\tour-runner\`

use std::path::PathBuf;

const APP_NAME: &str = "tour-runner";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "TOUR_RUNNER_CONFIG";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
///
/// `TOUR_RUNNER_CONFIG` wins over the platform default.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_toml() {
        if std::env::var_os(CONFIG_ENV).is_some() {
            return;
        }
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }
}
