//! Error types for the tour runner
//!
//! Registry misuse and malformed input surface immediately as [`Error`].
//! Failures that happen while a tour is running are never raised out of the
//! polling loop; they are recorded on the run as a [`crate::tour::RunError`].

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tour runner
#[derive(Error, Debug)]
pub enum Error {
    // === Registry Errors ===
    #[error("Tour '{0}' is already registered")]
    DuplicateName(String),

    #[error("Tour '{0}' not found. Use 'tour list <scenario>' to see registered tours")]
    NotFound(String),

    #[error("Tour '{0}' already has an active run. Cancel it or wait for it to finish first")]
    AlreadyRunning(String),

    // === Tour Definition Errors ===
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    // === Document Errors ===
    #[error("Action dispatch failed: {0}")]
    Dispatch(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),
}

impl Error {
    /// Create an invalid selector error
    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a file read error from a path and IO error
    pub fn file_read(path: &std::path::Path, error: io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}
