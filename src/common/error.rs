//! Error types for the script interpreter
//!
//! Every failure a step can raise maps onto one variant here. The runner
//! catches them at the step boundary and records the message in the
//! execution log, so messages should name the offending step or value.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the interpreter
#[derive(Error, Debug)]
pub enum Error {
    // === Script Errors ===
    #[error("Error in step '{step}': {reason}")]
    StepExecution { step: String, reason: String },

    // === HTTP Errors ===
    #[error("Connection error: {0}")]
    ApiConnection(String),

    // === Data Errors ===
    #[error("Data file error: {0}")]
    DataFile(String),

    // === Assertion Errors ===
    #[error("Assertion failed: {0}")]
    Assertion(String),

    // === Browser Errors ===
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Browser driver failed to start: {0}")]
    DriverStartFailed(String),

    #[error("No browser page is open. Start one with 'driver <url>' first")]
    NoPage,

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a step execution error for a script line
    pub fn step<S: Into<String>>(step: &str, reason: S) -> Self {
        Self::StepExecution {
            step: step.to_string(),
            reason: reason.into(),
        }
    }

    /// Create the error raised when no step rule matches a line
    pub fn unrecognized(step: &str) -> Self {
        Self::step(step, "unrecognized command")
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Stable code for the error category, recorded in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::StepExecution { .. } => "STEP_EXECUTION",
            Error::ApiConnection(_) => "CONNECTION",
            Error::DataFile(_) | Error::FileRead { .. } => "DATA_FILE",
            Error::Assertion(_) => "ASSERTION",
            Error::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            Error::Browser(_) | Error::DriverStartFailed(_) | Error::NoPage => "BROWSER",
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG",
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_names_the_line() {
        let err = Error::unrecognized("frobnicate the widget");
        assert_eq!(err.kind(), "STEP_EXECUTION");
        assert!(err.to_string().contains("frobnicate the widget"));
        assert!(err.to_string().contains("unrecognized command"));
    }

    #[test]
    fn test_kinds_are_distinct_for_taxonomy() {
        assert_eq!(Error::ApiConnection("refused".into()).kind(), "CONNECTION");
        assert_eq!(Error::Assertion("x".into()).kind(), "ASSERTION");
        assert_eq!(Error::DataFile("x".into()).kind(), "DATA_FILE");
        assert_eq!(Error::ElementNotFound("#go".into()).kind(), "ELEMENT_NOT_FOUND");
    }
}
