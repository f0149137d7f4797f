//! stepwright - Gherkin-style interpreter for HTTP API and browser UI test scripts
//!
//! Scripts are plain-text scenarios of one-line steps (`url`, `method GET`,
//! `match response.id == 1`, `driver ...`, `click #go`). The [`Runner`]
//! executes them against a fresh context per scenario and dataset row, and
//! writes evidence and a report for every script.

pub mod browser;
pub mod cli;
pub mod commands;
pub mod common;
pub mod data;
pub mod evidence;
pub mod http;
pub mod matcher;
pub mod report;
pub mod runner;
pub mod script;
pub mod selector;
pub mod steps;

// Re-export commonly used types for tests
pub use common::config::Config;
pub use common::{Error, Result};
pub use runner::{RunSummary, Runner, ScenarioResult, StepOutcome, StepStatus};
