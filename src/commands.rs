//! CLI command definitions
//!
//! Defines the clap commands for the stepwright CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a .feature file, or every .feature file under a directory
    Run {
        /// Script file or directory
        path: PathBuf,

        /// Only run scenarios carrying this tag (e.g. @smoke)
        #[arg(long, short)]
        tags: Option<String>,

        /// Configuration file (default: stepwright.config.yaml if present)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Debug-level logging
        #[arg(long, short)]
        verbose: bool,
    },

    /// Create a starter project layout in the current directory
    Init,
}
