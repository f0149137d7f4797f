//! CLI command handling
//!
//! Dispatches CLI commands to the runner and prints the run totals.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::runner::{RunSummary, Runner};

const DEMO_FEATURE: &str = "\
Feature: Demo

# @smoke
Scenario: Fetch a user
  Given url '#(BASE_URL)'
  And path 'users/1'
  When method get
  Then status 200
  And match response.id == 1
  And match response.email == '#string'
";

const DEMO_ENV: &str = "BASE_URL=https://jsonplaceholder.typicode.com\n";

/// Dispatch a CLI command; `Ok(false)` means at least one script failed
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            path,
            tags,
            config,
            verbose,
        } => run(&path, tags.as_deref(), config.as_deref(), verbose).await,

        Commands::Init => {
            init(Path::new("."))?;
            Ok(true)
        }
    }
}

async fn run(path: &Path, tags: Option<&str>, config: Option<&Path>, verbose: bool) -> Result<bool> {
    let config = Config::load(config)?;
    logging::init_cli(verbose || config.logging.verbose);

    if !path.exists() {
        return Err(Error::Config(format!("Path not found: {}", path.display())));
    }

    let files = collect_features(path)?;
    if files.is_empty() {
        println!("No .feature files found under {}", path.display());
        return Ok(true);
    }

    let runner = Runner::new(config, tags)?;
    let mut summaries = Vec::with_capacity(files.len());
    for file in &files {
        summaries.push(runner.execute_file(file).await);
    }

    print_totals(&summaries);
    Ok(summaries.iter().all(|s| s.success))
}

fn print_totals(summaries: &[RunSummary]) {
    let executed: Vec<&RunSummary> = summaries.iter().filter(|s| !s.skipped).collect();
    let scenarios: usize = executed.iter().map(|s| s.scenarios.len()).sum();
    let passed: usize = executed.iter().map(|s| s.passed_scenarios()).sum();
    let failed = scenarios - passed;
    let skipped = summaries.len() - executed.len();

    println!();
    println!("{}", "=".repeat(50));
    let status = if summaries.iter().all(|s| s.success) {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{} {} files, {} scenarios ({} passed, {} failed), {} skipped",
        status,
        executed.len(),
        scenarios,
        passed,
        failed,
        skipped
    );
    for summary in &executed {
        if let Some(report) = &summary.report {
            println!("  Report: {}", report.display());
        }
        if let Some(error) = &summary.system_error {
            println!("  {} {}: {}", "✗".red(), summary.script.display(), error);
        }
    }
}

/// A single file, or every `.feature` file under a directory in sorted order
pub fn collect_features(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
            } else if entry_path.extension().and_then(|e| e.to_str()) == Some("feature") {
                files.push(entry_path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Scaffold a project under `root`; existing files are left untouched
pub fn init(root: &Path) -> Result<Vec<PathBuf>> {
    for dir in ["tests/features", "tests/data", "reports", "evidence"] {
        std::fs::create_dir_all(root.join(dir))?;
    }

    let files = [
        (".env", DEMO_ENV),
        ("tests/features/demo.feature", DEMO_FEATURE),
        ("stepwright.config.yaml.example", Config::example_yaml()),
    ];

    let mut created = Vec::new();
    for (name, content) in files {
        let path = root.join(name);
        if path.exists() {
            println!("  {} {} (exists)", "-".dimmed(), name);
            continue;
        }
        std::fs::write(&path, content)?;
        println!("  {} {}", "+".green(), name);
        created.push(path);
    }

    println!("{}", "Project initialized.".green().bold());
    println!("Run the demo with: stepwright run tests/features");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_features_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        std::fs::write(dir.path().join("b/nested/z.feature"), "print 1").unwrap();
        std::fs::write(dir.path().join("a.feature"), "print 1").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = collect_features(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.feature"));
        assert!(files[1].ends_with("b/nested/z.feature"));
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "KEEP=1\n").unwrap();

        let created = init(dir.path()).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join(".env")).unwrap(), "KEEP=1\n");
        assert!(dir.path().join("tests/features/demo.feature").is_file());
        assert!(dir.path().join("evidence").is_dir());

        let example = std::fs::read_to_string(dir.path().join("stepwright.config.yaml.example")).unwrap();
        assert!(Config::from_yaml(&example).is_ok());
    }
}
