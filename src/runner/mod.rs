//! Script execution
//!
//! The [`Runner`] drives one script file at a time: parse, tag filter,
//! dataset iteration, one fresh [`ExecutionContext`] per (scenario,
//! iteration), fail-fast per scenario, evidence, report, and a single
//! browser teardown at the end.

mod context;
mod executor;
mod outcome;

pub use context::{ContextTemplate, ExecutionContext};
pub use executor::{lookup_path, Executor};
pub use outcome::{RunSummary, ScenarioResult, StepOutcome, StepStatus};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use serde_json::Value;

use crate::browser::webdriver::WebDriverLauncher;
use crate::browser::{BrowserLauncher, BrowserSlot};
use crate::common::config::Config;
use crate::common::paths::resolve_reference;
use crate::common::{Error, Result};
use crate::data::load_dataset;
use crate::evidence::EvidenceWriter;
use crate::http::{HttpClient, ReqwestClient};
use crate::report::write_report;
use crate::script::{inject, normalize_tag, parse_script, Bindings, Scenario};

/// Executes script files with one configuration and tag filter
pub struct Runner {
    config: Config,
    tag: Option<String>,
    http: Arc<dyn HttpClient>,
    launcher: Arc<dyn BrowserLauncher>,
    env: Bindings,
    evidence: EvidenceWriter,
}

impl Runner {
    /// Runner with the default HTTP client and WebDriver launcher
    ///
    /// Variables start from the process environment, after loading `.env`.
    pub fn new(config: Config, tag: Option<&str>) -> Result<Self> {
        let http = Arc::new(ReqwestClient::new()?);
        let launcher = Arc::new(WebDriverLauncher);
        Ok(Self::with_collaborators(config, tag, http, launcher).with_env(environment_bindings()))
    }

    /// Runner with explicit collaborators and no environment variables
    pub fn with_collaborators(
        config: Config,
        tag: Option<&str>,
        http: Arc<dyn HttpClient>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let evidence = EvidenceWriter::new(config.evidence.folder.clone());
        Self {
            config,
            tag: tag.map(normalize_tag).filter(|t| !t.is_empty()),
            http,
            launcher,
            env: Bindings::new(),
            evidence,
        }
    }

    /// Replace the bindings every iteration starts from
    pub fn with_env(mut self, env: Bindings) -> Self {
        self.env = env;
        self
    }

    /// Execute one script file
    ///
    /// Never fails: errors outside step execution are recorded as a system
    /// error on the summary. The browser engine, if started, is shut down
    /// before this returns.
    pub async fn execute_file(&self, path: &Path) -> RunSummary {
        let mut summary = RunSummary::new(path.to_path_buf());
        let mut browser = BrowserSlot::new(self.launcher.clone(), self.config.browser.clone());

        if let Err(e) = self.run_script(path, &mut browser, &mut summary).await {
            tracing::error!("System error in {}: {}", path.display(), e);
            println!("{} {}", "✗ System error:".red().bold(), e);
            summary.success = false;
            summary.system_error = Some(e.to_string());
        }

        if !summary.outcomes.is_empty() {
            match write_report(&self.config.reports.folder, &summary) {
                Ok(report) => summary.report = Some(report),
                Err(e) => tracing::error!("Failed to write report: {}", e),
            }
        }

        browser.shutdown().await;
        summary
    }

    async fn run_script(&self, path: &Path, browser: &mut BrowserSlot, summary: &mut RunSummary) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        let lines: Vec<&str> = content.lines().collect();
        let script = parse_script(&lines);
        let tag = self.tag.as_deref();

        if let Some(tag) = tag {
            if !script.has_tag(tag) {
                tracing::info!("Skipping {}: no scenario tagged @{}", path.display(), tag);
                summary.skipped = true;
                return Ok(());
            }
        }

        println!(
            "\n{} {}",
            "Running:".blue().bold(),
            path.display().to_string().white().bold()
        );
        if let Some(title) = &script.title {
            println!("  {}", title.dimmed());
        }

        let script_dir = path.parent();
        let dataset = match &script.data_source {
            Some(source) => {
                let data_path = locate_dataset(source, script_dir);
                tracing::info!("Data-driven run from {}", data_path.display());
                load_dataset(&data_path)?
            }
            None => vec![Bindings::new()],
        };
        if dataset.is_empty() {
            tracing::warn!("Dataset for {} has no rows; nothing to run", path.display());
        }

        let template = ContextTemplate::from_config(&self.config, self.env.clone());
        let scenarios: Vec<&Scenario> = script.filtered(tag).collect();

        for (index, row) in dataset.iter().enumerate() {
            let iteration = index + 1;
            if dataset.len() > 1 {
                println!("\n{}", format!("--- Iteration {} of {} ---", iteration, dataset.len()).cyan());
            }

            for scenario in &scenarios {
                let ctx = template.instantiate(row);
                let result = self
                    .run_scenario(scenario, iteration, ctx, browser, script_dir, &mut summary.outcomes)
                    .await;
                if !result.passed {
                    summary.success = false;
                }
                summary.scenarios.push(result);
            }
        }

        Ok(())
    }

    async fn run_scenario(
        &self,
        scenario: &Scenario,
        iteration: usize,
        mut ctx: ExecutionContext,
        browser: &mut BrowserSlot,
        script_dir: Option<&Path>,
        log: &mut Vec<StepOutcome>,
    ) -> ScenarioResult {
        tracing::info!("Scenario '{}' (iteration {})", scenario.name, iteration);
        println!("\n{} {}", "Scenario:".blue().bold(), scenario.name.white().bold());

        let mut executor = Executor {
            config: &self.config,
            http: self.http.as_ref(),
            browser,
            script_dir,
        };

        let first = log.len();
        let mut failure = None;

        for step in &scenario.steps {
            let line = inject(&step.text, &ctx.vars);
            let mut outcome = StepOutcome {
                iteration,
                scenario: scenario.name.clone(),
                name: step.description.clone().unwrap_or_else(|| line.clone()),
                command: step.text.clone(),
                status: StepStatus::Pass,
                error: None,
                error_kind: None,
                response_data: None,
                screenshot: None,
            };

            match executor.execute(&mut ctx, &line).await {
                Ok(data) => {
                    outcome.response_data = data;
                    if self.config.evidence.screenshot_on_pass {
                        outcome.screenshot = capture(&mut ctx).await;
                    }
                    println!("  {} {}", "✓".green(), outcome.name.dimmed());
                    log.push(outcome);
                }
                Err(e) => {
                    outcome.status = StepStatus::Fail;
                    outcome.error = Some(e.to_string());
                    outcome.error_kind = Some(e.kind());
                    if self.config.evidence.screenshot_on_fail {
                        outcome.screenshot = capture(&mut ctx).await;
                    }
                    println!("  {} {}", "✗".red(), outcome.name);
                    println!("    {}", e.to_string().red());
                    tracing::error!("Step failed: {}: {}", line, e);
                    failure = Some(e.to_string());
                    log.push(outcome);
                    break;
                }
            }
        }

        let steps_run = log.len() - first;
        let evidence = self.write_evidence(scenario, iteration, &ctx, &log[first..]);

        if let Some(mut page) = ctx.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!("Failed to close browser page: {}", e);
            }
        }

        ScenarioResult {
            name: scenario.name.clone(),
            iteration,
            passed: failure.is_none(),
            first_outcome: first,
            steps_run,
            steps_total: scenario.steps.len(),
            error: failure,
            evidence,
        }
    }

    /// UI evidence when a page was ever opened, API evidence otherwise
    fn write_evidence(
        &self,
        scenario: &Scenario,
        iteration: usize,
        ctx: &ExecutionContext,
        steps: &[StepOutcome],
    ) -> Option<PathBuf> {
        let written = if ctx.page_opened {
            self.evidence.write_ui(&scenario.name, iteration, steps)
        } else {
            let response = match &ctx.response {
                Some(resp) => resp.json.clone().unwrap_or_else(|| Value::String(resp.text())),
                None => Value::Null,
            };
            self.evidence
                .write_api(&scenario.name, iteration, ctx.last_method.as_deref(), &response)
        };

        match written {
            Ok(path) => {
                tracing::info!("Evidence: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::error!("Failed to write evidence for '{}': {}", scenario.name, e);
                None
            }
        }
    }
}

/// Screenshot of the open page, if any; failures are logged and ignored
async fn capture(ctx: &mut ExecutionContext) -> Option<Vec<u8>> {
    let page = ctx.page.as_deref_mut()?;
    match page.screenshot().await {
        Ok(png) => Some(png),
        Err(e) => {
            tracing::warn!("Could not capture screenshot: {}", e);
            None
        }
    }
}

/// Dataset path: search path first, then beside the script
fn locate_dataset(source: &str, script_dir: Option<&Path>) -> PathBuf {
    if let Some(found) = resolve_reference(source) {
        return found;
    }
    if let Some(dir) = script_dir {
        let beside = dir.join(source);
        if beside.is_file() {
            return beside;
        }
    }
    PathBuf::from(source)
}

/// Process environment as string bindings, after loading `.env`
pub fn environment_bindings() -> Bindings {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    std::env::vars()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}
