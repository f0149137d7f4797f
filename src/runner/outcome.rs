//! Execution records
//!
//! Every executed step appends exactly one [`StepOutcome`] to the run's
//! log. Outcomes are never reordered or removed.

use std::path::PathBuf;

use serde::Serialize;

/// Result of one executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pass => write!(f, "PASS"),
            StepStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Dataset iteration, starting at 1
    pub iteration: usize,
    pub scenario: String,
    /// Descriptive comment, or the substituted line
    pub name: String,
    /// The step line as written in the script
    pub command: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_data: Option<String>,
    /// PNG bytes; rendered into evidence, never serialized
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

impl StepOutcome {
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Pass
    }
}

/// Result of one (scenario, iteration) pair
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub iteration: usize,
    pub passed: bool,
    /// Index of this group's first outcome in [`RunSummary::outcomes`]
    pub first_outcome: usize,
    pub steps_run: usize,
    pub steps_total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<PathBuf>,
}

impl ScenarioResult {
    /// Steps that never ran because an earlier step failed
    pub fn steps_not_run(&self) -> usize {
        self.steps_total.saturating_sub(self.steps_run)
    }
}

/// Result of one script invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub script: PathBuf,
    pub success: bool,
    /// The tag filter matched no scenario
    pub skipped: bool,
    /// Failure outside step execution (unreadable script, bad dataset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_error: Option<String>,
    pub scenarios: Vec<ScenarioResult>,
    pub outcomes: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
}

impl RunSummary {
    pub fn new(script: PathBuf) -> Self {
        Self {
            script,
            success: true,
            skipped: false,
            system_error: None,
            scenarios: Vec::new(),
            outcomes: Vec::new(),
            report: None,
        }
    }

    pub fn passed_scenarios(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed).count()
    }

    pub fn failed_scenarios(&self) -> usize {
        self.scenarios.len() - self.passed_scenarios()
    }

    /// Outcomes recorded for one scenario run, in execution order
    pub fn outcomes_of(&self, result: &ScenarioResult) -> &[StepOutcome] {
        let end = result.first_outcome + result.steps_run;
        self.outcomes.get(result.first_outcome..end).unwrap_or_default()
    }

    /// Outcomes of every (iteration, scenario) group with this name
    pub fn group<'a>(&'a self, iteration: usize, scenario: &'a str) -> impl Iterator<Item = &'a StepOutcome> {
        self.outcomes
            .iter()
            .filter(move |o| o.iteration == iteration && o.scenario == scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(iteration: usize, scenario: &str, status: StepStatus) -> StepOutcome {
        StepOutcome {
            iteration,
            scenario: scenario.to_string(),
            name: "step".to_string(),
            command: "step".to_string(),
            status,
            error: None,
            error_kind: None,
            response_data: None,
            screenshot: Some(vec![1, 2, 3]),
        }
    }

    #[test]
    fn test_screenshot_not_serialized() {
        let json = serde_json::to_value(outcome(1, "a", StepStatus::Pass)).unwrap();
        assert_eq!(json["status"], "PASS");
        assert!(json.get("screenshot").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_group_filters_by_iteration_and_scenario() {
        let mut summary = RunSummary::new(PathBuf::from("x.feature"));
        summary.outcomes = vec![
            outcome(1, "a", StepStatus::Pass),
            outcome(1, "b", StepStatus::Fail),
            outcome(2, "a", StepStatus::Pass),
        ];
        assert_eq!(summary.group(1, "a").count(), 1);
        assert_eq!(summary.group(2, "a").count(), 1);
        assert!(!summary.group(1, "b").next().unwrap().passed());
    }

    #[test]
    fn test_outcomes_of_uses_recorded_range() {
        let mut summary = RunSummary::new(PathBuf::from("x.feature"));
        summary.outcomes = vec![
            outcome(1, "same", StepStatus::Pass),
            outcome(1, "same", StepStatus::Pass),
            outcome(1, "same", StepStatus::Fail),
        ];
        let result = |first_outcome, steps_run| ScenarioResult {
            name: "same".to_string(),
            iteration: 1,
            passed: true,
            first_outcome,
            steps_run,
            steps_total: 2,
            error: None,
            evidence: None,
        };

        assert_eq!(summary.outcomes_of(&result(0, 2)).len(), 2);
        let second = summary.outcomes_of(&result(2, 1));
        assert_eq!(second.len(), 1);
        assert!(!second[0].passed());
        assert!(summary.outcomes_of(&result(5, 1)).is_empty());
    }
}
