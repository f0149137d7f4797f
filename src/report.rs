//! Run reports
//!
//! One JSON and one HTML file per script invocation. Steps are grouped by
//! (iteration, scenario); a group fails when any of its steps failed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use serde::Serialize;

use crate::common::{escape_html, Error, Result};
use crate::runner::RunSummary;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    success_rate: f64,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

/// Percentage of scenario groups that passed, two decimals
pub fn success_rate(summary: &RunSummary) -> f64 {
    if summary.scenarios.is_empty() {
        return 0.0;
    }
    let rate = summary.passed_scenarios() as f64 * 100.0 / summary.scenarios.len() as f64;
    (rate * 100.0).round() / 100.0
}

/// Write `report_<timestamp>.json` and `.html`; returns the HTML path
pub fn write_report(folder: &Path, summary: &RunSummary) -> Result<PathBuf> {
    std::fs::create_dir_all(folder).map_err(|e| {
        Error::Internal(format!("Failed to create reports folder {}: {}", folder.display(), e))
    })?;

    let now = chrono::Local::now();
    let stamp = now.format("%Y-%m-%d_%H-%M-%S_%3f").to_string();
    let rate = success_rate(summary);

    let json = JsonReport {
        generated_at: now.to_rfc3339(),
        success_rate: rate,
        summary,
    };
    let json_path = folder.join(format!("report_{}.json", stamp));
    std::fs::write(&json_path, serde_json::to_string_pretty(&json)?)?;

    let html_path = folder.join(format!("report_{}.html", stamp));
    std::fs::write(&html_path, render_html(summary, rate, &now.format("%d/%m/%Y %H:%M:%S").to_string()))?;

    tracing::info!("Report written to {}", html_path.display());
    Ok(html_path)
}

fn render_html(summary: &RunSummary, rate: f64, date: &str) -> String {
    let total_steps = summary.outcomes.len();
    let passed_steps = summary.outcomes.iter().filter(|o| o.passed()).count();
    let color = if rate >= 100.0 {
        "#27ae60"
    } else if rate >= 50.0 {
        "#e67e22"
    } else {
        "#e74c3c"
    };

    let mut groups = String::new();
    for scenario in &summary.scenarios {
        let (class, label) = if scenario.passed {
            ("pass", "PASSED")
        } else {
            ("fail", "FAILED")
        };
        let _ = writeln!(
            groups,
            "<details class=\"group {class}\" {open}>\n<summary>Iteration {} &middot; {} <span class=\"badge {class}\">{label}</span> <small>{}/{} steps run</small></summary>\n<table>\n<tr><th>#</th><th>Step</th><th>Status</th><th>Details</th></tr>",
            scenario.iteration,
            escape_html(&scenario.name),
            scenario.steps_run,
            scenario.steps_total,
            open = if scenario.passed { "" } else { "open" },
        );

        for (index, step) in summary.outcomes_of(scenario).iter().enumerate() {
            let mut details = String::new();
            if let Some(error) = &step.error {
                let _ = write!(details, "<div class=\"error\">{}</div>", escape_html(error));
            }
            if let Some(data) = &step.response_data {
                let _ = write!(
                    details,
                    "<details><summary>Data</summary><pre>{}</pre></details>",
                    escape_html(data)
                );
            }
            if let Some(png) = &step.screenshot {
                let _ = write!(
                    details,
                    "<details><summary>Screenshot</summary><img src=\"data:image/png;base64,{}\" /></details>",
                    base64::engine::general_purpose::STANDARD.encode(png)
                );
            }
            let status_class = if step.passed() { "pass" } else { "fail" };
            let _ = writeln!(
                groups,
                "<tr class=\"{status_class}\"><td>{}</td><td>{}</td><td><span class=\"badge {status_class}\">{}</span></td><td>{}</td></tr>",
                index + 1,
                escape_html(&step.name),
                step.status,
                details
            );
        }
        groups.push_str("</table>\n</details>\n");
    }

    let system_error = summary
        .system_error
        .as_ref()
        .map(|e| format!("<p class=\"error\">System error: {}</p>", escape_html(e)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>Execution report: {script}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; background: #fafafa; }}
.metrics span {{ display: inline-block; margin-right: 2em; }}
.rate {{ font-size: 2em; color: {color}; }}
.group {{ background: #fff; border-left: 4px solid #27ae60; margin: 1em 0; padding: 0.5em 1em; }}
.group.fail {{ border-color: #e74c3c; }}
.badge {{ padding: 0.1em 0.5em; border-radius: 3px; color: #fff; }}
.badge.pass {{ background: #27ae60; }}
.badge.fail {{ background: #e74c3c; }}
.error {{ color: #e74c3c; }}
table {{ width: 100%; border-collapse: collapse; }}
td, th {{ border-bottom: 1px solid #eee; padding: 0.3em; text-align: left; vertical-align: top; }}
img {{ max-width: 100%; }}
</style>
</head>
<body>
<h1>Execution report</h1>
<p>{script} &middot; {date} &middot; <b>{status}</b></p>
{system_error}
<div class="metrics">
<span class="rate">{rate:.2}%</span>
<span>Test cases: {total} ({passed} passed, {failed} failed)</span>
<span>Steps: {total_steps} ({passed_steps} passed, {failed_steps} failed)</span>
</div>
{groups}</body>
</html>
"#,
        script = escape_html(&summary.script.display().to_string()),
        date = date,
        status = if summary.success { "PASSED" } else { "FAILED" },
        system_error = system_error,
        color = color,
        rate = rate,
        total = summary.scenarios.len(),
        passed = summary.passed_scenarios(),
        failed = summary.failed_scenarios(),
        total_steps = total_steps,
        passed_steps = passed_steps,
        failed_steps = total_steps - passed_steps,
        groups = groups,
    )
}
