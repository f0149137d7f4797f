//! Per-scenario evidence files
//!
//! API scenarios get a text file with the last response; scenarios that
//! opened a browser page get an HTML file with one section per step and the
//! captured screenshots inlined.

use std::fmt::Write as _;
use std::path::PathBuf;

use base64::Engine as _;
use serde_json::Value;

use crate::common::paths::sanitize_file_stem;
use crate::common::{escape_html, truncate_chars, Error, Result};
use crate::runner::StepOutcome;

/// Characters of step response data kept in UI evidence
const UI_RESPONSE_CHARS: usize = 1000;

/// Writes evidence files into one folder
#[derive(Debug, Clone)]
pub struct EvidenceWriter {
    folder: PathBuf,
}

impl EvidenceWriter {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn file_path(&self, prefix: &str, scenario: &str, iteration: usize, ext: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.folder).map_err(|e| {
            Error::Internal(format!(
                "Failed to create evidence folder {}: {}",
                self.folder.display(),
                e
            ))
        })?;
        Ok(self.folder.join(format!(
            "{}_{}_Iter{}.{}",
            prefix,
            sanitize_file_stem(scenario),
            iteration,
            ext
        )))
    }

    /// Text evidence for an API scenario
    pub fn write_api(
        &self,
        scenario: &str,
        iteration: usize,
        method: Option<&str>,
        response: &Value,
    ) -> Result<PathBuf> {
        let path = self.file_path("API", scenario, iteration, "txt")?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        let content = format!(
            "========================================\n\
             API EXECUTION EVIDENCE\n\
             ========================================\n\
             Timestamp:  {}\n\
             Scenario:   {}\n\
             Method:     {}\n\
             Iteration:  {}\n\
             ========================================\n\
             \n\
             RESPONSE:\n\
             ---------\n\
             {}\n",
            timestamp,
            scenario,
            method.unwrap_or("N/A"),
            iteration,
            serde_json::to_string_pretty(response)?
        );

        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// HTML evidence for a UI scenario
    pub fn write_ui(&self, scenario: &str, iteration: usize, steps: &[StepOutcome]) -> Result<PathBuf> {
        let path = self.file_path("UI", scenario, iteration, "html")?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        let mut body = String::new();
        for (index, step) in steps.iter().enumerate() {
            let (class, label) = if step.passed() {
                ("pass", "OK")
            } else {
                ("fail", "FAILED")
            };
            let _ = writeln!(
                body,
                "<section class=\"step {class}\">\n<h3>{}. {} <span class=\"status\">[{label}]</span></h3>",
                index + 1,
                escape_html(&step.name)
            );
            if step.command != step.name {
                let _ = writeln!(body, "<p class=\"command\"><code>{}</code></p>", escape_html(&step.command));
            }
            if let Some(error) = &step.error {
                let _ = writeln!(body, "<p class=\"error\">Error: {}</p>", escape_html(error));
            }
            if let Some(data) = &step.response_data {
                let _ = writeln!(
                    body,
                    "<pre>{}</pre>",
                    escape_html(truncate_chars(data, UI_RESPONSE_CHARS))
                );
            }
            if let Some(png) = &step.screenshot {
                let encoded = base64::engine::general_purpose::STANDARD.encode(png);
                let _ = writeln!(body, "<img alt=\"screenshot\" src=\"data:image/png;base64,{encoded}\" />");
            }
            body.push_str("</section>\n");
        }

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>Evidence: {title}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
.step {{ border-left: 4px solid #27ae60; padding: 0.5em 1em; margin-bottom: 1em; }}
.step.fail {{ border-color: #e74c3c; }}
.fail .status, .error {{ color: #e74c3c; }}
.pass .status {{ color: #27ae60; }}
img {{ max-width: 100%; border: 1px solid #ccc; }}
pre {{ background: #f6f6f6; padding: 0.5em; overflow-x: auto; }}
</style>
</head>
<body>
<h1>Evidence: {title}</h1>
<p><b>Executed:</b> {timestamp}<br /><b>Data iteration:</b> {iteration}</p>
{body}</body>
</html>
"#,
            title = escape_html(scenario),
            timestamp = timestamp,
            iteration = iteration,
            body = body
        );

        std::fs::write(&path, html)?;
        Ok(path)
    }
}
