//! Line-oriented script parser
//!
//! Parsing never fails: anything that is not a tag, a header, a comment
//! or the data-source directive becomes a step, and lines the interpreter
//! cannot classify fail later when they are executed.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Scenario, Script, ScriptStep};

/// The data-source directive is only honoured this close to the top
pub const DATA_SOURCE_SCAN_LINES: usize = 10;

static TAG_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#?\s*@").unwrap());
static DATA_SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^data source:\s*(.*)$").unwrap());
static SCENARIO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^scenario:\s*(.*)$").unwrap());
static FEATURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^feature:\s*(.*)$").unwrap());

const DEFAULT_SCENARIO: &str = "Default";

/// Normalize a tag for comparison: strip `@`/`#`, quotes and whitespace
pub fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| !matches!(c, '@' | '#' | '\'' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse raw script lines into scenarios
///
/// Lines before the first `Scenario:` header form an implicit `Default`
/// scenario only when the script has no header at all; otherwise they are
/// free-form feature text and are dropped.
pub fn parse_script<S: AsRef<str>>(lines: &[S]) -> Script {
    let mut script = Script::default();
    let mut current = Scenario {
        name: DEFAULT_SCENARIO.to_string(),
        tags: IndexSet::new(),
        steps: Vec::new(),
    };
    let mut seen_header = false;
    let mut pending_tags: IndexSet<String> = IndexSet::new();
    let mut pending_description: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        let raw = line.as_ref().trim();
        if raw.is_empty() {
            continue;
        }

        if let Some(caps) = DATA_SOURCE_RE.captures(raw) {
            if idx >= DATA_SOURCE_SCAN_LINES {
                tracing::warn!(
                    "Ignoring data source on line {}: only the first {} lines are scanned",
                    idx + 1,
                    DATA_SOURCE_SCAN_LINES
                );
            } else if script.data_source.is_none() {
                let path = crate::common::unquote(&caps[1]).to_string();
                if !path.is_empty() {
                    script.data_source = Some(path);
                }
            }
            continue;
        }

        if TAG_LINE_RE.is_match(raw) {
            for token in raw.split_whitespace() {
                let tag = normalize_tag(token);
                if !tag.is_empty() {
                    pending_tags.insert(tag);
                }
            }
            continue;
        }

        if let Some(caps) = FEATURE_RE.captures(raw) {
            script.title = Some(caps[1].trim().to_string());
            continue;
        }

        if let Some(caps) = SCENARIO_RE.captures(raw) {
            let next = Scenario {
                name: caps[1].trim().to_string(),
                tags: std::mem::take(&mut pending_tags),
                steps: Vec::new(),
            };
            let finished = std::mem::replace(&mut current, next);
            if !seen_header {
                if !finished.steps.is_empty() {
                    tracing::debug!(
                        "Dropping {} line(s) of feature text before the first scenario",
                        finished.steps.len()
                    );
                }
            } else if !finished.steps.is_empty() {
                script.scenarios.push(finished);
            }
            seen_header = true;
            pending_description = None;
            continue;
        }

        if let Some(comment) = raw.strip_prefix('#') {
            let text = comment.trim();
            if !text.is_empty() {
                pending_description = Some(text.to_string());
            }
            continue;
        }

        current.steps.push(ScriptStep {
            text: raw.to_string(),
            description: pending_description.take(),
        });
    }

    if !seen_header {
        current.tags.extend(pending_tags);
    }
    if !current.steps.is_empty() {
        script.scenarios.push(current);
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Script {
        let lines: Vec<&str> = text.lines().collect();
        parse_script(&lines)
    }

    #[test]
    fn test_implicit_default_scenario() {
        let script = parse("Given url 'http://x'\nWhen method get\n");
        assert_eq!(script.scenarios.len(), 1);
        assert_eq!(script.scenarios[0].name, "Default");
        assert_eq!(script.scenarios[0].steps.len(), 2);
    }

    #[test]
    fn test_tags_attach_to_next_scenario() {
        let script = parse(
            "@smoke\nScenario: first\n  * print 1\n# @regression @slow\nScenario: second\n  * print 2\n",
        );
        assert_eq!(script.scenarios.len(), 2);
        assert!(script.scenarios[0].has_tag("smoke"));
        assert!(!script.scenarios[0].has_tag("regression"));
        assert!(script.scenarios[1].has_tag("regression"));
        assert!(script.scenarios[1].has_tag("slow"));
    }

    #[test]
    fn test_empty_scenarios_dropped() {
        let script = parse("Scenario: empty\n\nScenario: full\n  * print 1\nScenario: trailing\n");
        assert_eq!(script.scenarios.len(), 1);
        assert_eq!(script.scenarios[0].name, "full");
    }

    #[test]
    fn test_data_source_directive() {
        let script = parse("Feature: users\nData source: 'data/users.csv'\nScenario: a\n  * print 1\n");
        assert_eq!(script.data_source.as_deref(), Some("data/users.csv"));
        assert_eq!(script.title.as_deref(), Some("users"));
        assert_eq!(script.scenarios[0].steps.len(), 1);
    }

    #[test]
    fn test_late_data_source_is_dropped() {
        let mut text = String::from("Scenario: a\n");
        for i in 0..12 {
            text.push_str(&format!("* print {}\n", i));
        }
        text.push_str("Data source: late.csv\n");
        let script = parse(&text);
        assert!(script.data_source.is_none());
        assert_eq!(script.scenarios[0].steps.len(), 12);
        assert_eq!(script.scenarios[0].steps.last().unwrap().text, "* print 11");
    }

    #[test]
    fn test_feature_text_before_first_scenario_is_dropped() {
        let script = parse(
            "Feature: Users\n  As an API client I want to fetch users\n\nScenario: Fetch\n  * url 'http://x'\n  * method get\n",
        );
        assert_eq!(script.scenarios.len(), 1);
        assert_eq!(script.scenarios[0].name, "Fetch");
        assert_eq!(script.scenarios[0].steps.len(), 2);
        assert_eq!(script.scenarios[0].steps[0].text, "* url 'http://x'");
    }

    #[test]
    fn test_descriptions() {
        let script = parse(
            "# First\n# Second\nGiven url 'http://a'\nAnd path 'users'\n#\n#   \nWhen method get\n",
        );
        let steps = &script.scenarios[0].steps;
        assert_eq!(steps[0].description.as_deref(), Some("Second"));
        assert_eq!(steps[1].description, None);
        assert_eq!(steps[2].description, None);
    }

    #[test]
    fn test_tag_comment_is_not_a_description() {
        let script = parse("# @smoke\nGiven url 'http://a'\n");
        assert_eq!(script.scenarios[0].steps[0].description, None);
        assert!(script.scenarios[0].tags.contains("smoke"));
    }

    #[test]
    fn test_steps_are_trimmed() {
        let script = parse("Scenario: s\n      And click '#go'   \n");
        assert_eq!(script.scenarios[0].steps[0].text, "And click '#go'");
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("@smoke"), "smoke");
        assert_eq!(normalize_tag("#@smoke "), "smoke");
        assert_eq!(normalize_tag("'@smoke'"), "smoke");
    }
}
