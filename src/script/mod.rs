//! Script text model
//!
//! A script is parsed once into tagged scenarios; each scenario is an
//! ordered list of step lines. Placeholders in step lines are substituted
//! right before a step runs.

mod parser;
mod vars;

pub use parser::{normalize_tag, parse_script, DATA_SOURCE_SCAN_LINES};
pub use vars::{display_value, inject, Bindings};

use indexmap::IndexSet;

/// A parsed script file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    /// `Feature:` title, if present
    pub title: Option<String>,
    /// Dataset path named by a `Data source:` directive near the top
    pub data_source: Option<String>,
    /// Scenarios in file order; none of them is empty
    pub scenarios: Vec<Scenario>,
}

/// One named, tagged sequence of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    /// Normalized tags (no `@`/`#`, trimmed)
    pub tags: IndexSet<String>,
    pub steps: Vec<ScriptStep>,
}

impl Scenario {
    /// Whether this scenario passes a normalized tag filter
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// One step line plus the descriptive comment that preceded it
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub text: String,
    pub description: Option<String>,
}

impl Script {
    /// Whether any scenario carries the (normalized) tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.scenarios.iter().any(|s| s.has_tag(tag))
    }

    /// Scenarios passing an optional normalized tag filter
    pub fn filtered<'a>(&'a self, tag: Option<&'a str>) -> impl Iterator<Item = &'a Scenario> {
        self.scenarios
            .iter()
            .filter(move |s| tag.map_or(true, |t| s.has_tag(t)))
    }
}
