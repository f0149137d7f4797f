//! Fuzzy matcher used by `match` and `status` steps
//!
//! Expected values starting with `#` may name a type check instead of a
//! literal:
//!
//! | Marker     | Passes when actual is          |
//! |------------|--------------------------------|
//! | `#notnull` | anything but null              |
//! | `#null`    | null                           |
//! | `#string`  | a string                       |
//! | `#number`  | a number                       |
//! | `#boolean` | a boolean                      |
//! | `#array`   | an array                       |
//! | `#object`  | an object                      |
//! | `#uuid`    | a lowercase hyphenated UUID    |
//! | `#ignore`  | always                         |
//!
//! Unknown markers are compared literally.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::common::{Error, Result};
use crate::script::display_value;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Type checks selectable with a `#marker`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    NotNull,
    Null,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Uuid,
    Ignore,
}

impl Marker {
    /// Recognize a marker keyword; `None` means compare literally
    pub fn parse(expected: &str) -> Option<Self> {
        let keyword = expected.trim().strip_prefix('#')?;
        Some(match keyword.to_ascii_lowercase().as_str() {
            "notnull" => Marker::NotNull,
            "null" => Marker::Null,
            "string" => Marker::String,
            "number" => Marker::Number,
            "boolean" => Marker::Boolean,
            "array" => Marker::Array,
            "object" => Marker::Object,
            "uuid" => Marker::Uuid,
            "ignore" => Marker::Ignore,
            _ => return None,
        })
    }

    fn accepts(self, actual: &Value) -> bool {
        match self {
            Marker::NotNull => !actual.is_null(),
            Marker::Null => actual.is_null(),
            Marker::String => actual.is_string(),
            Marker::Number => actual.is_number(),
            Marker::Boolean => actual.is_boolean(),
            Marker::Array => actual.is_array(),
            Marker::Object => actual.is_object(),
            Marker::Uuid => actual.as_str().is_some_and(|s| UUID_RE.is_match(s)),
            Marker::Ignore => true,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Marker::NotNull => "#notnull",
            Marker::Null => "#null",
            Marker::String => "#string",
            Marker::Number => "#number",
            Marker::Boolean => "#boolean",
            Marker::Array => "#array",
            Marker::Object => "#object",
            Marker::Uuid => "#uuid",
            Marker::Ignore => "#ignore",
        }
    }
}

/// JSON type name used in mismatch messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `actual` against `expected`
///
/// Marker detection comes first and short-circuits. Otherwise values must
/// be equal, numerically equal, or equal in display form (`200` vs `"200"`).
pub fn match_value(actual: &Value, expected: &Value) -> Result<()> {
    if let Some(marker) = expected.as_str().and_then(Marker::parse) {
        if marker.accepts(actual) {
            return Ok(());
        }
        return Err(Error::Assertion(format!(
            "expected {}, got '{}' ({})",
            marker.keyword(),
            display_value(actual),
            type_name(actual)
        )));
    }

    if actual == expected {
        return Ok(());
    }
    if let (Some(a), Some(e)) = (actual.as_f64(), expected.as_f64()) {
        if a == e {
            return Ok(());
        }
    }
    if display_value(actual) == display_value(expected) {
        return Ok(());
    }

    Err(Error::Assertion(format!(
        "value mismatch. Expected: '{}' ({}) | Actual: '{}' ({})",
        display_value(expected),
        type_name(expected),
        display_value(actual),
        type_name(actual)
    )))
}
