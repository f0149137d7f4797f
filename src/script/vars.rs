//! Placeholder substitution
//!
//! `#(name)` is replaced by the display form of the binding. The line is
//! scanned once; text produced by a substitution is never scanned again.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

/// Variable bindings in insertion order
pub type Bindings = IndexMap<String, Value>;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\(([^()]+)\)").unwrap());

/// Display form of a value, as it appears in substituted text
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Substitute every bound, non-null placeholder in `line`
///
/// Unknown and null-valued placeholders are left as written.
pub fn inject(line: &str, bindings: &Bindings) -> String {
    PLACEHOLDER_RE
        .replace_all(line, |caps: &Captures| match bindings.get(&caps[1]) {
            Some(value) if !value.is_null() => display_value(value),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, Value)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_basic_substitution() {
        let b = bindings(&[("user", json!("ana")), ("id", json!(7))]);
        assert_eq!(inject("path 'users/#(id)/#(user)'", &b), "path 'users/7/ana'");
    }

    #[test]
    fn test_not_recursive() {
        let b = bindings(&[("A", json!("#(B)")), ("B", json!("x"))]);
        assert_eq!(inject("value #(A)", &b), "value #(B)");

        // order of bindings does not matter either
        let b = bindings(&[("B", json!("x")), ("A", json!("#(B)"))]);
        assert_eq!(inject("value #(A)", &b), "value #(B)");
    }

    #[test]
    fn test_null_and_unknown_left_alone() {
        let b = bindings(&[("gone", Value::Null)]);
        assert_eq!(inject("#(gone) #(missing)", &b), "#(gone) #(missing)");
    }

    #[test]
    fn test_repeated_placeholder() {
        let b = bindings(&[("x", json!(true))]);
        assert_eq!(inject("#(x)-#(x)", &b), "true-true");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("s")), "s");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
