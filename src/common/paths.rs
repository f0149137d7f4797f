//! Conventional file locations
//!
//! Config files are looked up in the working directory. Files referenced
//! from scripts (`read('...')`) are searched as given first, then under the
//! conventional data and feature directories.

use std::path::{Path, PathBuf};

/// Config file names, in lookup order
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "stepwright.config.yaml",
    "stepwright.config.yml",
    ".stepwright.yaml",
    ".stepwright.yml",
];

/// Directories searched for files referenced by `read(...)`, after the path
/// itself
const SEARCH_DIRS: &[&str] = &["data", "features", "tests/features", "tests/data"];

/// Candidate locations for a referenced file, in search order
pub fn search_candidates(raw: &str) -> Vec<PathBuf> {
    let given = PathBuf::from(raw);
    let mut candidates = vec![given.clone()];
    if given.is_relative() {
        candidates.extend(SEARCH_DIRS.iter().map(|dir| Path::new(dir).join(&given)));
    }
    candidates
}

/// Resolve a referenced file to the first candidate that exists
pub fn resolve_reference(raw: &str) -> Option<PathBuf> {
    search_candidates(raw).into_iter().find(|p| p.is_file())
}

/// Turn a scenario name into something safe to use in a file name
pub fn sanitize_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "scenario".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_order() {
        let candidates = search_candidates("login.feature");
        assert_eq!(candidates[0], PathBuf::from("login.feature"));
        assert_eq!(candidates[1], PathBuf::from("data/login.feature"));
        assert_eq!(candidates[2], PathBuf::from("features/login.feature"));
        assert_eq!(candidates[3], PathBuf::from("tests/features/login.feature"));
    }

    #[test]
    fn test_absolute_path_is_not_expanded() {
        let candidates = search_candidates("/tmp/x.json");
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Test: Login Flow"), "Test_Login_Flow");
        assert_eq!(sanitize_file_stem("User@Email.com"), "User_Email_com");
        assert_eq!(sanitize_file_stem("///"), "scenario");
    }
}
