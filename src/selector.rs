//! Selector resolution shared by every UI step
//!
//! `xpath=` prefixed selectors and selectors starting with `/` are XPath
//! queries; everything else is CSS.

use std::fmt;

use crate::common::{Error, Result};

const XPATH_PREFIX: &str = "xpath=";

/// Kind of element query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Css,
    XPath,
}

/// A classified element query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub kind: LocatorKind,
    /// The query with any `xpath=` prefix removed
    pub query: String,
}

impl Locator {
    /// Classify a selector string
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(Error::Browser("selector cannot be empty".to_string()));
        }

        if let Some(rest) = selector.strip_prefix(XPATH_PREFIX) {
            let rest = rest.trim();
            if !rest.starts_with('/') {
                return Err(Error::Browser(format!(
                    "invalid XPath '{}': must start with / or //",
                    rest
                )));
            }
            return Ok(Self::xpath(rest));
        }

        if selector.starts_with('/') {
            return Ok(Self::xpath(selector));
        }

        Ok(Self {
            kind: LocatorKind::Css,
            query: selector.to_string(),
        })
    }

    fn xpath(query: &str) -> Self {
        Self {
            kind: LocatorKind::XPath,
            query: query.to_string(),
        }
    }

    /// WebDriver location strategy name
    pub fn strategy(&self) -> &'static str {
        match self.kind {
            LocatorKind::Css => "css selector",
            LocatorKind::XPath => "xpath",
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LocatorKind::Css => write!(f, "{}", self.query),
            LocatorKind::XPath => write!(f, "{}{}", XPATH_PREFIX, self.query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_default() {
        for s in ["#go", ".btn", "input[type=\"text\"]", "div > span"] {
            assert_eq!(Locator::parse(s).unwrap().kind, LocatorKind::Css, "{s}");
        }
    }

    #[test]
    fn test_xpath_auto_detect() {
        let loc = Locator::parse(r#"//button[@id="go"]"#).unwrap();
        assert_eq!(loc.kind, LocatorKind::XPath);
        assert_eq!(loc.query, r#"//button[@id="go"]"#);

        let loc = Locator::parse("/html/body/div").unwrap();
        assert_eq!(loc.kind, LocatorKind::XPath);
    }

    #[test]
    fn test_xpath_prefix_is_stripped() {
        let loc = Locator::parse(r#"xpath=//input[@id="user"]"#).unwrap();
        assert_eq!(loc.kind, LocatorKind::XPath);
        assert_eq!(loc.query, r#"//input[@id="user"]"#);
        assert_eq!(loc.to_string(), r#"xpath=//input[@id="user"]"#);
    }

    #[test]
    fn test_invalid() {
        assert!(Locator::parse("   ").is_err());
        assert!(Locator::parse("xpath=div").is_err());
    }

    #[test]
    fn test_strategy() {
        assert_eq!(Locator::parse("#a").unwrap().strategy(), "css selector");
        assert_eq!(Locator::parse("//a").unwrap().strategy(), "xpath");
    }
}
