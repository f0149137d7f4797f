//! Step vocabulary
//!
//! Every script line is classified into exactly one [`Step`] variant by
//! its command keyword, after dropping an optional `*` bullet and Gherkin
//! keyword (`Given`, `When`, `Then`, `And`, `But`). Overlapping commands
//! are disambiguated explicitly: `check radio` is tried before plain
//! `check`, and `scroll to` / `switch to` branch on their sub-command.

mod args;
pub mod expr;

pub use args::{split_args, split_pair};

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::browser::{DialogAction, FrameTarget, ScrollTarget, SelectBy};
use crate::common::{unquote, Error, Result};
use crate::selector::Locator;

static READ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^read\(\s*['"]?(.*?)['"]?\s*\)$"#).unwrap());

const GHERKIN_KEYWORDS: &[&str] = &["given", "when", "then", "and", "but"];

/// HTTP methods accepted by `method`
pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// How a `def` expression is evaluated
#[derive(Debug, Clone, PartialEq)]
pub enum DefSource {
    /// Last parsed response body (or raw text when not JSON)
    Response,
    /// Last response status code
    ResponseStatus,
    /// Dotted/indexed path into the last parsed response body
    ResponsePath(String),
    /// Contents of a referenced file
    Read(String),
    /// Anything else is stored as written
    Literal(String),
}

/// One classified script line
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    // === Control ===
    Call { path: String },
    Def { name: String, source: DefSource },
    Print { expression: String },
    Wait { duration: Duration },

    // === Request building ===
    ConfigureSsl { verify: bool },
    AuthBasic { username: String, password: String },
    AuthBearer { token: String },
    Url { url: String },
    Path { segment: String },
    Header { name: String, value: String },
    Request { body: String },
    Method { verb: String },

    // === Assertions ===
    Status { code: u16 },
    MatchPath { path: String, expected: String },
    MatchBody { expected: String },
    MatchText { locator: Locator, expected: String },

    // === UI ===
    Driver { url: String },
    Input { locator: Locator, value: String },
    Click { locator: Locator },
    Select { locator: Locator, by: SelectBy },
    CheckRadio { locator: Locator },
    Check { locator: Locator },
    Uncheck { locator: Locator },
    Toggle { locator: Locator },
    Scroll { target: ScrollTarget },
    Frame { target: FrameTarget },
    Dialog { action: DialogAction },
}

impl Step {
    /// Classify a (substituted) script line
    pub fn parse(line: &str) -> Result<Self> {
        let body = strip_keyword(line);
        let (command, rest) = match body.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (body, ""),
        };

        let malformed = |what: &str| Error::step(line, format!("malformed '{}' step: {}", command, what));

        match command.to_ascii_lowercase().as_str() {
            "call" => {
                let path = parse_read(rest).ok_or_else(|| malformed("expected read('<path>')"))?;
                Ok(Step::Call { path })
            }

            "def" => {
                let (name, expr) = split_pair(rest, "=").ok_or_else(|| malformed("expected NAME = EXPR"))?;
                if name.contains(char::is_whitespace) {
                    return Err(malformed("variable names cannot contain spaces"));
                }
                Ok(Step::Def {
                    name: name.to_string(),
                    source: parse_def_source(expr),
                })
            }

            "print" if !rest.is_empty() => Ok(Step::Print {
                expression: rest.to_string(),
            }),

            "wait" => {
                let duration = rest
                    .parse::<f64>()
                    .ok()
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .ok_or_else(|| malformed("expected a number of seconds"))?;
                Ok(Step::Wait { duration })
            }

            "configure" => {
                let args = split_args(rest);
                match args.as_slice() {
                    [what, flag] if what.eq_ignore_ascii_case("ssl") => {
                        let verify = parse_bool(flag).ok_or_else(|| malformed("expected true or false"))?;
                        Ok(Step::ConfigureSsl { verify })
                    }
                    _ => Err(Error::unrecognized(line)),
                }
            }

            "auth" => {
                let args = split_args(rest);
                match args.as_slice() {
                    [scheme, user, pass] if scheme.eq_ignore_ascii_case("basic") => Ok(Step::AuthBasic {
                        username: user.clone(),
                        password: pass.clone(),
                    }),
                    [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Ok(Step::AuthBearer {
                        token: token.clone(),
                    }),
                    _ => Err(malformed("expected 'basic USER PASS' or 'bearer TOKEN'")),
                }
            }

            "url" if !rest.is_empty() => Ok(Step::Url {
                url: unquote(rest).to_string(),
            }),

            "path" if !rest.is_empty() => Ok(Step::Path {
                segment: unquote(rest).to_string(),
            }),

            "header" => {
                let (name, value) = split_pair(rest, "=").ok_or_else(|| malformed("expected NAME = VALUE"))?;
                Ok(Step::Header {
                    name: unquote(name).to_string(),
                    value: unquote(value).to_string(),
                })
            }

            "request" if !rest.is_empty() => Ok(Step::Request {
                body: rest.to_string(),
            }),

            "method" => {
                let verb = unquote(rest).to_ascii_uppercase();
                if !HTTP_METHODS.contains(&verb.as_str()) {
                    return Err(malformed(&format!("unsupported HTTP method '{}'", rest)));
                }
                Ok(Step::Method { verb })
            }

            "status" => {
                let code = rest
                    .parse::<u16>()
                    .ok()
                    .filter(|c| (100..=599).contains(c))
                    .ok_or_else(|| malformed("expected an HTTP status code"))?;
                Ok(Step::Status { code })
            }

            "match" => parse_match(line, rest),

            "driver" if !rest.is_empty() => Ok(Step::Driver {
                url: unquote(rest).to_string(),
            }),

            "input" => {
                let args = split_args(rest);
                match args.as_slice() {
                    [selector, value] => Ok(Step::Input {
                        locator: locate(line, selector)?,
                        value: value.clone(),
                    }),
                    _ => Err(malformed("expected SELECTOR VALUE")),
                }
            }

            "click" if !rest.is_empty() => Ok(Step::Click {
                locator: locate(line, unquote(rest))?,
            }),

            "select" => {
                let args = split_args(rest);
                match args.as_slice() {
                    [selector, by, mode, value] if by.eq_ignore_ascii_case("by") => {
                        let by = match mode.to_ascii_lowercase().as_str() {
                            "text" | "label" => SelectBy::Text(value.clone()),
                            "value" => SelectBy::Value(value.clone()),
                            "index" => SelectBy::Index(
                                value.parse().map_err(|_| malformed("index must be a number"))?,
                            ),
                            _ => return Err(malformed("expected 'by text', 'by value' or 'by index'")),
                        };
                        Ok(Step::Select {
                            locator: locate(line, selector)?,
                            by,
                        })
                    }
                    _ => Err(malformed("expected SELECTOR by text|value|index X")),
                }
            }

            // `check radio` must win over plain `check`
            "check" => match rest.split_once(char::is_whitespace) {
                Some((sub, target)) if sub.eq_ignore_ascii_case("radio") => Ok(Step::CheckRadio {
                    locator: locate(line, unquote(target))?,
                }),
                _ if !rest.is_empty() => Ok(Step::Check {
                    locator: locate(line, unquote(rest))?,
                }),
                _ => Err(malformed("expected a selector")),
            },

            "uncheck" if !rest.is_empty() => Ok(Step::Uncheck {
                locator: locate(line, unquote(rest))?,
            }),

            "toggle" if !rest.is_empty() => Ok(Step::Toggle {
                locator: locate(line, unquote(rest))?,
            }),

            "scroll" => {
                let target = strip_word(rest, "to").ok_or_else(|| Error::unrecognized(line))?;
                Ok(Step::Scroll {
                    target: parse_scroll(line, target)?,
                })
            }

            "switch" => {
                let target = strip_word(rest, "to").ok_or_else(|| Error::unrecognized(line))?;
                Ok(Step::Frame {
                    target: parse_frame(line, target)?,
                })
            }

            "accept" if rest.eq_ignore_ascii_case("alert") => Ok(Step::Dialog {
                action: DialogAction::Accept,
            }),

            "dismiss" if rest.eq_ignore_ascii_case("alert") => Ok(Step::Dialog {
                action: DialogAction::Dismiss,
            }),

            "type" => {
                let text = strip_word(rest, "in")
                    .and_then(|r| strip_word(r, "prompt"))
                    .ok_or_else(|| Error::unrecognized(line))?;
                Ok(Step::Dialog {
                    action: DialogAction::Type(unquote(text).to_string()),
                })
            }

            _ => Err(Error::unrecognized(line)),
        }
    }
}

/// Drop a leading `*` and Gherkin keyword
fn strip_keyword(line: &str) -> &str {
    let mut body = line.trim();
    if let Some(rest) = body.strip_prefix('*') {
        body = rest.trim_start();
    }
    if let Some((first, rest)) = body.split_once(char::is_whitespace) {
        if GHERKIN_KEYWORDS.iter().any(|k| first.eq_ignore_ascii_case(k)) {
            body = rest.trim_start();
        }
    }
    body
}

/// Strip a leading case-insensitive word followed by whitespace or end
fn strip_word<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let (first, rest) = match s.split_once(char::is_whitespace) {
        Some((f, r)) => (f, r.trim_start()),
        None => (s, ""),
    };
    first.eq_ignore_ascii_case(word).then_some(rest)
}

/// Extract the path from `read('path')`
pub fn parse_read(expr: &str) -> Option<String> {
    READ_RE
        .captures(expr.trim())
        .map(|caps| caps[1].trim().to_string())
        .filter(|p| !p.is_empty())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_def_source(expr: &str) -> DefSource {
    if expr == "response" {
        DefSource::Response
    } else if expr == "responseStatus" {
        DefSource::ResponseStatus
    } else if let Some(path) = expr.strip_prefix("response.") {
        DefSource::ResponsePath(path.to_string())
    } else if let Some(path) = parse_read(expr) {
        DefSource::Read(path)
    } else {
        DefSource::Literal(expr.to_string())
    }
}

fn locate(line: &str, selector: &str) -> Result<Locator> {
    Locator::parse(selector).map_err(|e| Error::step(line, e.to_string()))
}

fn parse_match(line: &str, rest: &str) -> Result<Step> {
    if let Some(text_args) = strip_word(rest, "text") {
        let (selector, expected) =
            split_pair(text_args, "==").ok_or_else(|| Error::step(line, "expected SELECTOR == TEXT"))?;
        return Ok(Step::MatchText {
            locator: locate(line, unquote(selector))?,
            expected: unquote(expected).to_string(),
        });
    }

    let (left, expected) =
        split_pair(rest, "==").ok_or_else(|| Error::step(line, "expected response... == VALUE"))?;

    if left == "response" {
        return Ok(Step::MatchBody {
            expected: expected.to_string(),
        });
    }
    if let Some(path) = left.strip_prefix("response.") {
        if !path.is_empty() {
            return Ok(Step::MatchPath {
                path: path.to_string(),
                expected: expected.to_string(),
            });
        }
    }
    Err(Error::unrecognized(line))
}

fn parse_scroll(line: &str, target: &str) -> Result<ScrollTarget> {
    if let Some(selector) = strip_word(target, "element") {
        if selector.is_empty() {
            return Err(Error::step(line, "expected a selector after 'scroll to element'"));
        }
        return Ok(ScrollTarget::Element(locate(line, unquote(selector))?));
    }
    if target.eq_ignore_ascii_case("top") {
        return Ok(ScrollTarget::Top);
    }
    if target.eq_ignore_ascii_case("bottom") {
        return Ok(ScrollTarget::Bottom);
    }

    let coords: Vec<&str> = target
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if let [x, y] = coords.as_slice() {
        if let (Ok(x), Ok(y)) = (x.parse::<i64>(), y.parse::<i64>()) {
            return Ok(ScrollTarget::Position { x, y });
        }
    }
    Err(Error::unrecognized(line))
}

fn parse_frame(line: &str, target: &str) -> Result<FrameTarget> {
    let lower = target.to_ascii_lowercase();
    match lower.as_str() {
        "default content" | "main" | "main content" => return Ok(FrameTarget::Main),
        "parent" | "parent frame" => return Ok(FrameTarget::Parent),
        _ => {}
    }

    let frame = strip_word(target, "frame").ok_or_else(|| Error::unrecognized(line))?;
    let frame = unquote(frame);
    if frame.is_empty() {
        return Err(Error::step(line, "expected a frame selector or index"));
    }
    if let Ok(index) = frame.parse::<u16>() {
        return Ok(FrameTarget::Index(index));
    }
    Ok(FrameTarget::Element(locate(line, frame)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::LocatorKind;

    fn parse(line: &str) -> Step {
        Step::parse(line).unwrap()
    }

    #[test]
    fn test_keyword_prefixes_are_optional() {
        for line in ["Given url 'http://a'", "* url 'http://a'", "url http://a", "And url \"http://a\""] {
            assert_eq!(parse(line), Step::Url { url: "http://a".to_string() }, "{line}");
        }
    }

    #[test]
    fn test_request_building() {
        assert_eq!(parse("And path '/users/1'"), Step::Path { segment: "/users/1".to_string() });
        assert_eq!(
            parse("And header Authorization = Bearer abc"),
            Step::Header {
                name: "Authorization".to_string(),
                value: "Bearer abc".to_string()
            }
        );
        assert_eq!(parse("When method post"), Step::Method { verb: "POST".to_string() });
        assert!(Step::parse("When method fetch").is_err());
        assert_eq!(
            parse(r#"And request {"a": 1}"#),
            Step::Request { body: r#"{"a": 1}"#.to_string() }
        );
    }

    #[test]
    fn test_def_sources() {
        let def = |line| match parse(line) {
            Step::Def { source, .. } => source,
            other => panic!("expected Def, got {:?}", other),
        };
        assert_eq!(def("* def r = response"), DefSource::Response);
        assert_eq!(def("* def s = responseStatus"), DefSource::ResponseStatus);
        assert_eq!(
            def("* def token = response.access_token"),
            DefSource::ResponsePath("access_token".to_string())
        );
        assert_eq!(def("* def body = read('user.json')"), DefSource::Read("user.json".to_string()));
        assert_eq!(def("* def greeting = hello world"), DefSource::Literal("hello world".to_string()));
        assert_eq!(def("* def eq = a=b"), DefSource::Literal("a=b".to_string()));
    }

    #[test]
    fn test_status_and_match() {
        assert_eq!(parse("Then status 201"), Step::Status { code: 201 });
        assert!(Step::parse("Then status abc").is_err());
        assert_eq!(
            parse("And match response.data.0.id == '#notnull'"),
            Step::MatchPath {
                path: "data.0.id".to_string(),
                expected: "'#notnull'".to_string()
            }
        );
        assert_eq!(
            parse(r#"Then match response == {"ok": true}"#),
            Step::MatchBody { expected: r#"{"ok": true}"#.to_string() }
        );
        match parse("Then match text '#msg' == 'Welcome'") {
            Step::MatchText { locator, expected } => {
                assert_eq!(locator.query, "#msg");
                assert_eq!(expected, "Welcome");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_check_radio_before_check() {
        assert!(matches!(parse("And check radio '#r1'"), Step::CheckRadio { .. }));
        assert!(matches!(parse("And check '#agree'"), Step::Check { .. }));
        assert!(matches!(parse("And uncheck '#agree'"), Step::Uncheck { .. }));
        assert!(matches!(parse("And toggle '#agree'"), Step::Toggle { .. }));
    }

    #[test]
    fn test_input_and_select() {
        match parse(r#"And input '//input[@name="q"]' 'rust lang'"#) {
            Step::Input { locator, value } => {
                assert_eq!(locator.kind, LocatorKind::XPath);
                assert_eq!(value, "rust lang");
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse("And select '#dropdown' by index 2") {
            Step::Select { by, .. } => assert_eq!(by, SelectBy::Index(2)),
            other => panic!("unexpected {:?}", other),
        }
        match parse("And select '#dropdown' by text 'Option 1'") {
            Step::Select { by, .. } => assert_eq!(by, SelectBy::Text("Option 1".to_string())),
            other => panic!("unexpected {:?}", other),
        }
        assert!(Step::parse("And select '#dropdown' by colour red").is_err());
    }

    #[test]
    fn test_scroll_variants() {
        assert_eq!(parse("And scroll to top"), Step::Scroll { target: ScrollTarget::Top });
        assert_eq!(parse("And scroll to bottom"), Step::Scroll { target: ScrollTarget::Bottom });
        assert_eq!(
            parse("And scroll to 0, 500"),
            Step::Scroll {
                target: ScrollTarget::Position { x: 0, y: 500 }
            }
        );
        assert!(matches!(
            parse("And scroll to element '#content'"),
            Step::Scroll {
                target: ScrollTarget::Element(_)
            }
        ));
        assert!(Step::parse("And scroll to somewhere").is_err());
    }

    #[test]
    fn test_frames_and_dialogs() {
        assert_eq!(parse("And switch to default content"), Step::Frame { target: FrameTarget::Main });
        assert_eq!(parse("And switch to main"), Step::Frame { target: FrameTarget::Main });
        assert_eq!(parse("And switch to parent"), Step::Frame { target: FrameTarget::Parent });
        assert_eq!(parse("And switch to frame 1"), Step::Frame { target: FrameTarget::Index(1) });
        assert!(matches!(
            parse("And switch to frame '#mce_0_ifr'"),
            Step::Frame {
                target: FrameTarget::Element(_)
            }
        ));
        assert_eq!(parse("And accept alert"), Step::Dialog { action: DialogAction::Accept });
        assert_eq!(parse("And dismiss alert"), Step::Dialog { action: DialogAction::Dismiss });
        assert_eq!(
            parse("And type in prompt 'Hello'"),
            Step::Dialog {
                action: DialogAction::Type("Hello".to_string())
            }
        );
    }

    #[test]
    fn test_call_read() {
        assert_eq!(parse("* call read('auth.feature')"), Step::Call { path: "auth.feature".to_string() });
        assert!(Step::parse("* call something").is_err());
    }

    #[test]
    fn test_wait_duration_bounds() {
        assert_eq!(parse("* wait 1.5"), Step::Wait { duration: Duration::from_millis(1500) });
        assert_eq!(parse("* wait 0"), Step::Wait { duration: Duration::ZERO });
        for line in ["* wait 1e300", "* wait -1", "* wait NaN", "* wait inf", "* wait soon"] {
            let err = Step::parse(line).unwrap_err();
            assert!(err.to_string().contains("expected a number of seconds"), "{line}");
        }
    }

    #[test]
    fn test_unrecognized() {
        let err = Step::parse("Then the moon is made of cheese").unwrap_err();
        assert!(err.to_string().contains("unrecognized command"));
        assert!(err.to_string().contains("moon"));
        assert!(Step::parse("Data source: late.csv").is_err());
    }

    #[test]
    fn test_selector_classification_is_shared() {
        let kinds: Vec<LocatorKind> = [
            "click '//button[@id=\"go\"]'",
            "check '//button[@id=\"go\"]'",
            "input '//button[@id=\"go\"]' x",
        ]
        .iter()
        .map(|line| match parse(line) {
            Step::Click { locator } | Step::Check { locator } | Step::Input { locator, .. } => locator.kind,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
        assert!(kinds.iter().all(|k| *k == LocatorKind::XPath));
    }
}
