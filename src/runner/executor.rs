//! Step semantics
//!
//! [`Executor::execute`] classifies one substituted line and applies it to
//! the scenario's [`ExecutionContext`]. A returned error fails the step; the
//! returned string, if any, is kept as the step's response data.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::context::ExecutionContext;
use crate::browser::{BrowserSlot, Page};
use crate::common::config::Config;
use crate::common::paths::{resolve_reference, search_candidates};
use crate::common::{truncate_chars, unquote, Error, Result};
use crate::http::{Credential, HttpClient, HttpRequest};
use crate::matcher::match_value;
use crate::script::{display_value, inject, parse_script};
use crate::steps::{expr, parse_read, DefSource, Step};

/// Placeholder reported by `status` when no request has been sent
const NO_RESPONSE: &str = "no response";

/// Runs steps against a context, with access to the run's collaborators
pub struct Executor<'a> {
    pub config: &'a Config,
    pub http: &'a dyn HttpClient,
    pub browser: &'a mut BrowserSlot,
    /// Directory of the running script, searched last for `read()` files
    pub script_dir: Option<&'a Path>,
}

impl<'a> Executor<'a> {
    /// Execute one (already substituted) step line
    pub async fn execute(&mut self, ctx: &mut ExecutionContext, line: &str) -> Result<Option<String>> {
        match Step::parse(line)? {
            Step::Call { path } => self.call(ctx, line, &path).await,
            step => self.dispatch(ctx, line, step).await,
        }
    }

    /// Run an included script's steps inline on the caller's context
    async fn call(&mut self, ctx: &mut ExecutionContext, line: &str, raw: &str) -> Result<Option<String>> {
        let path = self.find_file(raw)?;
        if path.extension().and_then(|e| e.to_str()) != Some("feature") {
            return Err(Error::step(line, format!("'{}' is not a .feature file", raw)));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
        let lines: Vec<&str> = content.lines().collect();
        let included = parse_script(&lines);

        tracing::info!("Calling {}", path.display());
        let mut count = 0;
        for scenario in &included.scenarios {
            for step in &scenario.steps {
                let nested = inject(&step.text, &ctx.vars);
                tracing::debug!("  [call] {}", nested);
                let parsed = Step::parse(&nested)?;
                if matches!(parsed, Step::Call { .. }) {
                    return Err(Error::step(&nested, "nested 'call' is not supported inside a called script"));
                }
                if let Err(e) = self.dispatch(ctx, &nested, parsed).await {
                    tracing::error!("Called step failed: {}", nested);
                    return Err(e);
                }
                count += 1;
            }
        }
        tracing::info!("Returned from {}", path.display());

        Ok(Some(format!("Called {} ({} steps)", path.display(), count)))
    }

    async fn dispatch(&mut self, ctx: &mut ExecutionContext, line: &str, step: Step) -> Result<Option<String>> {
        match step {
            Step::Call { .. } => Err(Error::step(line, "nested 'call' is not supported")),

            Step::Def { name, source } => {
                let value = self.def_value(ctx, &source)?;
                tracing::debug!("def {} = {}", name, display_value(&value));
                ctx.vars.insert(name, value);
                Ok(None)
            }

            Step::Print { expression } => {
                let content = print_value(ctx, &expression);
                tracing::info!("[print] {}", content);
                Ok(Some(content))
            }

            Step::Wait { duration } => {
                tokio::time::sleep(duration).await;
                Ok(None)
            }

            Step::ConfigureSsl { verify } => {
                ctx.verify_tls = verify;
                Ok(None)
            }

            Step::AuthBasic { username, password } => {
                ctx.credential = Some(Credential::Basic { username, password });
                Ok(None)
            }

            Step::AuthBearer { token } => {
                ctx.headers
                    .insert("Authorization".to_string(), format!("Bearer {}", token));
                Ok(None)
            }

            Step::Url { url } => {
                ctx.base_url = url;
                Ok(None)
            }

            Step::Path { segment } => {
                ctx.base_url = join_path(&ctx.base_url, &segment);
                Ok(None)
            }

            Step::Header { name, value } => {
                ctx.headers.insert(name, value);
                Ok(None)
            }

            Step::Request { body } => {
                ctx.request_body = Some(self.request_body(line, &body)?);
                Ok(None)
            }

            Step::Method { verb } => self.send(ctx, line, verb).await,

            Step::Status { code } => {
                let (actual, body) = match &ctx.response {
                    Some(resp) => (
                        resp.status.to_string(),
                        match &resp.json {
                            Some(json) => json.to_string(),
                            None => resp.text(),
                        },
                    ),
                    None => ("N/A".to_string(), NO_RESPONSE.to_string()),
                };
                let body = truncate_chars(&body, self.config.logging.max_response_size);
                let info = format!("Expected: {} | Received: {}\nBody: {}", code, actual, body);

                if actual != code.to_string() {
                    return Err(Error::Assertion(format!("Wrong status. {}", info)));
                }
                Ok(Some(info))
            }

            Step::MatchPath { path, expected } => {
                let actual = ctx
                    .response_json()
                    .and_then(|json| lookup_path(json, &path))
                    .cloned()
                    .unwrap_or(Value::Null);
                match_value(&actual, &expected_value(&expected))
                    .map_err(|e| Error::Assertion(format!("response.{}: {}", path, strip_prefix(&e))))?;
                Ok(None)
            }

            Step::MatchBody { expected } => {
                let actual = match &ctx.response {
                    Some(resp) => resp.json.clone().unwrap_or_else(|| Value::String(resp.text())),
                    None => Value::Null,
                };
                match_value(&actual, &expected_value(&expected))?;
                Ok(None)
            }

            Step::MatchText { locator, expected } => {
                let text = page(ctx)?.inner_text(&locator).await?;
                if !text.contains(&expected) {
                    return Err(Error::Assertion(format!(
                        "text of {} does not contain '{}' (actual: '{}')",
                        locator, expected, text
                    )));
                }
                Ok(Some(text))
            }

            Step::Driver { url } => {
                if let Some(mut previous) = ctx.page.take() {
                    if let Err(e) = previous.close().await {
                        tracing::warn!("Failed to close previous page: {}", e);
                    }
                }
                ctx.page = Some(self.browser.open_page().await?);
                ctx.page_opened = true;
                let timeout = self.config.browser.timeout();
                page(ctx)?.navigate(&url, timeout).await?;
                Ok(None)
            }

            Step::Input { locator, value } => {
                page(ctx)?.fill(&locator, &value).await?;
                Ok(None)
            }

            Step::Click { locator } => {
                page(ctx)?.click(&locator).await?;
                Ok(None)
            }

            Step::Select { locator, by } => {
                page(ctx)?.select(&locator, &by).await?;
                Ok(None)
            }

            Step::CheckRadio { locator } | Step::Check { locator } => {
                let page = page(ctx)?;
                if !page.is_checked(&locator).await? {
                    page.click(&locator).await?;
                }
                Ok(None)
            }

            Step::Uncheck { locator } => {
                let page = page(ctx)?;
                if page.is_checked(&locator).await? {
                    page.click(&locator).await?;
                }
                Ok(None)
            }

            Step::Toggle { locator } => {
                page(ctx)?.click(&locator).await?;
                Ok(None)
            }

            Step::Scroll { target } => {
                page(ctx)?.scroll(&target).await?;
                Ok(None)
            }

            Step::Frame { target } => {
                page(ctx)?.switch_frame(&target).await?;
                Ok(None)
            }

            Step::Dialog { action } => {
                page(ctx)?.handle_dialog(&action).await?;
                Ok(None)
            }
        }
    }

    /// Issue the request built so far
    async fn send(&mut self, ctx: &mut ExecutionContext, line: &str, verb: String) -> Result<Option<String>> {
        if ctx.base_url.is_empty() {
            return Err(Error::step(line, "no url set; use 'url <URL>' first"));
        }

        tracing::info!("{} {}", verb, ctx.base_url);
        let request = HttpRequest {
            method: verb.clone(),
            url: ctx.base_url.clone(),
            headers: ctx.headers.clone(),
            // bodies never carry over to the next request
            body: ctx.request_body.take(),
            credential: ctx.credential.clone(),
            verify_tls: ctx.verify_tls,
            timeout: self.config.api.timeout(),
        };
        ctx.last_method = Some(verb);

        let response = self.http.send(&request).await?;
        let data = match &response.json {
            Some(json) => serde_json::to_string_pretty(json)?,
            None => truncate_chars(&response.text(), self.config.logging.max_response_size).to_string(),
        };
        ctx.response = Some(response);
        Ok(Some(data))
    }

    fn def_value(&self, ctx: &ExecutionContext, source: &DefSource) -> Result<Value> {
        let value = match source {
            DefSource::Response => match &ctx.response {
                Some(resp) => resp.json.clone().unwrap_or_else(|| Value::String(resp.text())),
                None => Value::Null,
            },
            DefSource::ResponseStatus => ctx
                .response
                .as_ref()
                .map(|r| Value::from(r.status))
                .unwrap_or(Value::Null),
            DefSource::ResponsePath(path) => ctx
                .response_json()
                .and_then(|json| lookup_path(json, path))
                .cloned()
                .unwrap_or(Value::Null),
            DefSource::Read(raw) => self.read_value(raw)?,
            DefSource::Literal(text) => serde_json::from_str(text)
                .unwrap_or_else(|_| Value::String(unquote(text).to_string())),
        };
        Ok(value)
    }

    fn request_body(&self, line: &str, body: &str) -> Result<Value> {
        let invalid = || Error::step(line, "invalid JSON body or read() failure");
        match parse_read(body) {
            Some(raw) => match self.read_value(&raw) {
                Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(value),
                Ok(Value::String(text)) => serde_json::from_str(&text).map_err(|_| invalid()),
                Ok(_) => Err(invalid()),
                Err(e) => Err(Error::step(line, e.to_string())),
            },
            None => serde_json::from_str(body).map_err(|_| invalid()),
        }
    }

    /// Contents of a `read()` reference: JSON files are decoded, others are text
    fn read_value(&self, raw: &str) -> Result<Value> {
        let path = self.find_file(raw)?;
        let content = std::fs::read_to_string(&path).map_err(|e| Error::file_read(&path, e))?;
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .map_err(|e| Error::DataFile(format!("{}: {}", path.display(), e)))
        } else {
            Ok(Value::String(content))
        }
    }

    /// Resolve a referenced file through the search path, then the script's directory
    fn find_file(&self, raw: &str) -> Result<PathBuf> {
        if let Some(found) = resolve_reference(raw) {
            return Ok(found);
        }
        if let Some(dir) = self.script_dir {
            let beside = dir.join(raw);
            if beside.is_file() {
                return Ok(beside);
            }
        }

        let searched: Vec<String> = search_candidates(raw)
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        Err(Error::DataFile(format!(
            "File not found: {} (searched: {})",
            raw,
            searched.join(", ")
        )))
    }
}

/// The open page, or `NoPage`
fn page(ctx: &mut ExecutionContext) -> Result<&mut (dyn Page + 'static)> {
    ctx.page.as_deref_mut().ok_or(Error::NoPage)
}

/// Append a path segment with exactly one `/` between the parts
fn join_path(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

/// Walk a dotted path (`a.b.0.c` or `a.b[0].c`) into a JSON value
pub fn lookup_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let normalized = path.replace('[', ".").replace(']', "");
    let mut current = value;
    for key in normalized.split('.').filter(|k| !k.is_empty()) {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(key)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Expected side of a `match`: quoted text is a string, otherwise JSON when it parses
fn expected_value(raw: &str) -> Value {
    let unquoted = unquote(raw);
    if unquoted.len() != raw.trim().len() {
        return Value::String(unquoted.to_string());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.trim().to_string()))
}

/// Error message without the `Assertion failed:` prefix
fn strip_prefix(err: &Error) -> String {
    match err {
        Error::Assertion(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Evaluate a `print` argument
///
/// Falls back from the expression grammar to a plain variable lookup, then
/// to the literal text.
fn print_value(ctx: &ExecutionContext, expression: &str) -> String {
    match expression {
        "response" => ctx
            .response_json()
            .and_then(|json| serde_json::to_string_pretty(json).ok())
            .unwrap_or_else(|| "NULL".to_string()),
        "responseStatus" => ctx
            .response
            .as_ref()
            .map(|r| r.status.to_string())
            .unwrap_or_else(|| "NULL".to_string()),
        _ => match expr::evaluate(expression, &ctx.vars) {
            Ok(value) => display_value(&value),
            Err(_) => match ctx.vars.get(expression) {
                Some(value) => display_value(value),
                None => expression.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("http://api/", "/users"), "http://api/users");
        assert_eq!(join_path("http://api", "users/1"), "http://api/users/1");
    }

    #[test]
    fn test_lookup_path() {
        let body = json!({"data": {"items": [{"id": 7}, {"id": 8}]}, "token": "abc"});
        assert_eq!(lookup_path(&body, "token"), Some(&json!("abc")));
        assert_eq!(lookup_path(&body, "data.items.1.id"), Some(&json!(8)));
        assert_eq!(lookup_path(&body, "data.items[0].id"), Some(&json!(7)));
        assert_eq!(lookup_path(&body, "data.items.9.id"), None);
        assert_eq!(lookup_path(&body, "token.deeper"), None);
    }

    #[test]
    fn test_expected_value() {
        assert_eq!(expected_value("200"), json!(200));
        assert_eq!(expected_value("'200'"), json!("200"));
        assert_eq!(expected_value("#notnull"), json!("#notnull"));
        assert_eq!(expected_value(r#"{"ok": true}"#), json!({"ok": true}));
        assert_eq!(expected_value("plain text"), json!("plain text"));
    }
}
