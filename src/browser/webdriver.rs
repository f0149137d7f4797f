//! W3C WebDriver backend
//!
//! Spawns chromedriver (or connects to `browser.driver_url`) and maps every
//! [`Page`] operation onto a WebDriver HTTP command. Each page is its own
//! WebDriver session, so cookies and storage never leak between scenarios.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::process::{Child, Command};

use super::{BrowserEngine, BrowserLauncher, DialogAction, FrameTarget, Page, ScrollTarget, SelectBy};
use crate::common::config::BrowserConfig;
use crate::common::{Error, Result};
use crate::selector::Locator;

/// Key identifying an element reference in WebDriver JSON
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Timeout for the driver process to start answering
const STARTUP_TIMEOUT_SECS: u64 = 10;

const DRIVER_BINARY: &str = "chromedriver";

const SELECT_OPTION_JS: &str = r#"
const [select, mode, wanted] = arguments;
const options = Array.from(select.options || []);
let index = -1;
if (mode === 'index') {
  index = Number(wanted);
} else if (mode === 'value') {
  index = options.findIndex(o => o.value === wanted);
} else {
  index = options.findIndex(o => o.text.trim() === wanted);
}
if (index < 0 || index >= options.length) {
  return false;
}
select.selectedIndex = index;
select.dispatchEvent(new Event('input', { bubbles: true }));
select.dispatchEvent(new Event('change', { bubbles: true }));
return true;
"#;

/// Minimal WebDriver wire client
#[derive(Clone)]
struct WireClient {
    http: reqwest::Client,
    base: String,
}

impl WireClient {
    fn new(http: reqwest::Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Send a command and return the `value` member of the reply
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("WebDriver >>> {} {}", method, path);

        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Browser(format!("WebDriver request {} {} failed: {}", method, path, e)))?;
        let status = response.status();
        let reply: Value = response
            .json()
            .await
            .map_err(|e| Error::Browser(format!("Invalid WebDriver reply to {}: {}", path, e)))?;

        let value = reply.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(map_wire_error(&value));
        }
        tracing::debug!("WebDriver <<< {}", status);
        Ok(value)
    }
}

/// Convert a WebDriver error payload into an interpreter error
fn map_wire_error(value: &Value) -> Error {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(|m| m.lines().next().unwrap_or_default())
        .unwrap_or_default();

    match code {
        "no such element" | "stale element reference" | "no such frame" => {
            Error::ElementNotFound(message.to_string())
        }
        _ => Error::Browser(format!("{}: {}", code, message)),
    }
}

/// Session capabilities for chromedriver
fn capabilities(config: &BrowserConfig) -> Value {
    let mut args = vec!["--window-size=1366,768".to_string()];
    if config.headless {
        args.push("--headless=new".to_string());
    }

    let mut chrome = json!({ "args": args });
    if let Some(binary) = &config.binary {
        chrome["binary"] = json!(binary.display().to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                // dialogs stay open until a dialog step handles them
                "unhandledPromptBehavior": "ignore",
                "goog:chromeOptions": chrome,
            }
        }
    })
}

/// Pull the element id out of a find-element reply
fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)
}

fn element_ref(id: &str) -> Value {
    json!({ ELEMENT_KEY: id })
}

/// Starts chromedriver, or connects to a remote WebDriver server
#[derive(Default)]
pub struct WebDriverLauncher;

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserEngine>> {
        let http = reqwest::Client::new();

        if let Some(url) = &config.driver_url {
            let wire = WireClient::new(http, url);
            wait_ready(&wire).await?;
            return Ok(Box::new(WebDriverEngine {
                wire,
                process: None,
                config: config.clone(),
            }));
        }

        let driver = match &config.driver_path {
            Some(path) => path.clone(),
            None => which::which(DRIVER_BINARY).map_err(|_| {
                Error::DriverStartFailed(format!(
                    "'{}' not found in PATH. Install it or set browser.driver_path",
                    DRIVER_BINARY
                ))
            })?,
        };

        let process = Command::new(&driver)
            .arg(format!("--port={}", config.port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::DriverStartFailed(format!("Failed to start {}: {}", driver.display(), e)))?;

        let wire = WireClient::new(http, &format!("http://127.0.0.1:{}", config.port));
        wait_ready(&wire).await?;
        tracing::debug!("WebDriver listening on port {}", config.port);

        Ok(Box::new(WebDriverEngine {
            wire,
            process: Some(process),
            config: config.clone(),
        }))
    }
}

/// Poll `/status` until the driver reports ready
async fn wait_ready(wire: &WireClient) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(STARTUP_TIMEOUT_SECS);

    loop {
        if let Ok(status) = wire.command(Method::GET, "/status", None).await {
            if status.get("ready").and_then(Value::as_bool).unwrap_or(true) {
                return Ok(());
            }
        }

        if Instant::now() >= deadline {
            return Err(Error::DriverStartFailed(format!(
                "WebDriver at {} not ready after {} seconds",
                wire.base, STARTUP_TIMEOUT_SECS
            )));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// A running WebDriver server
pub struct WebDriverEngine {
    wire: WireClient,
    process: Option<Child>,
    config: BrowserConfig,
}

#[async_trait]
impl BrowserEngine for WebDriverEngine {
    async fn new_page(&mut self) -> Result<Box<dyn Page>> {
        let reply = self
            .wire
            .command(Method::POST, "/session", Some(capabilities(&self.config)))
            .await?;
        let id = reply
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Browser("new session reply has no sessionId".to_string()))?;

        let page = WebDriverPage {
            wire: self.wire.clone(),
            session: format!("/session/{}", id),
        };

        let timeout_ms = self.config.timeout_ms;
        page.wire
            .command(
                Method::POST,
                &page.path("/timeouts"),
                Some(json!({ "implicit": timeout_ms, "pageLoad": timeout_ms })),
            )
            .await?;

        Ok(Box::new(page))
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut process) = self.process.take() {
            process.kill().await?;
        }
        Ok(())
    }
}

/// One WebDriver session
pub struct WebDriverPage {
    wire: WireClient,
    session: String,
}

impl WebDriverPage {
    fn path(&self, suffix: &str) -> String {
        format!("{}{}", self.session, suffix)
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<Value> {
        self.wire.command(Method::POST, &self.path(suffix), Some(body)).await
    }

    async fn get(&self, suffix: &str) -> Result<Value> {
        self.wire.command(Method::GET, &self.path(suffix), None).await
    }

    async fn find(&self, locator: &Locator) -> Result<String> {
        let reply = self
            .post("/element", json!({ "using": locator.strategy(), "value": locator.query }))
            .await
            .map_err(|e| match e {
                Error::ElementNotFound(_) => Error::ElementNotFound(locator.to_string()),
                other => other,
            })?;
        element_id(&reply).ok_or_else(|| Error::ElementNotFound(locator.to_string()))
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.post("/timeouts", json!({ "pageLoad": timeout.as_millis() as u64 }))
            .await?;
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<()> {
        let id = self.find(locator).await?;
        self.post(&format!("/element/{}/clear", id), json!({})).await?;
        self.post(&format!("/element/{}/value", id), json!({ "text": value }))
            .await?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let id = self.find(locator).await?;
        self.post(&format!("/element/{}/click", id), json!({})).await?;
        Ok(())
    }

    async fn select(&mut self, locator: &Locator, by: &SelectBy) -> Result<()> {
        let id = self.find(locator).await?;
        let (mode, wanted) = match by {
            SelectBy::Text(t) => ("text", json!(t)),
            SelectBy::Value(v) => ("value", json!(v)),
            SelectBy::Index(i) => ("index", json!(i)),
        };
        let selected = self
            .execute(SELECT_OPTION_JS, vec![element_ref(&id), json!(mode), wanted])
            .await?;
        if selected.as_bool() != Some(true) {
            return Err(Error::ElementNotFound(format!(
                "option {:?} in {}",
                by, locator
            )));
        }
        Ok(())
    }

    async fn is_checked(&mut self, locator: &Locator) -> Result<bool> {
        let id = self.find(locator).await?;
        let selected = self.get(&format!("/element/{}/selected", id)).await?;
        Ok(selected.as_bool().unwrap_or(false))
    }

    async fn inner_text(&mut self, locator: &Locator) -> Result<String> {
        let id = self.find(locator).await?;
        let text = self.get(&format!("/element/{}/text", id)).await?;
        Ok(text.as_str().unwrap_or_default().to_string())
    }

    async fn scroll(&mut self, target: &ScrollTarget) -> Result<()> {
        match target {
            ScrollTarget::Element(locator) => {
                let id = self.find(locator).await?;
                self.execute(
                    "arguments[0].scrollIntoView({ block: 'center' });",
                    vec![element_ref(&id)],
                )
                .await?;
            }
            ScrollTarget::Top => {
                self.execute("window.scrollTo(0, 0);", vec![]).await?;
            }
            ScrollTarget::Bottom => {
                self.execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
                    .await?;
            }
            ScrollTarget::Position { x, y } => {
                self.execute("window.scrollTo(arguments[0], arguments[1]);", vec![json!(x), json!(y)])
                    .await?;
            }
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        self.execute(script, vec![]).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let encoded = self.get("/screenshot").await?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| Error::Browser("screenshot reply is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::Browser(format!("screenshot is not valid base64: {}", e)))
    }

    async fn switch_frame(&mut self, target: &FrameTarget) -> Result<()> {
        match target {
            FrameTarget::Element(locator) => {
                let id = self.find(locator).await?;
                self.post("/frame", json!({ "id": element_ref(&id) })).await?;
            }
            FrameTarget::Index(index) => {
                self.post("/frame", json!({ "id": index })).await?;
            }
            FrameTarget::Main => {
                self.post("/frame", json!({ "id": Value::Null })).await?;
            }
            FrameTarget::Parent => {
                self.post("/frame/parent", json!({})).await?;
            }
        }
        Ok(())
    }

    async fn handle_dialog(&mut self, action: &DialogAction) -> Result<()> {
        match action {
            DialogAction::Accept => {
                self.post("/alert/accept", json!({})).await?;
            }
            DialogAction::Dismiss => {
                self.post("/alert/dismiss", json!({})).await?;
            }
            DialogAction::Type(text) => {
                self.post("/alert/text", json!({ "text": text })).await?;
                self.post("/alert/accept", json!({})).await?;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.wire.command(Method::DELETE, &self.session, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_wire_error() {
        let err = map_wire_error(&json!({
            "error": "no such element",
            "message": "Unable to locate element\nstack..."
        }));
        assert!(matches!(err, Error::ElementNotFound(ref m) if m == "Unable to locate element"));

        let err = map_wire_error(&json!({ "error": "no such alert", "message": "no alert open" }));
        assert!(matches!(err, Error::Browser(ref m) if m.contains("no such alert")));
    }

    #[test]
    fn test_capabilities_headless() {
        let config = BrowserConfig {
            headless: true,
            ..Default::default()
        };
        let caps = capabilities(&config);
        let args = &caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"];
        assert!(args.as_array().unwrap().contains(&json!("--headless=new")));
        assert_eq!(
            caps["capabilities"]["alwaysMatch"]["unhandledPromptBehavior"],
            json!("ignore")
        );
    }

    #[test]
    fn test_element_id_round_trip() {
        assert_eq!(element_id(&element_ref("abc")), Some("abc".to_string()));
        assert_eq!(element_id(&json!({})), None);
    }
}
