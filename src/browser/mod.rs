//! Browser automation boundary
//!
//! The interpreter drives pages through three traits:
//! [`BrowserLauncher`] starts the engine, [`BrowserEngine`] hands out
//! isolated pages, and [`Page`] performs the UI actions. The default
//! implementation in [`webdriver`] talks to chromedriver over the W3C
//! WebDriver protocol.

pub mod webdriver;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::common::config::BrowserConfig;
use crate::common::{Error, Result};
use crate::selector::Locator;

/// How a `<select>` option is chosen
#[derive(Debug, Clone, PartialEq)]
pub enum SelectBy {
    Text(String),
    Value(String),
    Index(usize),
}

/// Where `scroll to` goes
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    Element(Locator),
    Top,
    Bottom,
    Position { x: i64, y: i64 },
}

/// Which browsing context subsequent UI steps act on
#[derive(Debug, Clone, PartialEq)]
pub enum FrameTarget {
    Element(Locator),
    Index(u16),
    Parent,
    Main,
}

/// Response to an open JavaScript dialog
#[derive(Debug, Clone, PartialEq)]
pub enum DialogAction {
    Accept,
    Dismiss,
    /// Type into a prompt, then accept it
    Type(String),
}

/// A single isolated browser page
#[async_trait]
pub trait Page: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    async fn fill(&mut self, locator: &Locator, value: &str) -> Result<()>;
    async fn click(&mut self, locator: &Locator) -> Result<()>;
    async fn select(&mut self, locator: &Locator, by: &SelectBy) -> Result<()>;
    /// Whether a checkbox or radio is currently checked
    async fn is_checked(&mut self, locator: &Locator) -> Result<bool>;
    async fn inner_text(&mut self, locator: &Locator) -> Result<String>;
    async fn scroll(&mut self, target: &ScrollTarget) -> Result<()>;
    async fn evaluate(&mut self, script: &str) -> Result<Value>;
    /// PNG bytes of the current viewport
    async fn screenshot(&mut self) -> Result<Vec<u8>>;
    async fn switch_frame(&mut self, target: &FrameTarget) -> Result<()>;
    async fn handle_dialog(&mut self, action: &DialogAction) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// A running browser engine that can open isolated pages
#[async_trait]
pub trait BrowserEngine: Send {
    /// Open a fresh browsing context with one page
    async fn new_page(&mut self) -> Result<Box<dyn Page>>;
    /// Stop the engine; called once at the end of a script run
    async fn shutdown(&mut self) -> Result<()>;
}

/// Starts a browser engine on first use
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserEngine>>;
}

/// Lazily started engine owned by the runner
///
/// The engine is created on the first `driver` step of a run, reused by
/// every later scenario, and shut down once by [`BrowserSlot::shutdown`].
pub struct BrowserSlot {
    launcher: Arc<dyn BrowserLauncher>,
    config: BrowserConfig,
    engine: Option<Box<dyn BrowserEngine>>,
}

impl BrowserSlot {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: BrowserConfig) -> Self {
        Self {
            launcher,
            config,
            engine: None,
        }
    }

    /// Open a new isolated page, starting the engine if needed
    pub async fn open_page(&mut self) -> Result<Box<dyn Page>> {
        if self.engine.is_none() {
            tracing::info!("Starting browser engine");
            self.engine = Some(self.launcher.launch(&self.config).await?);
        }
        match self.engine.as_mut() {
            Some(engine) => engine.new_page().await,
            None => Err(Error::Internal("browser engine missing after launch".to_string())),
        }
    }

    /// Stop the engine if it was started
    pub async fn shutdown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if let Err(e) = engine.shutdown().await {
                tracing::warn!("Error stopping browser engine: {}", e);
            }
        }
    }
}
