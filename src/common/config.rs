//! Configuration file handling

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::CONFIG_FILE_NAMES;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Evidence settings
    #[serde(default)]
    pub evidence: EvidenceConfig,

    /// Report settings
    #[serde(default)]
    pub reports: ReportsConfig,

    /// Browser automation settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// HTTP settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Console output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Files may wrap everything in a top-level `stepwright:` section
#[derive(Deserialize)]
struct Wrapped {
    stepwright: Config,
}

/// Evidence settings
#[derive(Debug, Deserialize, Clone)]
pub struct EvidenceConfig {
    /// Directory for per-scenario evidence files
    #[serde(default = "default_evidence_folder")]
    pub folder: PathBuf,

    /// Capture a screenshot after every successful UI step
    #[serde(default = "default_true")]
    pub screenshot_on_pass: bool,

    /// Capture a screenshot when a UI step fails
    #[serde(default = "default_true")]
    pub screenshot_on_fail: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            folder: default_evidence_folder(),
            screenshot_on_pass: true,
            screenshot_on_fail: true,
        }
    }
}

fn default_evidence_folder() -> PathBuf {
    PathBuf::from("evidence")
}

fn default_true() -> bool {
    true
}

/// Report settings
#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    /// Directory for run reports
    #[serde(default = "default_reports_folder")]
    pub folder: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            folder: default_reports_folder(),
        }
    }
}

fn default_reports_folder() -> PathBuf {
    PathBuf::from("reports")
}

/// Browser automation settings
#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    /// Run the browser without a window
    #[serde(default)]
    pub headless: bool,

    /// Navigation timeout in milliseconds
    #[serde(default = "default_browser_timeout")]
    pub timeout_ms: u64,

    /// Path to the WebDriver executable (searched in PATH when unset)
    #[serde(default)]
    pub driver_path: Option<PathBuf>,

    /// URL of an already running WebDriver server; no process is spawned
    #[serde(default)]
    pub driver_url: Option<String>,

    /// Port for a spawned WebDriver process
    #[serde(default = "default_driver_port")]
    pub port: u16,

    /// Browser binary override passed to the driver
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            timeout_ms: default_browser_timeout(),
            driver_path: None,
            driver_url: None,
            port: default_driver_port(),
            binary: None,
        }
    }
}

impl BrowserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_browser_timeout() -> u64 {
    30_000
}

fn default_driver_port() -> u16 {
    9515
}

/// HTTP settings
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Verify TLS certificates
    #[serde(default = "default_true")]
    pub verify_ssl: bool,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers every scenario starts with
    #[serde(default = "default_headers")]
    pub headers: IndexMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_api_timeout(),
            verify_ssl: true,
            user_agent: default_user_agent(),
            headers: default_headers(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Headers a fresh execution context is seeded with
    pub fn default_headers(&self) -> IndexMap<String, String> {
        let mut headers = self.headers.clone();
        headers
            .entry("User-Agent".to_string())
            .or_insert_with(|| self.user_agent.clone());
        headers
    }
}

fn default_api_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("stepwright/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_headers() -> IndexMap<String, String> {
    let mut headers = IndexMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers
}

/// Console output settings
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Debug-level logging for this crate
    #[serde(default)]
    pub verbose: bool,

    /// Maximum characters of a non-JSON response kept in the log
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_response_size: default_max_response_size(),
        }
    }
}

fn default_max_response_size() -> usize {
    500
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the conventional file names
    /// are tried in the working directory, then defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        for name in CONFIG_FILE_NAMES {
            let path = Path::new(name);
            if path.exists() {
                tracing::debug!("Using configuration file {}", path.display());
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration text, with or without the `stepwright:` wrapper
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;

        let config = if value.is_null() {
            Self::default()
        } else if value.get("stepwright").is_some() {
            serde_yaml::from_value::<Wrapped>(value)
                .map_err(|e| Error::ConfigParse(e.to_string()))?
                .stepwright
        } else {
            serde_yaml::from_value(value).map_err(|e| Error::ConfigParse(e.to_string()))?
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            return Err(Error::Config("api.timeout_secs must be positive".to_string()));
        }
        if self.browser.timeout_ms == 0 {
            return Err(Error::Config("browser.timeout_ms must be positive".to_string()));
        }
        if self.logging.max_response_size == 0 {
            return Err(Error::Config(
                "logging.max_response_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Documented example configuration written by `init`
    pub fn example_yaml() -> &'static str {
        r#"# stepwright configuration
# Copy to 'stepwright.config.yaml' and adjust.

stepwright:
  evidence:
    folder: "evidence"          # per-scenario evidence files
    screenshot_on_pass: true    # screenshot after every passing UI step
    screenshot_on_fail: true    # screenshot when a UI step fails

  reports:
    folder: "reports"           # run reports (HTML + JSON)

  browser:
    headless: false             # true for CI
    timeout_ms: 30000           # navigation timeout
    # driver_path: /usr/local/bin/chromedriver
    # driver_url: http://localhost:4444
    port: 9515                  # port for a spawned chromedriver

  api:
    timeout_secs: 30
    verify_ssl: true
    user_agent: "stepwright"
    headers:
      Content-Type: "application/json"
      Accept: "application/json"

  logging:
    verbose: false
    max_response_size: 500      # characters of non-JSON bodies kept
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.api.verify_ssl);
        assert_eq!(config.browser.timeout_ms, 30_000);
        assert_eq!(config.evidence.folder, PathBuf::from("evidence"));
        assert!(config.api.default_headers().contains_key("User-Agent"));
    }

    #[test]
    fn test_wrapped_and_bare_sections() {
        let wrapped = Config::from_yaml("stepwright:\n  browser:\n    headless: true\n").unwrap();
        assert!(wrapped.browser.headless);

        let bare = Config::from_yaml("api:\n  timeout_secs: 5\n  verify_ssl: false\n").unwrap();
        assert_eq!(bare.api.timeout_secs, 5);
        assert!(!bare.api.verify_ssl);
        // untouched sections keep their defaults
        assert_eq!(bare.reports.folder, PathBuf::from("reports"));
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.logging.max_response_size, 500);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = Config::from_yaml("api:\n  timeout_secs: 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let err = Config::from_yaml("api: [unclosed").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_example_parses() {
        let config = Config::from_yaml(Config::example_yaml()).unwrap();
        assert_eq!(config.browser.port, 9515);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/stepwright.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
