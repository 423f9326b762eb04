//! Configuration management for the harness
//!
//! Layers, lowest to highest precedence: defaults, TOML file, environment,
//! command-line flags (applied by the binary).

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Harness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the website under test
    pub base_url: String,

    /// Base URL of the inline-edit server
    pub edit_server_url: String,

    /// Attach to an already running Chrome instead of launching one
    /// (e.g. "http://localhost:9222" or a browser WebSocket URL)
    pub cdp_endpoint: Option<String>,

    /// Chrome executable path
    pub chrome_path: Option<PathBuf>,

    /// Run Chrome headless
    pub headless: bool,

    /// Pass --no-sandbox to Chrome (needed when running as root in containers)
    pub no_sandbox: bool,

    /// Total budget per test case in milliseconds, shared by all waits in the case
    pub case_timeout_ms: u64,

    /// Interval between polls of a wait condition in milliseconds
    pub poll_interval_ms: u64,

    /// Time allowed for Chrome to publish its DevTools port in milliseconds
    pub launch_timeout_ms: u64,

    /// Time allowed for the edit-server capability probe in milliseconds
    pub probe_timeout_ms: u64,

    /// Maximum number of test cases running at once
    pub concurrency: usize,

    /// Default viewport width for new pages
    pub viewport_width: u32,

    /// Default viewport height for new pages
    pub viewport_height: u32,

    /// Directory receiving failure screenshots
    pub artifacts_dir: Option<PathBuf>,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            edit_server_url: "http://localhost:3000".to_string(),
            cdp_endpoint: None,
            chrome_path: None,
            headless: true,
            no_sandbox: false,
            case_timeout_ms: 30000,
            poll_interval_ms: 100,
            launch_timeout_ms: 15000,
            probe_timeout_ms: 2000,
            concurrency: 4,
            viewport_width: 1280,
            viewport_height: 720,
            artifacts_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        Config::default().with_env()
    }

    /// Load configuration from a file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides
    pub fn with_env(mut self) -> Result<Self> {
        // BASE_URL is what the site's own tooling exports
        if let Ok(base_url) = env::var("NAAMANI_BASE_URL").or_else(|_| env::var("BASE_URL")) {
            self.base_url = base_url;
        }

        if let Ok(url) = env::var("NAAMANI_EDIT_SERVER_URL") {
            self.edit_server_url = url;
        }

        if let Ok(endpoint) = env::var("NAAMANI_CDP_ENDPOINT") {
            self.cdp_endpoint = Some(endpoint);
        }

        if let Ok(chrome_path) = env::var("NAAMANI_CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(chrome_path));
        }

        if let Ok(headless) = env::var("NAAMANI_HEADLESS") {
            self.headless = headless
                .parse()
                .map_err(|_| Error::configuration("Invalid NAAMANI_HEADLESS"))?;
        }

        if let Ok(no_sandbox) = env::var("NAAMANI_NO_SANDBOX") {
            self.no_sandbox = no_sandbox
                .parse()
                .map_err(|_| Error::configuration("Invalid NAAMANI_NO_SANDBOX"))?;
        }

        if let Ok(timeout) = env::var("NAAMANI_CASE_TIMEOUT_MS") {
            self.case_timeout_ms = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid NAAMANI_CASE_TIMEOUT_MS"))?;
        }

        if let Ok(interval) = env::var("NAAMANI_POLL_INTERVAL_MS") {
            self.poll_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("Invalid NAAMANI_POLL_INTERVAL_MS"))?;
        }

        if let Ok(concurrency) = env::var("NAAMANI_CONCURRENCY") {
            self.concurrency = concurrency
                .parse()
                .map_err(|_| Error::configuration("Invalid NAAMANI_CONCURRENCY"))?;
        }

        if let Ok(dir) = env::var("NAAMANI_ARTIFACTS_DIR") {
            self.artifacts_dir = Some(PathBuf::from(dir));
        }

        if let Ok(log_level) = env::var("NAAMANI_LOG_LEVEL") {
            self.log_level = log_level;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject values the harness cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::configuration(format!(
                "base_url must be an http(s) URL, got {}",
                self.base_url
            )));
        }
        if self.case_timeout_ms == 0 {
            return Err(Error::configuration("case_timeout_ms must be positive"));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.case_timeout_ms {
            return Err(Error::configuration(
                "poll_interval_ms must be positive and below case_timeout_ms",
            ));
        }
        if self.concurrency == 0 {
            return Err(Error::configuration("concurrency must be at least 1"));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(Error::configuration("viewport dimensions must be positive"));
        }
        Ok(())
    }

    /// Join a site path onto the base URL
    pub fn site_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_millis(self.case_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.case_timeout(), Duration::from_secs(30));
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_site_url_joins_single_slash() {
        let mut config = Config::default();
        config.base_url = "http://localhost:8000/".to_string();
        assert_eq!(config.site_url("/naamani/1/"), "http://localhost:8000/naamani/1/");
        assert_eq!(config.site_url("naamani/"), "http://localhost:8000/naamani/");
        assert_eq!(config.site_url("/"), "http://localhost:8000/");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            base_url = "http://127.0.0.1:9000"
            concurrency = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.poll_interval_ms, 100);
        assert!(config.headless);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.base_url = "localhost:8000".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = Config::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll_interval_ms = 60_000;
        assert!(config.validate().is_err());
    }
}
