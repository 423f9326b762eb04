//! Optional-dependency detection
//!
//! The inline-edit UI only renders when the edit server answers. It is probed
//! once per run; the result is handed to every test case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::{Error, Result};

/// An optional external dependency a test case may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    EditServer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::EditServer => f.write_str("edit server"),
        }
    }
}

/// Capabilities available for this run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    available: BTreeSet<Capability>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.available.insert(capability);
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.available.contains(&capability)
    }

    /// First of `required` that is not available
    pub fn missing(&self, required: &[Capability]) -> Option<Capability> {
        required.iter().copied().find(|c| !self.has(*c))
    }

    /// Check every optional dependency once
    pub async fn probe(config: &Config) -> Self {
        let mut capabilities = Self::none();

        match EditServerClient::new(&config.edit_server_url, config.probe_timeout()) {
            Ok(client) => match client.health().await {
                Ok(true) => {
                    info!("Edit server available at {}", config.edit_server_url);
                    capabilities = capabilities.with(Capability::EditServer);
                }
                Ok(false) => info!("Edit server at {} is unhealthy; edit cases will be skipped", config.edit_server_url),
                Err(e) => info!("Edit server not reachable ({}); edit cases will be skipped", e),
            },
            Err(e) => warn!("Edit server client could not be built: {}", e),
        }

        capabilities
    }
}

/// `GET /api/read` envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReadResponse {
    pub success: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Minimal client for the inline-edit server
#[derive(Debug, Clone)]
pub struct EditServerClient {
    base_url: String,
    http: reqwest::Client,
}

impl EditServerClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// True when `/health` answers 2xx
    pub async fn health(&self) -> Result<bool> {
        let response = self.http.get(format!("{}/health", self.base_url)).send().await?;
        Ok(response.status().is_success())
    }

    /// Read a data file through the server, e.g. `Mantra/0001.txt`
    pub async fn read(&self, file: &str) -> Result<ReadResponse> {
        let response = self
            .http
            .get(format!("{}/api/read", self.base_url))
            .query(&[("file", file)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            Error::internal(format!(
                "Edit server returned {} with a body that is not a read envelope: {}",
                status, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_capabilities() {
        let none = Capabilities::none();
        assert_eq!(none.missing(&[Capability::EditServer]), Some(Capability::EditServer));
        assert_eq!(none.missing(&[]), None);

        let all = Capabilities::none().with(Capability::EditServer);
        assert!(all.has(Capability::EditServer));
        assert_eq!(all.missing(&[Capability::EditServer]), None);
    }

    #[test]
    fn test_read_envelope() {
        let ok: ReadResponse = serde_json::from_str(r#"{"success":true,"content":"ॐ"}"#).unwrap();
        assert!(ok.success);
        assert_eq!(ok.content.as_deref(), Some("ॐ"));

        let err: ReadResponse = serde_json::from_str(r#"{"success":false,"error":"File not found"}"#).unwrap();
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("File not found"));
    }

    #[tokio::test]
    async fn test_probe_unreachable_server() {
        let config = Config {
            // Reserved port; nothing listens there
            edit_server_url: "http://127.0.0.1:9".to_string(),
            probe_timeout_ms: 500,
            ..Default::default()
        };
        let capabilities = Capabilities::probe(&config).await;
        assert!(!capabilities.has(Capability::EditServer));
    }

    #[test]
    fn test_base_url_normalised() {
        let client = EditServerClient::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000");
    }
}
