//! CDP browser control implementation
//!
//! This module provides browser-level operations via CDP.

use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::*;
use super::types::{CreateBrowserContextResponse, CreateTargetResponse, VersionInfo};
use crate::Error;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// CDP browser implementation
#[derive(Debug)]
pub struct CdpBrowserImpl {
    /// Browser WebSocket endpoint (e.g., "ws://127.0.0.1:9222/devtools/browser/<id>")
    endpoint: String,
    /// Browser-level connection used for Target.* commands
    connection: Arc<CdpWebSocketConnection>,
    /// Page connections (target_id -> connection)
    connections: Mutex<HashMap<String, Arc<dyn CdpConnection>>>,
}

impl CdpBrowserImpl {
    /// Connect to a browser-level WebSocket endpoint
    pub async fn connect<S: Into<String>>(endpoint: S) -> Result<Self, Error> {
        let endpoint = endpoint.into();
        info!("Connecting to browser at {}", endpoint);
        let connection = CdpWebSocketConnection::new(endpoint.clone()).await?;

        Ok(Self {
            endpoint,
            connection,
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a user-supplied endpoint to the browser WebSocket URL.
    ///
    /// WebSocket URLs pass through; http(s) endpoints are looked up via
    /// `/json/version`.
    pub async fn resolve_endpoint(endpoint: &str, timeout: Duration) -> Result<String, Error> {
        if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            return Ok(endpoint.to_string());
        }

        let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
        debug!("Fetching browser version from {}", url);

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let version: VersionInfo = client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::launch(format!("DevTools endpoint {} unreachable: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| Error::launch(format!("Invalid /json/version from {}: {}", endpoint, e)))?;

        version
            .web_socket_debugger_url
            .ok_or_else(|| Error::launch(format!("No webSocketDebuggerUrl at {}", url)))
    }

    /// Browser WebSocket endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Best-effort release of a browser context whose target never came up
    async fn dispose_context(&self, context_id: &str) {
        let disposed = self
            .connection
            .send_command(
                "Target.disposeBrowserContext",
                json!({ "browserContextId": context_id }),
            )
            .await;
        if let Err(e) = disposed {
            warn!("Failed to dispose browser context {}: {}", context_id, e);
        }
    }

    fn page_ws_url(&self, target_id: &str) -> String {
        page_ws_url(&self.endpoint, target_id)
    }
}

/// Derive a page WebSocket URL from the browser endpoint
fn page_ws_url(browser_endpoint: &str, target_id: &str) -> String {
    let base = match browser_endpoint.find("/devtools/") {
        Some(idx) => &browser_endpoint[..idx],
        None => browser_endpoint.trim_end_matches('/'),
    };
    format!("{}/devtools/page/{}", base, target_id)
}

#[async_trait]
impl CdpBrowser for CdpBrowserImpl {
    async fn create_target(&self, isolated: bool) -> Result<TargetHandle, Error> {
        let browser_context_id = if isolated {
            let result = self
                .connection
                .send_command("Target.createBrowserContext", json!({}))
                .await?
                .result
                .unwrap_or_default();
            let context: CreateBrowserContextResponse = serde_json::from_value(result)?;
            Some(context.browser_context_id)
        } else {
            None
        };

        let mut params = json!({ "url": "about:blank" });
        if let Some(context_id) = &browser_context_id {
            params["browserContextId"] = json!(context_id);
        }

        let created = self
            .connection
            .send_command("Target.createTarget", params)
            .await
            .and_then(|response| {
                Ok(serde_json::from_value::<CreateTargetResponse>(
                    response.result.unwrap_or_default(),
                )?)
            });
        let target = match created {
            Ok(target) => target,
            Err(e) => {
                if let Some(context_id) = &browser_context_id {
                    self.dispose_context(context_id).await;
                }
                return Err(e);
            }
        };

        debug!("Created target {} (context {:?})", target.target_id, browser_context_id);

        Ok(TargetHandle {
            ws_url: self.page_ws_url(&target.target_id),
            target_id: target.target_id,
            browser_context_id,
        })
    }

    async fn close_target(&self, target: &TargetHandle) -> Result<(), Error> {
        if let Some(connection) = self.connections.lock().await.remove(&target.target_id) {
            if let Err(e) = connection.close().await {
                debug!("Page connection close for {}: {}", target.target_id, e);
            }
        }

        let closed = self
            .connection
            .send_command("Target.closeTarget", json!({ "targetId": target.target_id }))
            .await;

        // The context goes even when the tab itself could not be closed
        let disposed = match &target.browser_context_id {
            Some(context_id) => self
                .connection
                .send_command(
                    "Target.disposeBrowserContext",
                    json!({ "browserContextId": context_id }),
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        };

        closed?;
        disposed?;

        debug!("Closed target {}", target.target_id);
        Ok(())
    }

    async fn create_client(&self, target: &TargetHandle) -> Result<Arc<dyn CdpClient>, Error> {
        let connection = CdpWebSocketConnection::new(target.ws_url.clone()).await?;

        self.connections.lock().await.insert(
            target.target_id.clone(),
            Arc::clone(&connection) as Arc<dyn CdpConnection>,
        );

        Ok(Arc::new(CdpClientImpl::new(connection)))
    }

    async fn get_version(&self) -> Result<VersionInfo, Error> {
        let result = self
            .connection
            .send_command("Browser.getVersion", json!({}))
            .await?
            .result
            .unwrap_or_default();

        let field = |name: &str| {
            result
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string()
        };

        Ok(VersionInfo {
            product: field("product"),
            protocol_version: field("protocolVersion"),
            user_agent: field("userAgent"),
            js_version: field("jsVersion"),
            web_socket_debugger_url: Some(self.endpoint.clone()),
        })
    }

    async fn close(&self) -> Result<(), Error> {
        let connections: Vec<_> = self.connections.lock().await.drain().collect();
        if !connections.is_empty() {
            debug!("Closing {} page connections", connections.len());
        }
        for (target_id, connection) in connections {
            if let Err(e) = connection.close().await {
                warn!("Failed to close connection to {}: {}", target_id, e);
            }
        }

        self.connection.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_ws_url_from_browser_endpoint() {
        assert_eq!(
            page_ws_url("ws://127.0.0.1:41235/devtools/browser/5f1c", "ABC"),
            "ws://127.0.0.1:41235/devtools/page/ABC"
        );
        assert_eq!(
            page_ws_url("ws://localhost:9222/", "XYZ"),
            "ws://localhost:9222/devtools/page/XYZ"
        );
    }

    #[tokio::test]
    async fn test_resolve_endpoint_passes_websocket_urls_through() {
        let url = CdpBrowserImpl::resolve_endpoint(
            "ws://127.0.0.1:9222/devtools/browser/abc",
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    #[tokio::test]
    async fn test_resolve_endpoint_unreachable_is_launch_error() {
        // Port 9 (discard) is closed on any sane test host
        let err = CdpBrowserImpl::resolve_endpoint("http://127.0.0.1:9", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }
}
