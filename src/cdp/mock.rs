//! Mock CDP implementation for testing
//!
//! Commands are answered by a handler closure. The handler may push events
//! through [`MockEvents`]; they reach subscribers before the command's
//! response does, matching the ordering of a real browser connection.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::cdp::client::CdpClientImpl;
use crate::cdp::traits::*;
use crate::cdp::types::VersionInfo;
use crate::Error;

/// Handler answering one command: (method, params, events) -> result
pub type CommandHandler = Arc<dyn Fn(&str, &Value, &MockEvents) -> Result<Value, Error> + Send + Sync>;

/// Event emitter shared between a mock connection and its handler
#[derive(Debug, Clone, Default)]
pub struct MockEvents {
    subscribers: Arc<Mutex<Vec<UnboundedSender<CdpEvent>>>>,
}

impl MockEvents {
    /// Broadcast an event to every live subscriber
    pub fn emit(&self, method: &str, params: Value) {
        let event = CdpEvent {
            method: method.to_string(),
            params,
            session_id: None,
        };
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }

    fn subscribe(&self) -> UnboundedReceiver<CdpEvent> {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }

    fn clear(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }
}

/// Answers every command with an empty object
fn default_handler(method: &str, _params: &Value, _events: &MockEvents) -> Result<Value, Error> {
    match method {
        "Runtime.evaluate" => Ok(json!({ "result": { "type": "undefined" } })),
        _ => Ok(json!({})),
    }
}

/// Mock CDP connection
#[derive(Clone)]
pub struct MockCdpConnection {
    handler: CommandHandler,
    events: MockEvents,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    is_active: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for MockCdpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpConnection")
            .field("is_active", &self.is_active.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockCdpConnection {
    /// Create a new mock CDP connection
    pub fn new() -> Self {
        Self::with_handler(default_handler)
    }

    /// Create a mock connection answering commands with `handler`
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value, &MockEvents) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self::from_shared(Arc::new(handler))
    }

    pub fn from_shared(handler: CommandHandler) -> Self {
        Self {
            handler,
            events: MockEvents::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
            is_active: Arc::new(AtomicBool::new(true)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Push an event to subscribers outside of any command
    pub fn emit(&self, method: &str, params: Value) {
        self.events.emit(method, params);
    }

    /// Every (method, params) pair sent so far
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Params of every call to `method`
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p)
            .collect()
    }
}

impl Default for MockCdpConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpConnection for MockCdpConnection {
    async fn send_command(&self, method: &str, params: Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::Relaxed) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((method.to_string(), params.clone()));
        }

        let result = (self.handler)(method, &params, &self.events)?;

        Ok(CdpResponse {
            id,
            result: Some(result),
            error: None,
        })
    }

    async fn listen_events(&self) -> Result<UnboundedReceiver<CdpEvent>, Error> {
        Ok(self.events.subscribe())
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::Relaxed);
        self.events.clear();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Relaxed)
    }
}

/// Mock CDP browser
///
/// Every page client shares the browser's handler, so one closure scripts a
/// whole session.
#[derive(Clone)]
pub struct MockCdpBrowser {
    handler: CommandHandler,
    next_target: Arc<AtomicU64>,
    connections: Arc<Mutex<Vec<(String, MockCdpConnection)>>>,
    closed_targets: Arc<Mutex<Vec<TargetHandle>>>,
    is_connected: Arc<AtomicBool>,
}

impl std::fmt::Debug for MockCdpBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCdpBrowser")
            .field("is_connected", &self.is_connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockCdpBrowser {
    /// Create a new mock CDP browser
    pub fn new() -> Self {
        Self::with_shared(Arc::new(default_handler))
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value, &MockEvents) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self::with_shared(Arc::new(handler))
    }

    fn with_shared(handler: CommandHandler) -> Self {
        Self {
            handler,
            next_target: Arc::new(AtomicU64::new(1)),
            connections: Arc::new(Mutex::new(Vec::new())),
            closed_targets: Arc::new(Mutex::new(Vec::new())),
            is_connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Connection backing the client created for `target_id`
    pub fn connection_for(&self, target_id: &str) -> Option<MockCdpConnection> {
        self.connections.lock().ok().and_then(|connections| {
            connections
                .iter()
                .find(|(id, _)| id == target_id)
                .map(|(_, c)| c.clone())
        })
    }

    /// Targets closed so far
    pub fn closed_targets(&self) -> Vec<TargetHandle> {
        self.closed_targets.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }
}

impl Default for MockCdpBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpBrowser for MockCdpBrowser {
    async fn create_target(&self, isolated: bool) -> Result<TargetHandle, Error> {
        if !self.is_connected() {
            return Err(Error::websocket("Browser connection is closed"));
        }
        let n = self.next_target.fetch_add(1, Ordering::Relaxed);
        let target_id = format!("MOCK-TARGET-{}", n);
        Ok(TargetHandle {
            ws_url: format!("ws://127.0.0.1:0/devtools/page/{}", target_id),
            browser_context_id: isolated.then(|| format!("MOCK-CONTEXT-{}", n)),
            target_id,
        })
    }

    async fn close_target(&self, target: &TargetHandle) -> Result<(), Error> {
        if let Some(connection) = self.connection_for(&target.target_id) {
            connection.close().await?;
        }
        if let Ok(mut closed) = self.closed_targets.lock() {
            closed.push(target.clone());
        }
        Ok(())
    }

    async fn create_client(&self, target: &TargetHandle) -> Result<Arc<dyn CdpClient>, Error> {
        let connection = MockCdpConnection::from_shared(Arc::clone(&self.handler));
        if let Ok(mut connections) = self.connections.lock() {
            connections.push((target.target_id.clone(), connection.clone()));
        }
        Ok(Arc::new(CdpClientImpl::new(Arc::new(connection))))
    }

    async fn get_version(&self) -> Result<VersionInfo, Error> {
        Ok(VersionInfo {
            product: "HeadlessChrome/mock".to_string(),
            protocol_version: "1.3".to_string(),
            user_agent: "Mozilla/5.0 (mock)".to_string(),
            js_version: "mock".to_string(),
            web_socket_debugger_url: None,
        })
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_connected.store(false, Ordering::Relaxed);
        let connections = self
            .connections
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default();
        for (_, connection) in connections {
            connection.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_events_arrive_before_response() {
        let connection = MockCdpConnection::with_handler(|method, _params, events| {
            if method == "Page.reload" {
                events.emit("Page.loadEventFired", json!({}));
            }
            Ok(json!({}))
        });
        let mut events = connection.listen_events().await.unwrap();

        connection.send_command("Page.reload", json!({})).await.unwrap();

        assert_eq!(events.try_recv().unwrap().method, "Page.loadEventFired");
        assert_eq!(connection.calls_to("Page.reload").len(), 1);
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_commands() {
        let connection = MockCdpConnection::new();
        connection.close().await.unwrap();
        assert!(!connection.is_active());
        assert!(connection.send_command("Page.enable", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_browser_tracks_targets() {
        let browser = MockCdpBrowser::new();
        let isolated = browser.create_target(true).await.unwrap();
        let shared = browser.create_target(false).await.unwrap();
        assert!(isolated.browser_context_id.is_some());
        assert!(shared.browser_context_id.is_none());
        assert_ne!(isolated.target_id, shared.target_id);

        let client = browser.create_client(&isolated).await.unwrap();
        browser.close_target(&isolated).await.unwrap();
        assert!(!client.connection().is_active());
        assert_eq!(browser.closed_targets(), vec![isolated]);
    }
}
