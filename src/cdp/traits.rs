//! CDP (Chrome DevTools Protocol) layer traits
//!
//! This module defines the abstract interfaces for CDP communication.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

use super::types::{KeyEventParams, MouseEventParams, NavigateResponse, VersionInfo};

/// CDP event representation
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    pub params: Value,
    /// Session ID (for multi-session targets)
    pub session_id: Option<String>,
}

/// CDP response representation
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    pub result: Option<Value>,
    /// Error if any
    pub error: Option<CdpError>,
}

/// CDP error representation
#[derive(Debug, Clone)]
pub struct CdpError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    pub data: Option<Value>,
}

/// Filtered view over a connection's event broadcast.
///
/// Events are delivered on the connection's reader task in wire order, so an
/// event sent by the browser before a command response is always visible here
/// by the time that response has been returned.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: UnboundedReceiver<CdpEvent>,
    methods: Vec<String>,
}

impl EventReceiver {
    /// Wrap a raw receiver; an empty filter or "*" accepts every event,
    /// entries ending in '.' match a whole domain ("Network.")
    pub fn new(receiver: UnboundedReceiver<CdpEvent>, methods: &[&str]) -> Self {
        Self {
            receiver,
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn accepts(&self, event: &CdpEvent) -> bool {
        self.methods.is_empty()
            || self.methods.iter().any(|m| {
                m == "*" || *m == event.method || (m.ends_with('.') && event.method.starts_with(m.as_str()))
            })
    }

    /// Wait for the next matching event; `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<CdpEvent> {
        while let Some(event) = self.receiver.recv().await {
            if self.accepts(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Next buffered matching event without waiting
    pub fn try_recv(&mut self) -> Option<CdpEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }
}

/// CDP connection trait
///
/// Represents a WebSocket connection to a Chrome DevTools Protocol target.
#[async_trait]
pub trait CdpConnection: Send + Sync + std::fmt::Debug {
    /// Send a CDP command and wait for response
    async fn send_command(
        &self,
        method: &str,
        params: Value,
    ) -> Result<CdpResponse, crate::Error>;

    /// Subscribe to CDP events
    async fn listen_events(&self) -> Result<UnboundedReceiver<CdpEvent>, crate::Error>;

    /// Close the connection
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if connection is active
    fn is_active(&self) -> bool;
}

/// CDP client trait
///
/// High-level CDP client that provides typed methods for common CDP operations.
#[async_trait]
pub trait CdpClient: Send + Sync + std::fmt::Debug {
    /// Get the underlying connection
    fn connection(&self) -> Arc<dyn CdpConnection>;

    /// Call a raw CDP method (returns JSON Value)
    async fn call_method(&self, method: &str, params: Value) -> Result<Value, crate::Error>;

    /// Enable a domain
    async fn enable_domain(&self, domain: &str) -> Result<(), crate::Error>;

    /// Subscribe to events whose method matches one of `methods`
    async fn subscribe_events(&self, methods: &[&str]) -> Result<EventReceiver, crate::Error>;

    /// Issue Page.navigate; does not wait for the load
    async fn navigate(&self, url: &str) -> Result<NavigateResponse, crate::Error>;

    /// Evaluate JavaScript in the page
    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, crate::Error>;

    /// Dispatch a native mouse event
    async fn dispatch_mouse_event(&self, event: MouseEventParams) -> Result<(), crate::Error>;

    /// Dispatch a native key event
    async fn dispatch_key_event(&self, event: KeyEventParams) -> Result<(), crate::Error>;

    /// Insert text at the focused element as if typed
    async fn insert_text(&self, text: &str) -> Result<(), crate::Error>;

    /// Override the viewport size
    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), crate::Error>;

    /// Capture a PNG screenshot
    async fn screenshot(&self) -> Result<Vec<u8>, crate::Error>;
}

/// JavaScript evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
    /// String value
    String(String),
    /// Number value
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Null value
    Null,
    /// Object/Array (as JSON)
    Object(Value),
}

impl EvaluationResult {
    /// Collapse into a plain JSON value
    pub fn into_value(self) -> Value {
        match self {
            EvaluationResult::String(s) => Value::String(s),
            EvaluationResult::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            EvaluationResult::Bool(b) => Value::Bool(b),
            EvaluationResult::Null => Value::Null,
            EvaluationResult::Object(v) => v,
        }
    }
}

/// A page target created inside the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHandle {
    /// Target ID
    pub target_id: String,
    /// Isolated browser context, if the target was created in one
    pub browser_context_id: Option<String>,
    /// WebSocket URL for a page-level connection
    pub ws_url: String,
}

/// CDP browser trait
///
/// Controls browser-level operations via CDP.
#[async_trait]
pub trait CdpBrowser: Send + Sync + std::fmt::Debug {
    /// Create a new page target, optionally inside a fresh browser context
    async fn create_target(&self, isolated: bool) -> Result<TargetHandle, crate::Error>;

    /// Close a page target and dispose its browser context
    async fn close_target(&self, target: &TargetHandle) -> Result<(), crate::Error>;

    /// Create a new CDP client connected to a page target
    async fn create_client(&self, target: &TargetHandle) -> Result<Arc<dyn CdpClient>, crate::Error>;

    /// Get browser version
    async fn get_version(&self) -> Result<VersionInfo, crate::Error>;

    /// Disconnect from the browser
    async fn close(&self) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: &str) -> CdpEvent {
        CdpEvent {
            method: method.to_string(),
            params: Value::Null,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn test_event_receiver_filters_by_method_and_domain() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut receiver = EventReceiver::new(rx, &["Page.loadEventFired", "Network."]);

        tx.send(event("Runtime.consoleAPICalled")).unwrap();
        tx.send(event("Network.requestWillBeSent")).unwrap();
        tx.send(event("Page.frameNavigated")).unwrap();
        tx.send(event("Page.loadEventFired")).unwrap();
        drop(tx);

        assert_eq!(receiver.recv().await.unwrap().method, "Network.requestWillBeSent");
        assert_eq!(receiver.try_recv().unwrap().method, "Page.loadEventFired");
        assert!(receiver.try_recv().is_none());
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_evaluation_result_into_value() {
        assert_eq!(EvaluationResult::Bool(true).into_value(), Value::Bool(true));
        assert_eq!(EvaluationResult::Number(f64::NAN).into_value(), Value::Null);
        assert_eq!(
            EvaluationResult::String("१".to_string()).into_value(),
            Value::String("१".to_string())
        );
    }
}
