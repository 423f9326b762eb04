//! CDP WebSocket connection implementation
//!
//! This module provides WebSocket-based connection to Chrome DevTools Protocol.
//! The socket is split: writers share the sink behind a mutex while a single
//! reader task owns the stream and routes every frame in arrival order.

use super::traits::{CdpConnection, CdpError as CdpErrorResponse, CdpEvent, CdpResponse};
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;
type Subscribers = Arc<Mutex<Vec<UnboundedSender<CdpEvent>>>>;

/// CDP timeout configuration
#[derive(Debug, Clone)]
pub struct CdpTimeoutConfig {
    /// Default timeout for most commands
    pub default_timeout: Duration,
    /// Timeout for screenshot commands
    pub screenshot_timeout: Duration,
    /// Timeout for page navigation commands
    pub navigation_timeout: Duration,
    /// Timeout for JavaScript execution
    pub execution_timeout: Duration,
}

impl Default for CdpTimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            screenshot_timeout: Duration::from_secs(60),
            navigation_timeout: Duration::from_secs(60),
            execution_timeout: Duration::from_secs(30),
        }
    }
}

impl CdpTimeoutConfig {
    /// Get timeout duration for a specific command method
    pub fn timeout_for(&self, method: &str) -> Duration {
        match method {
            "Page.captureScreenshot" => self.screenshot_timeout,
            "Page.navigate" | "Page.reload" | "Page.navigateToHistoryEntry" => {
                self.navigation_timeout
            }
            "Runtime.evaluate" | "Runtime.callFunctionOn" => self.execution_timeout,
            _ => self.default_timeout,
        }
    }
}

/// WebSocket connection state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ConnectionState {
    Connected,
    Disconnected,
    Closed,
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
#[derive(Debug)]
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Write half of the socket
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    /// Connection state
    state: RwLock<ConnectionState>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending_commands: PendingMap,
    /// Event subscribers
    event_subscribers: Subscribers,
    /// Cleared by the reader task when the socket goes away
    is_active: Arc<AtomicBool>,
    /// Timeout configuration
    timeout_config: CdpTimeoutConfig,
}

impl CdpWebSocketConnection {
    /// Create a new CDP WebSocket connection
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn new<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        Self::with_timeouts(url, CdpTimeoutConfig::default()).await
    }

    /// Connect with explicit per-command timeouts
    pub async fn with_timeouts<S: Into<String>>(
        url: S,
        timeout_config: CdpTimeoutConfig,
    ) -> Result<Arc<Self>, Error> {
        let url = url.into();
        debug!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(&url)
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;
        let (sink, stream) = ws_stream.split();

        let connection = Arc::new(Self {
            url,
            sink: Mutex::new(Some(sink)),
            state: RwLock::new(ConnectionState::Connected),
            next_id: AtomicU64::new(1),
            pending_commands: Arc::new(Mutex::new(HashMap::new())),
            event_subscribers: Arc::new(Mutex::new(Vec::new())),
            is_active: Arc::new(AtomicBool::new(true)),
            timeout_config,
        });

        tokio::spawn(Self::read_loop(
            stream,
            Arc::clone(&connection.pending_commands),
            Arc::clone(&connection.event_subscribers),
            Arc::clone(&connection.is_active),
        ));

        info!("CDP connection established to {}", connection.url);
        Ok(connection)
    }

    /// Reader task: owns the stream until the socket closes
    async fn read_loop(
        mut stream: SplitStream<WsStream>,
        pending_commands: PendingMap,
        event_subscribers: Subscribers,
        is_active: Arc<AtomicBool>,
    ) {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    dispatch_message(&text, &pending_commands, &event_subscribers).await;
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket close frame received");
                    break;
                }
                // tungstenite answers pings on the next write
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket read failed: {}", e);
                    break;
                }
            }
        }

        is_active.store(false, Ordering::SeqCst);

        // Dropping the senders wakes every waiter with a closed-channel error
        let abandoned = {
            let mut pending = pending_commands.lock().await;
            pending.drain().count()
        };
        if abandoned > 0 {
            warn!("Connection closed with {} commands in flight", abandoned);
        }
        event_subscribers.lock().await.clear();
        debug!("CDP reader task exited");
    }

    async fn send_message(&self, message: Message) -> Result<(), Error> {
        let mut sink_guard = self.sink.lock().await;
        let sink = sink_guard
            .as_mut()
            .ok_or_else(|| Error::websocket("WebSocket sink not available"))?;

        sink.send(message)
            .await
            .map_err(|e| Error::websocket(format!("Failed to send message: {}", e)))
    }

    /// Number of live event subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.event_subscribers.lock().await.len()
    }
}

/// Route one text frame to its waiter or to the event subscribers
async fn dispatch_message(text: &str, pending_commands: &PendingMap, event_subscribers: &Subscribers) {
    trace!("Received message: {}", text);

    // Responses carry an id, events never do
    if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
        let pending_cmd = pending_commands.lock().await.remove(&response.id);
        match pending_cmd {
            Some(pending_cmd) => {
                debug!("Response for command {}: {}", response.id, pending_cmd.method);
                let cdp_response = CdpResponse {
                    id: response.id,
                    result: Some(response.result),
                    error: response.error.map(|e| CdpErrorResponse {
                        code: e.code,
                        message: e.message,
                        data: e.data,
                    }),
                };
                let _ = pending_cmd.sender.send(cdp_response);
            }
            None => warn!("Received response for unknown command ID: {}", response.id),
        }
        return;
    }

    if let Ok(notification) = serde_json::from_str::<CdpNotification>(text) {
        let event = CdpEvent {
            method: notification.method,
            params: notification.params,
            session_id: notification.session_id,
        };
        let mut subscribers = event_subscribers.lock().await;
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        return;
    }

    warn!("Unknown message format: {}", text);
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket(format!(
                "Connection to {} is not active",
                self.url
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id: None,
        };
        let json = serde_json::to_string(&request)?;

        debug!("Sending CDP command {}: {}", id, method);

        let (sender, receiver) = oneshot::channel();
        self.pending_commands.lock().await.insert(
            id,
            PendingCommand {
                sender,
                method: method.to_string(),
            },
        );

        if let Err(e) = self.send_message(Message::Text(json)).await {
            self.pending_commands.lock().await.remove(&id);
            return Err(e);
        }

        let timeout_duration = self.timeout_config.timeout_for(method);
        match tokio::time::timeout(timeout_duration, receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = &response.error {
                    return Err(Error::cdp(format!(
                        "{}: {} (code: {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response)
            }
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Connection closed before response to {}",
                method
            ))),
            Err(_) => {
                self.pending_commands.lock().await.remove(&id);
                Err(Error::timeout(
                    format!("response to {}", method),
                    timeout_duration,
                ))
            }
        }
    }

    async fn listen_events(&self) -> Result<UnboundedReceiver<CdpEvent>, Error> {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        if self.is_active.load(Ordering::SeqCst) {
            self.event_subscribers.lock().await.push(sender);
        }
        Ok(receiver)
    }

    async fn close(&self) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Closed {
                return Ok(());
            }
            *state = ConnectionState::Closed;
        }
        debug!("Closing CDP WebSocket connection to {}", self.url);

        self.is_active.store(false, Ordering::SeqCst);
        self.event_subscribers.lock().await.clear();

        let mut sink_guard = self.sink.lock().await;
        if let Some(mut sink) = sink_guard.take() {
            // The browser may already have dropped its side
            if let Err(e) = sink.close().await {
                debug!("WebSocket close returned: {}", e);
            }
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}

impl Drop for CdpWebSocketConnection {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_write() {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Disconnected;
            }
        }
        self.is_active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_for_command() {
        let config = CdpTimeoutConfig::default();
        assert_eq!(config.timeout_for("Page.captureScreenshot"), Duration::from_secs(60));
        assert_eq!(config.timeout_for("Page.navigate"), Duration::from_secs(60));
        assert_eq!(config.timeout_for("Runtime.evaluate"), Duration::from_secs(30));
        assert_eq!(config.timeout_for("DOM.enable"), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_dispatch_routes_responses_and_events() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));

        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(
            7,
            PendingCommand {
                sender: tx,
                method: "Runtime.evaluate".to_string(),
            },
        );
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        subscribers.lock().await.push(event_tx);

        dispatch_message(
            r#"{"method":"Page.loadEventFired","params":{"timestamp":1.5}}"#,
            &pending,
            &subscribers,
        )
        .await;
        dispatch_message(r#"{"id":7,"result":{"value":1}}"#, &pending, &subscribers).await;

        let response = rx.await.unwrap();
        assert_eq!(response.id, 7);
        assert!(response.error.is_none());
        // The event was queued before the response was delivered
        let event = event_rx.try_recv().unwrap();
        assert_eq!(event.method, "Page.loadEventFired");
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_drops_dead_subscribers() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        subscribers.lock().await.push(event_tx);
        drop(event_rx);

        dispatch_message(r#"{"method":"Network.requestWillBeSent","params":{}}"#, &pending, &subscribers).await;
        assert!(subscribers.lock().await.is_empty());
    }
}
