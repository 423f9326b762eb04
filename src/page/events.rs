//! Page event subscription
//!
//! A subscription borrows its [`Page`], so it cannot outlive it. Events are
//! buffered by the connection and only inspected when the test case asks.

use serde_json::Value;
use std::time::Duration;
use tracing::trace;

use super::Page;
use crate::cdp::{CdpEvent, EventReceiver};
use crate::{Error, Result};

const PAGE_EVENTS: &[&str] = &[
    "Runtime.consoleAPICalled",
    "Runtime.exceptionThrown",
    "Network.requestWillBeSent",
    "Network.responseReceived",
];

/// Console and network activity of one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Console { level: String, text: String },
    Request { url: String, method: String, resource_type: String },
    Response { url: String, status: u16, mime_type: String },
}

impl PageEvent {
    fn from_cdp(event: &CdpEvent) -> Option<Self> {
        let params = &event.params;
        match event.method.as_str() {
            "Runtime.consoleAPICalled" => {
                let text = params["args"]
                    .as_array()
                    .map(|args| args.iter().map(console_arg).collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();
                Some(PageEvent::Console {
                    level: params["type"].as_str().unwrap_or("log").to_string(),
                    text,
                })
            }
            "Runtime.exceptionThrown" => {
                let details = &params["exceptionDetails"];
                let text = details["exception"]["description"]
                    .as_str()
                    .or_else(|| details["text"].as_str())
                    .unwrap_or("Uncaught exception");
                Some(PageEvent::Console {
                    level: "error".to_string(),
                    text: text.to_string(),
                })
            }
            "Network.requestWillBeSent" => Some(PageEvent::Request {
                url: params["request"]["url"].as_str()?.to_string(),
                method: params["request"]["method"].as_str().unwrap_or("GET").to_string(),
                resource_type: params["type"].as_str().unwrap_or("Other").to_string(),
            }),
            "Network.responseReceived" => Some(PageEvent::Response {
                url: params["response"]["url"].as_str()?.to_string(),
                status: params["response"]["status"].as_f64()? as u16,
                mime_type: params["response"]["mimeType"].as_str().unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }
}

fn console_arg(arg: &Value) -> String {
    match &arg["value"] {
        Value::String(s) => s.clone(),
        Value::Null => arg["description"]
            .as_str()
            .or_else(|| arg["unserializableValue"].as_str())
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    }
}

/// Events of one page, inspected synchronously by the owning test case
#[derive(Debug)]
pub struct PageEventSubscription<'p> {
    page: &'p Page,
    receiver: EventReceiver,
    buffer: Vec<PageEvent>,
}

impl<'p> PageEventSubscription<'p> {
    /// Move everything the connection has delivered so far into the buffer
    fn pump(&mut self) {
        while let Some(event) = self.receiver.try_recv() {
            if let Some(event) = PageEvent::from_cdp(&event) {
                trace!("Page {} event: {:?}", self.page.id(), event);
                self.buffer.push(event);
            }
        }
    }

    /// Take all events received so far
    pub fn drain(&mut self) -> Vec<PageEvent> {
        self.pump();
        std::mem::take(&mut self.buffer)
    }

    /// Text of every console message received so far
    pub fn console_messages(&mut self) -> Vec<String> {
        self.pump();
        self.buffer
            .iter()
            .filter_map(|event| match event {
                PageEvent::Console { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// URLs of requests containing `needle`
    pub fn requests_matching(&mut self, needle: &str) -> Vec<String> {
        self.pump();
        self.buffer
            .iter()
            .filter_map(|event| match event {
                PageEvent::Request { url, .. } if url.contains(needle) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until a console message containing `needle` arrives
    pub async fn wait_for_console(&mut self, needle: &str, timeout: Duration) -> Result<String> {
        let timeout = self.page.deadline().clamp(timeout);
        let found = |messages: Vec<String>| messages.into_iter().find(|m| m.contains(needle));

        if let Some(message) = found(self.console_messages()) {
            return Ok(message);
        }

        let what = format!("console message containing {:?}", needle);
        let wait = async {
            while let Some(event) = self.receiver.recv().await {
                if let Some(event) = PageEvent::from_cdp(&event) {
                    let hit = matches!(&event, PageEvent::Console { text, .. } if text.contains(needle));
                    let text = match &event {
                        PageEvent::Console { text, .. } => Some(text.clone()),
                        _ => None,
                    };
                    self.buffer.push(event);
                    if hit {
                        return text;
                    }
                }
            }
            None
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(Error::session_closed("Page connection closed while waiting for events")),
            Err(_) => Err(Error::timeout(what, timeout)),
        }
    }
}

impl Page {
    /// Start collecting console and network events of this page
    pub async fn subscribe(&self) -> Result<PageEventSubscription<'_>> {
        self.ensure_alive()?;
        let receiver = self.client.subscribe_events(PAGE_EVENTS).await?;
        Ok(PageEventSubscription {
            page: self,
            receiver,
            buffer: Vec::new(),
        })
    }
}
