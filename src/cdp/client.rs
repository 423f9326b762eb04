//! CDP client implementation
//!
//! This module provides a high-level CDP client with typed methods for common operations.

use super::traits::*;
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// CDP client implementation
#[derive(Debug, Clone)]
pub struct CdpClientImpl {
    /// Underlying CDP connection
    connection: Arc<dyn CdpConnection>,
}

impl CdpClientImpl {
    /// Create a new CDP client
    ///
    /// # Arguments
    /// * `connection` - CDP connection instance
    pub fn new(connection: Arc<dyn CdpConnection>) -> Self {
        Self { connection }
    }

    /// Parse remote object value to evaluation result
    fn parse_remote_object(obj: &RemoteObject) -> EvaluationResult {
        match obj.r#type.as_str() {
            "string" => EvaluationResult::String(
                obj.value
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
            "number" => match obj.value.as_ref().and_then(|v| v.as_f64()) {
                Some(n) => EvaluationResult::Number(n),
                // NaN, Infinity and -0 only arrive as unserializableValue
                None => match obj.unserializable_value.as_deref() {
                    Some("Infinity") => EvaluationResult::Number(f64::INFINITY),
                    Some("-Infinity") => EvaluationResult::Number(f64::NEG_INFINITY),
                    Some("-0") => EvaluationResult::Number(-0.0),
                    _ => EvaluationResult::Number(f64::NAN),
                },
            },
            "boolean" => EvaluationResult::Bool(
                obj.value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false),
            ),
            "object" if obj.subtype.as_deref() == Some("null") => EvaluationResult::Null,
            "object" | "function" | "bigint" | "symbol" => {
                EvaluationResult::Object(obj.value.clone().unwrap_or(Value::Null))
            }
            _ => EvaluationResult::Null,
        }
    }
}

#[async_trait]
impl CdpClient for CdpClientImpl {
    fn connection(&self) -> Arc<dyn CdpConnection> {
        Arc::clone(&self.connection)
    }

    async fn call_method(&self, method: &str, params: Value) -> Result<Value, Error> {
        trace!("Calling CDP method: {}", method);

        let response = self.connection.send_command(method, params).await?;

        response.result.ok_or_else(|| Error::cdp(format!("No result in {} response", method)))
    }

    async fn enable_domain(&self, domain: &str) -> Result<(), Error> {
        debug!("Enabling domain: {}", domain);
        self.call_method(&format!("{}.enable", domain), json!({})).await?;
        Ok(())
    }

    async fn subscribe_events(&self, methods: &[&str]) -> Result<EventReceiver, Error> {
        let receiver = self.connection.listen_events().await?;
        Ok(EventReceiver::new(receiver, methods))
    }

    async fn navigate(&self, url: &str) -> Result<NavigateResponse, Error> {
        debug!("Page.navigate {}", url);

        let params = NavigateParams {
            url: url.to_string(),
            referrer: None,
        };
        let result = self
            .call_method("Page.navigate", serde_json::to_value(params)?)
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    async fn evaluate(&self, script: &str, await_promise: bool) -> Result<EvaluationResult, Error> {
        trace!("Evaluating script: {}", script);

        let params = EvaluateParams {
            expression: script.to_string(),
            await_promise: Some(await_promise),
            return_by_value: Some(true),
            context_id: None,
        };
        let result = self
            .call_method("Runtime.evaluate", serde_json::to_value(params)?)
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse EvaluateResponse: {}", e)))?;

        if let Some(exception) = response.exception_details {
            return Err(Error::script_execution_failed(exception.describe()));
        }

        Ok(Self::parse_remote_object(&response.result))
    }

    async fn dispatch_mouse_event(&self, event: MouseEventParams) -> Result<(), Error> {
        self.call_method("Input.dispatchMouseEvent", serde_json::to_value(event)?)
            .await?;
        Ok(())
    }

    async fn dispatch_key_event(&self, event: KeyEventParams) -> Result<(), Error> {
        self.call_method("Input.dispatchKeyEvent", serde_json::to_value(event)?)
            .await?;
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), Error> {
        self.call_method("Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), Error> {
        debug!("Setting viewport to {}x{}", width, height);
        self.call_method(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, Error> {
        debug!("Capturing screenshot");

        let result = self
            .call_method("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No data in screenshot result"))?;

        BASE64
            .decode(data)
            .map_err(|e| Error::cdp(format!("Failed to decode screenshot: {}", e)))
    }
}
