//! CDP (Chrome DevTools Protocol) type definitions
//!
//! This module defines the core data structures for CDP communication.

use serde::{Deserialize, Serialize};

/// CDP JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Request ID
    pub id: u64,
    /// Method name (e.g., "Page.navigate")
    pub method: String,
    /// Method parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Session ID for multi-session targets
    #[serde(skip_serializing_if = "Option::is_none", rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC notification (event)
#[derive(Debug, Clone, Deserialize)]
pub struct CdpNotification {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    #[serde(default)]
    pub params: serde_json::Value,
    /// Session ID for multi-session targets
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct CdpRpcResponse {
    /// Response ID (matches request ID)
    pub id: u64,
    /// Response result
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error if any
    #[serde(default)]
    pub error: Option<CdpErrorDetail>,
}

/// CDP error detail
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorDetail {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Page navigation parameters
#[derive(Debug, Clone, Serialize)]
pub struct NavigateParams {
    /// URL to navigate to
    pub url: String,
    /// Referrer URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

/// Page.navigate result
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResponse {
    /// Frame that navigated
    #[serde(default)]
    pub frame_id: String,
    /// Loader of the new document; absent for same-document navigations
    #[serde(default)]
    pub loader_id: Option<String>,
    /// Network-level failure (e.g. net::ERR_CONNECTION_REFUSED)
    #[serde(default)]
    pub error_text: Option<String>,
}

/// JavaScript evaluation parameters
#[derive(Debug, Clone, Serialize)]
pub struct EvaluateParams {
    /// JavaScript expression to evaluate
    pub expression: String,
    /// Whether to await promise
    #[serde(skip_serializing_if = "Option::is_none", rename = "awaitPromise")]
    pub await_promise: Option<bool>,
    /// Whether to return as value
    #[serde(skip_serializing_if = "Option::is_none", rename = "returnByValue")]
    pub return_by_value: Option<bool>,
    /// Execution context ID
    #[serde(skip_serializing_if = "Option::is_none", rename = "contextId")]
    pub context_id: Option<i64>,
}

/// Remote object (result of JavaScript evaluation)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RemoteObject {
    /// Object type
    #[serde(default)]
    pub r#type: String,
    /// Object subtype
    #[serde(default)]
    pub subtype: Option<String>,
    /// Object value
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    /// Object description
    #[serde(default)]
    pub description: Option<String>,
    /// Unserializable value
    #[serde(rename = "unserializableValue", default)]
    pub unserializable_value: Option<String>,
}

/// Exception details
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    /// Exception ID
    #[serde(default)]
    pub exception_id: i32,
    /// Exception text
    #[serde(default)]
    pub text: Option<String>,
    /// Line number
    #[serde(default)]
    pub line_number: i32,
    /// Column number
    #[serde(default)]
    pub column_number: i32,
    /// Exception object
    #[serde(default)]
    pub exception: Option<RemoteObject>,
}

/// JavaScript evaluation response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    /// Evaluation result
    #[serde(default)]
    pub result: RemoteObject,
    /// Exception details if evaluation failed
    #[serde(default)]
    pub exception_details: Option<ExceptionDetails>,
}

impl ExceptionDetails {
    /// Best human-readable description of the exception
    pub fn describe(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .or_else(|| self.text.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// Input.dispatchMouseEvent parameters
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MouseEventParams {
    /// mouseMoved, mousePressed or mouseReleased
    pub r#type: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_count: Option<u32>,
}

impl MouseEventParams {
    pub fn moved(x: f64, y: f64) -> Self {
        Self {
            r#type: "mouseMoved".to_string(),
            x,
            y,
            button: None,
            click_count: None,
        }
    }

    pub fn pressed(x: f64, y: f64) -> Self {
        Self {
            r#type: "mousePressed".to_string(),
            x,
            y,
            button: Some("left".to_string()),
            click_count: Some(1),
        }
    }

    pub fn released(x: f64, y: f64) -> Self {
        Self {
            r#type: "mouseReleased".to_string(),
            x,
            y,
            button: Some("left".to_string()),
            click_count: Some(1),
        }
    }
}

/// Input.dispatchKeyEvent parameters
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KeyEventParams {
    /// keyDown, rawKeyDown or keyUp
    pub r#type: String,
    pub key: String,
    pub code: String,
    pub windows_virtual_key_code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub modifiers: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// Target.createTarget result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResponse {
    pub target_id: String,
}

/// Target.createBrowserContext result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrowserContextResponse {
    pub browser_context_id: String,
}

/// /json/version document
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VersionInfo {
    #[serde(rename = "Browser", default)]
    pub product: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    #[serde(rename = "V8-Version", default)]
    pub js_version: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_request_serialization() {
        let request = CdpRequest {
            id: 1,
            method: "Page.navigate".to_string(),
            params: Some(serde_json::json!({ "url": "http://localhost:8000/naamani/1/" })),
            session_id: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"Page.navigate\""));
        assert!(!json.contains("sessionId"));
    }

    #[test]
    fn test_navigate_response_with_error_text() {
        let response: NavigateResponse = serde_json::from_value(serde_json::json!({
            "frameId": "F1",
            "loaderId": "L1",
            "errorText": "net::ERR_CONNECTION_REFUSED"
        }))
        .unwrap();
        assert_eq!(response.loader_id.as_deref(), Some("L1"));
        assert_eq!(response.error_text.as_deref(), Some("net::ERR_CONNECTION_REFUSED"));
    }

    #[test]
    fn test_key_event_omits_empty_modifiers() {
        let params = KeyEventParams {
            r#type: "rawKeyDown".to_string(),
            key: "ArrowRight".to_string(),
            code: "ArrowRight".to_string(),
            windows_virtual_key_code: 39,
            text: None,
            modifiers: 0,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["windowsVirtualKeyCode"], 39);
        assert!(json.get("modifiers").is_none());
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_exception_details_description() {
        let response: EvaluateResponse = serde_json::from_value(serde_json::json!({
            "result": { "type": "object" },
            "exceptionDetails": {
                "exceptionId": 1,
                "text": "Uncaught",
                "lineNumber": 0,
                "columnNumber": 5,
                "exception": { "type": "object", "description": "SyntaxError: bad selector" }
            }
        }))
        .unwrap();
        let details = response.exception_details.unwrap();
        assert_eq!(details.describe(), "SyntaxError: bad selector");
    }
}
