//! Unified error types for the harness

use std::time::Duration;
use thiserror::Error;

use crate::expect::AssertionFailure;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    /// Browser executable could not be started or attached to
    #[error("Launch error: {0}")]
    Launch(String),

    /// Session used before start or after stop
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// Navigation failed, timed out or returned a rejected status
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A bounded wait ran out
    #[error("Timed out after {}ms waiting for {}{}", .elapsed.as_millis(), .what, last_observed_suffix(.last_observed))]
    Timeout {
        what: String,
        elapsed: Duration,
        last_observed: Option<String>,
    },

    /// Locator resolved to zero elements where one was required
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    /// Element is hidden, disabled, detached or covered at interaction time
    #[error("Element not interactable: {selector} ({reason})")]
    ElementNotInteractable { selector: String, reason: String },

    /// Expectation violated
    #[error("{0}")]
    Assertion(Box<AssertionFailure>),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    ScriptExecutionFailed(String),

    /// HTTP errors (DevTools discovery, edit server)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn last_observed_suffix(last: &Option<String>) -> String {
    match last {
        Some(value) => format!(" (last observed: {})", value),
        None => String::new(),
    }
}

impl Error {
    /// Create a new launch error
    pub fn launch<S: Into<String>>(msg: S) -> Self {
        Error::Launch(msg.into())
    }

    /// Create a new session closed error
    pub fn session_closed<S: Into<String>>(msg: S) -> Self {
        Error::SessionClosed(msg.into())
    }

    /// Create a new navigation error
    pub fn navigation<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Error::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(what: S, elapsed: Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            elapsed,
            last_observed: None,
        }
    }

    /// Create a new timeout error carrying the last value seen while polling
    pub fn timeout_with_last<S: Into<String>>(what: S, elapsed: Duration, last: Option<String>) -> Self {
        Error::Timeout {
            what: what.into(),
            elapsed,
            last_observed: last,
        }
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(selector: S) -> Self {
        Error::ElementNotFound {
            selector: selector.into(),
        }
    }

    /// Create a new element not interactable error
    pub fn not_interactable<S: Into<String>, R: Into<String>>(selector: S, reason: R) -> Self {
        Error::ElementNotInteractable {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new script execution failed error
    pub fn script_execution_failed<S: Into<String>>(msg: S) -> Self {
        Error::ScriptExecutionFailed(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Session lifecycle errors abort the whole run; everything else fails one case.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Launch(_) | Error::SessionClosed(_))
    }

    /// Stable name of the variant, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Launch(_) => "launch",
            Error::SessionClosed(_) => "session_closed",
            Error::Navigation { .. } => "navigation",
            Error::Timeout { .. } => "timeout",
            Error::ElementNotFound { .. } => "element_not_found",
            Error::ElementNotInteractable { .. } => "element_not_interactable",
            Error::Assertion(_) => "assertion",
            Error::WebSocket(_) => "websocket",
            Error::Cdp(_) => "cdp",
            Error::ScriptExecutionFailed(_) => "script_execution_failed",
            Error::Http(_) => "http",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
            Error::Configuration(_) => "configuration",
            Error::Internal(_) => "internal",
        }
    }

    /// Selector context, when the error carries one
    pub fn selector(&self) -> Option<&str> {
        match self {
            Error::ElementNotFound { selector } | Error::ElementNotInteractable { selector, .. } => {
                Some(selector)
            }
            Error::Assertion(failure) => Some(&failure.context),
            _ => None,
        }
    }
}

impl From<AssertionFailure> for Error {
    fn from(failure: AssertionFailure) -> Self {
        Error::Assertion(Box::new(failure))
    }
}
