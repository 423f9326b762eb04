//! Navigation driver
//!
//! `goto` waits for the main frame to commit the new document and fire its
//! load event; the status comes from the document's own network response.

use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use super::dom::DocumentField;
use super::wait::{poll_until, Probe};
use super::{Locator, Page};
use crate::cdp::EventReceiver;
use crate::{Error, Result};

const NAVIGATION_EVENTS: &[&str] = &[
    "Network.responseReceived",
    "Network.loadingFailed",
    "Page.frameNavigated",
    "Page.loadEventFired",
];

/// Outcome of a completed navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResponse {
    pub requested_url: String,
    /// URL after any redirects
    pub url: String,
    /// Status of the main document response; `None` for same-document
    /// navigations and history restores, which produce no response
    pub status: Option<u16>,
    pub elapsed: Duration,
}

impl NavigationResponse {
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |s| (200..300).contains(&s))
    }

    /// True when the final URL differs from the requested one
    pub fn redirected(&self) -> bool {
        self.url != self.requested_url
    }
}

/// Condition on a page URL
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Exact(String),
    Substring(String),
    /// Path wildcard: `**` crosses `/`, `*` and `?` do not, a leading `**/`
    /// may match nothing
    Glob { pattern: String, regex: Regex },
    Regex(Regex),
}

impl UrlPattern {
    pub fn exact(url: impl Into<String>) -> Self {
        UrlPattern::Exact(url.into())
    }

    pub fn substring(needle: impl Into<String>) -> Self {
        UrlPattern::Substring(needle.into())
    }

    pub fn glob(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern))
            .map_err(|e| Error::configuration(format!("Invalid URL glob {:?}: {}", pattern, e)))?;
        Ok(UrlPattern::Glob {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Unanchored regular expression, searched anywhere in the URL
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(UrlPattern::Regex)
            .map_err(|e| Error::configuration(format!("Invalid URL regex {:?}: {}", pattern, e)))
    }

    /// Wildcards make a glob, an absolute URL is exact, anything else is a substring
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.contains('*') {
            Self::glob(pattern)
        } else if pattern.contains("://") {
            Ok(Self::exact(pattern))
        } else {
            Ok(Self::substring(pattern))
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Exact(expected) => url == expected,
            UrlPattern::Substring(needle) => url.contains(needle.as_str()),
            UrlPattern::Glob { regex, .. } => regex.is_match(url),
            UrlPattern::Regex(regex) => regex.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(url) => write!(f, "url == {:?}", url),
            UrlPattern::Substring(needle) => write!(f, "url containing {:?}", needle),
            UrlPattern::Glob { pattern, .. } => write!(f, "url matching {}", pattern),
            UrlPattern::Regex(regex) => write!(f, "url matching /{}/", regex.as_str()),
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Progress of one document load, fed from navigation events
#[derive(Debug, Default)]
struct LoadTracker {
    /// Loader of the navigation we issued; `None` accepts the next main-frame commit
    expected: Option<String>,
    committed: Option<String>,
    statuses: HashMap<String, u16>,
}

impl LoadTracker {
    fn expecting(loader_id: Option<String>) -> Self {
        Self {
            expected: loader_id,
            ..Default::default()
        }
    }

    fn is_ours(&self, loader_id: &str) -> bool {
        match (&self.expected, &self.committed) {
            (Some(expected), _) => expected == loader_id,
            (None, Some(committed)) => committed == loader_id,
            (None, None) => true,
        }
    }

    /// Feed one event; returns the status once the load has completed
    fn observe(&mut self, method: &str, params: &Value) -> std::result::Result<Option<Option<u16>>, String> {
        match method {
            "Network.responseReceived" => {
                if params["type"] == "Document" {
                    if let (Some(loader), Some(status)) =
                        (params["loaderId"].as_str(), params["response"]["status"].as_f64())
                    {
                        self.statuses.insert(loader.to_string(), status as u16);
                    }
                }
            }
            "Network.loadingFailed" => {
                let request = params["requestId"].as_str().unwrap_or_default();
                if params["type"] == "Document" && self.is_ours(request) && params["canceled"] != true {
                    return Err(params["errorText"].as_str().unwrap_or("loading failed").to_string());
                }
            }
            "Page.frameNavigated" => {
                let frame = &params["frame"];
                if frame.get("parentId").map_or(true, Value::is_null) {
                    if let Some(loader) = frame["loaderId"].as_str() {
                        if self.expected.as_deref().map_or(true, |e| e == loader) {
                            self.committed = Some(loader.to_string());
                        }
                    }
                }
            }
            "Page.loadEventFired" => {
                if let Some(loader) = &self.committed {
                    return Ok(Some(self.statuses.get(loader).copied()));
                }
            }
            _ => {}
        }
        Ok(None)
    }
}

async fn wait_for_load(events: &mut EventReceiver, tracker: &mut LoadTracker) -> std::result::Result<Option<u16>, String> {
    while let Some(event) = events.recv().await {
        if let Some(status) = tracker.observe(&event.method, &event.params)? {
            return Ok(status);
        }
    }
    Err("connection closed during navigation".to_string())
}

impl Page {
    /// Navigate and wait for the load event of the new document
    #[instrument(skip(self), fields(page = %self.id))]
    pub async fn goto(&self, url: &str) -> Result<NavigationResponse> {
        let _guard = self.exclusive().await?;
        let started = Instant::now();
        let budget = self.deadline.remaining();
        if budget.is_zero() {
            return Err(Error::navigation(url, "case deadline already exhausted"));
        }

        // Subscribe first so no event of this navigation can be missed
        let mut events = self.client.subscribe_events(NAVIGATION_EVENTS).await?;
        let issued = tokio::time::timeout(budget, self.client.navigate(url))
            .await
            .map_err(|_| Error::navigation(url, format!("no reply within {}ms", budget.as_millis())))??;

        if let Some(reason) = issued.error_text.filter(|text| !text.is_empty()) {
            return Err(Error::navigation(url, reason));
        }

        let status = match issued.loader_id {
            // Same-document navigation: nothing to load
            None => None,
            Some(loader_id) => {
                let mut tracker = LoadTracker::expecting(Some(loader_id));
                let remaining = budget.saturating_sub(started.elapsed());
                tokio::time::timeout(remaining, wait_for_load(&mut events, &mut tracker))
                    .await
                    .map_err(|_| {
                        Error::navigation(url, format!("load did not complete within {}ms", budget.as_millis()))
                    })?
                    .map_err(|reason| Error::navigation(url, reason))?
            }
        };

        let final_url = self.document_unlocked(DocumentField::Url).await?;
        debug!("Loaded {} (status {:?})", final_url, status);

        Ok(NavigationResponse {
            requested_url: url.to_string(),
            url: final_url,
            status,
            elapsed: started.elapsed(),
        })
    }

    /// `goto` that also rejects non-2xx document responses
    pub async fn goto_ok(&self, url: &str) -> Result<NavigationResponse> {
        let response = self.goto(url).await?;
        if !response.is_success() {
            return Err(Error::navigation(
                url,
                format!("status {}", response.status.unwrap_or_default()),
            ));
        }
        Ok(response)
    }

    /// Reload the current document and wait for its load event
    pub async fn reload(&self) -> Result<NavigationResponse> {
        let _guard = self.exclusive().await?;
        let started = Instant::now();
        let requested = self.document_unlocked(DocumentField::Url).await?;
        let budget = self.deadline.remaining();

        let mut events = self.client.subscribe_events(NAVIGATION_EVENTS).await?;
        self.client.call_method("Page.reload", json!({})).await?;

        let mut tracker = LoadTracker::expecting(None);
        let status = tokio::time::timeout(budget, wait_for_load(&mut events, &mut tracker))
            .await
            .map_err(|_| Error::navigation(&requested, format!("reload did not complete within {}ms", budget.as_millis())))?
            .map_err(|reason| Error::navigation(&requested, reason))?;

        let url = self.document_unlocked(DocumentField::Url).await?;
        Ok(NavigationResponse {
            requested_url: requested,
            url,
            status,
            elapsed: started.elapsed(),
        })
    }

    /// Step back one history entry
    pub async fn go_back(&self) -> Result<NavigationResponse> {
        let started = Instant::now();
        let entry_url = {
            let _guard = self.exclusive().await?;
            let history = self
                .client
                .call_method("Page.getNavigationHistory", json!({}))
                .await?;
            let current = history["currentIndex"].as_u64().unwrap_or(0) as usize;
            if current == 0 {
                return Err(Error::navigation("history", "no previous entry"));
            }
            let entry = &history["entries"][current - 1];
            let entry_id = entry["id"]
                .as_i64()
                .ok_or_else(|| Error::cdp("Page.getNavigationHistory: entry without id"))?;
            self.client
                .call_method("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
                .await?;
            entry["url"].as_str().unwrap_or_default().to_string()
        };

        // History restores may come from the back/forward cache without a load event
        let pattern = UrlPattern::exact(&entry_url);
        let url = self.wait_for_url(&pattern, self.deadline.remaining()).await?;
        Ok(NavigationResponse {
            requested_url: entry_url,
            url,
            status: None,
            elapsed: started.elapsed(),
        })
    }

    pub async fn title(&self) -> Result<String> {
        let _guard = self.exclusive().await?;
        self.document_unlocked(DocumentField::Title).await
    }

    pub async fn url(&self) -> Result<String> {
        let _guard = self.exclusive().await?;
        self.document_unlocked(DocumentField::Url).await
    }

    /// Block until the current URL satisfies `pattern`; returns that URL
    #[instrument(skip(self, pattern), fields(page = %self.id, pattern = %pattern))]
    pub async fn wait_for_url(&self, pattern: &UrlPattern, timeout: Duration) -> Result<String> {
        let timeout = self.deadline.clamp(timeout);
        poll_until(&pattern.to_string(), timeout, self.poll_interval(), move || async move {
            let url = self.url().await?;
            if pattern.matches(&url) {
                Ok(Probe::Ready(url))
            } else {
                Ok(Probe::Pending(Some(url)))
            }
        })
        .await
    }

    /// Block until at least one element matches `selector`
    #[instrument(skip(self), fields(page = %self.id))]
    pub async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Locator<'_>> {
        let locator = self.locator(selector);
        locator.wait_for(timeout).await?;
        Ok(locator)
    }

    pub(crate) async fn document_unlocked(&self, field: DocumentField) -> Result<String> {
        let reply = self.dom_unlocked(super::dom::DomOp::Document { field }, None).await?;
        Ok(reply.value.as_str().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_patterns() {
        let pattern = UrlPattern::glob("**/naamani/1/**").unwrap();
        assert!(pattern.matches("http://localhost:8000/naamani/1/"));
        assert!(pattern.matches("http://localhost:8000/naamani/1/#top"));
        assert!(!pattern.matches("http://localhost:8000/naamani/10/"));

        let pattern = UrlPattern::glob("**/naamani/*/").unwrap();
        assert!(pattern.matches("http://localhost:8000/naamani/500/"));
        assert!(!pattern.matches("http://localhost:8000/naamani/500/extra/"));

        let pattern = UrlPattern::glob("http://host/page?.html").unwrap();
        assert!(pattern.matches("http://host/page1.html"));
        assert!(!pattern.matches("http://host/page/.html"));
    }

    #[test]
    fn test_regex_is_unanchored() {
        let pattern = UrlPattern::regex(r"/naamani/?$").unwrap();
        assert!(pattern.matches("http://localhost:8000/naamani/"));
        assert!(pattern.matches("http://localhost:8000/naamani"));
        assert!(!pattern.matches("http://localhost:8000/naamani/3/"));
        assert!(UrlPattern::regex("(").is_err());
    }

    #[test]
    fn test_parse_picks_variant() {
        assert!(matches!(UrlPattern::parse("**/naamani/**").unwrap(), UrlPattern::Glob { .. }));
        assert!(matches!(UrlPattern::parse("http://localhost:8000/").unwrap(), UrlPattern::Exact(_)));
        assert!(matches!(UrlPattern::parse("/naamani/").unwrap(), UrlPattern::Substring(_)));
    }

    #[test]
    fn test_load_tracker_waits_for_commit_of_own_loader() {
        let mut tracker = LoadTracker::expecting(Some("L2".to_string()));

        // Stale load event from the previous document
        assert_eq!(tracker.observe("Page.loadEventFired", &json!({})).unwrap(), None);

        let response = json!({ "type": "Document", "loaderId": "L2", "response": { "status": 200 } });
        assert_eq!(tracker.observe("Network.responseReceived", &response).unwrap(), None);
        let sub = json!({ "frame": { "id": "child", "parentId": "main", "loaderId": "L9" } });
        assert_eq!(tracker.observe("Page.frameNavigated", &sub).unwrap(), None);
        let main = json!({ "frame": { "id": "main", "loaderId": "L2" } });
        assert_eq!(tracker.observe("Page.frameNavigated", &main).unwrap(), None);
        assert_eq!(tracker.observe("Page.loadEventFired", &json!({})).unwrap(), Some(Some(200)));
    }

    #[test]
    fn test_load_tracker_reports_failures() {
        let mut tracker = LoadTracker::expecting(Some("L1".to_string()));
        let failed = json!({ "requestId": "L1", "type": "Document", "errorText": "net::ERR_CONNECTION_REFUSED" });
        assert_eq!(
            tracker.observe("Network.loadingFailed", &failed).unwrap_err(),
            "net::ERR_CONNECTION_REFUSED"
        );

        let mut reload = LoadTracker::expecting(None);
        let main = json!({ "frame": { "id": "main", "loaderId": "R1" } });
        reload.observe("Page.frameNavigated", &main).unwrap();
        assert_eq!(reload.observe("Page.loadEventFired", &json!({})).unwrap(), Some(None));
    }

    #[test]
    fn test_navigation_response_success() {
        let mut response = NavigationResponse {
            requested_url: "http://localhost:8000/".to_string(),
            url: "http://localhost:8000/".to_string(),
            status: Some(200),
            elapsed: Duration::from_millis(5),
        };
        assert!(response.is_success());
        assert!(!response.redirected());
        response.status = Some(404);
        assert!(!response.is_success());
        response.status = None;
        assert!(response.is_success());
    }
}
