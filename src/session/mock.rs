//! Mock launcher for testing
//!
//! Hands out a [`MockCdpBrowser`] instead of starting Chrome, so sessions and
//! pages can be exercised against a scripted command handler.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::launcher::{BrowserLauncher, LaunchedBrowser};
use super::manager::Session;
use crate::cdp::{CdpBrowser, MockCdpBrowser};
use crate::config::Config;
use crate::{Error, Result};

/// Launcher backed by a mock browser
#[derive(Debug, Clone)]
pub struct MockLauncher {
    browser: MockCdpBrowser,
    launches: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::with_browser(MockCdpBrowser::new())
    }

    pub fn with_browser(browser: MockCdpBrowser) -> Self {
        Self {
            browser,
            launches: Arc::new(AtomicUsize::new(0)),
            failure: None,
        }
    }

    /// A launcher whose every launch fails like a missing executable
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::new()
        }
    }

    pub fn browser(&self) -> &MockCdpBrowser {
        &self.browser
    }

    /// Number of launch attempts so far
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl Default for MockLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<LaunchedBrowser> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.failure {
            return Err(Error::launch(reason.clone()));
        }
        Ok(LaunchedBrowser {
            browser: Arc::new(self.browser.clone()) as Arc<dyn CdpBrowser>,
            process: None,
        })
    }
}

impl Session {
    /// Session over a mock browser; the launcher is returned for inspection
    pub fn mock(config: Config, browser: MockCdpBrowser) -> (Self, MockLauncher) {
        let launcher = MockLauncher::with_browser(browser);
        let session = Session::with_launcher(config, Arc::new(launcher.clone()));
        (session, launcher)
    }
}
