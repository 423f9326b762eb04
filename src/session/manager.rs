//! Session manager implementation
//!
//! One browser process per run; pages are created and destroyed concurrently
//! against it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cdp::types::VersionInfo;
use crate::cdp::CdpBrowser;
use crate::config::Config;
use crate::page::Page;
use crate::session::launcher::{BrowserLauncher, ChromeLauncher, ChromeProcess};
use crate::{Error, Result};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Running,
    Closed,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    browser: Option<Arc<dyn CdpBrowser>>,
    process: Option<ChromeProcess>,
}

/// Owns the browser for the duration of a run
#[derive(Debug)]
pub struct Session {
    config: Arc<Config>,
    launcher: Arc<dyn BrowserLauncher>,
    inner: Mutex<SessionInner>,
    /// Shared with every page so they can tell the session went away
    alive: Arc<AtomicBool>,
}

impl Session {
    /// Create a session that launches (or attaches to) Chrome per `config`
    pub fn new(config: Config) -> Self {
        let launcher = Arc::new(ChromeLauncher::new(config.clone()));
        Self::with_launcher(config, launcher)
    }

    /// Create a session with a custom launcher
    pub fn with_launcher(config: Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            config: Arc::new(config),
            launcher,
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                browser: None,
                process: None,
            }),
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Launch the browser. Calling it on a running session is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Running => return Ok(()),
            SessionState::Closed => {
                return Err(Error::session_closed("Session was stopped and cannot be restarted"))
            }
            SessionState::Uninitialized => {}
        }

        let launched = self.launcher.launch().await?;
        if let Ok(version) = launched.browser.get_version().await {
            info!("Browser started: {}", version.product);
        }

        inner.browser = Some(launched.browser);
        inner.process = launched.process;
        inner.state = SessionState::Running;
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Terminate the browser and release its resources. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Closed {
            return Ok(());
        }
        inner.state = SessionState::Closed;
        self.alive.store(false, Ordering::SeqCst);

        if let Some(browser) = inner.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser disconnect failed: {}", e);
            }
        }

        if let Some(process) = inner.process.take() {
            process.shutdown().await?;
        }

        info!("Session stopped");
        Ok(())
    }

    /// Open a fresh page in its own browser context
    pub async fn new_page(&self) -> Result<Page> {
        let browser = {
            let inner = self.inner.lock().await;
            match (inner.state, &inner.browser) {
                (SessionState::Running, Some(browser)) => Arc::clone(browser),
                (SessionState::Uninitialized, _) => {
                    return Err(Error::session_closed("Session has not been started"))
                }
                _ => return Err(Error::session_closed("Session has been stopped")),
            }
        };

        let page = Page::open(browser, Arc::clone(&self.config), Arc::clone(&self.alive)).await?;
        debug!("Opened page {}", page.id());
        Ok(page)
    }

    /// Browser version, while running
    pub async fn version(&self) -> Result<VersionInfo> {
        let browser = self
            .inner
            .lock()
            .await
            .browser
            .clone()
            .ok_or_else(|| Error::session_closed("Session is not running"))?;
        browser.get_version().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The child process is kill_on_drop; only the flag needs clearing here
        self.alive.store(false, Ordering::SeqCst);
    }
}
