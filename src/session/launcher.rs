//! Browser process launch and attach
//!
//! Chrome is started with `--remote-debugging-port=0` inside a throwaway
//! profile directory; the port it picks is read back from the
//! `DevToolsActivePort` file Chrome writes into that directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cdp::{CdpBrowser, CdpBrowserImpl};
use crate::config::Config;
use crate::{Error, Result};

/// Executable names tried on PATH, in order
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// A browser process owned by the session
#[derive(Debug)]
pub struct ChromeProcess {
    child: Child,
    // Removed on drop, after the child has been killed
    profile_dir: TempDir,
}

impl ChromeProcess {
    /// OS process id, if still running
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Profile directory used by this process
    pub fn profile_dir(&self) -> &Path {
        self.profile_dir.path()
    }

    /// Kill the process and wait for it to exit
    pub async fn shutdown(mut self) -> Result<()> {
        match self.child.try_wait()? {
            Some(status) => debug!("Chrome already exited with {}", status),
            None => {
                self.child.kill().await?;
                debug!("Chrome process killed");
            }
        }
        Ok(())
    }
}

/// Result of a launch: a browser-level CDP handle plus the process when we own one
#[derive(Debug)]
pub struct LaunchedBrowser {
    pub browser: Arc<dyn CdpBrowser>,
    pub process: Option<ChromeProcess>,
}

/// Starts (or attaches to) a browser for a session
#[async_trait]
pub trait BrowserLauncher: Send + Sync + std::fmt::Debug {
    async fn launch(&self) -> Result<LaunchedBrowser>;
}

/// Launches a local Chrome, or attaches when `cdp_endpoint` is configured
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Locate the Chrome executable
    pub fn find_chrome(configured: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = configured {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(Error::launch(format!(
                "Configured chrome_path {} does not exist",
                path.display()
            )));
        }

        if let Ok(path) = std::env::var("CHROME_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
            warn!("CHROME_PATH {} does not exist, searching PATH", path.display());
        }

        for name in CHROME_CANDIDATES {
            if let Ok(path) = which::which(name) {
                return Ok(path);
            }
        }

        known_install_paths()
            .into_iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| Error::launch("No Chrome or Chromium executable found"))
    }

    fn command(&self, chrome: &Path, profile_dir: &Path) -> Command {
        let mut cmd = Command::new(chrome);
        cmd.arg("--remote-debugging-port=0")
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-extensions")
            .arg("--mute-audio")
            .arg("--hide-scrollbars")
            .arg(format!(
                "--window-size={},{}",
                self.config.viewport_width, self.config.viewport_height
            ))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if self.config.headless {
            cmd.arg("--headless=new");
        }
        if self.config.no_sandbox {
            cmd.arg("--no-sandbox");
        }
        cmd.arg("about:blank");
        cmd
    }

    async fn spawn(&self) -> Result<LaunchedBrowser> {
        let chrome = Self::find_chrome(self.config.chrome_path.as_deref())?;
        let profile_dir = tempfile::Builder::new()
            .prefix("naamani-e2e-chrome-")
            .tempdir()
            .map_err(|e| Error::launch(format!("Failed to create profile directory: {}", e)))?;

        info!("Launching {}", chrome.display());
        let child = self
            .command(&chrome, profile_dir.path())
            .spawn()
            .map_err(|e| Error::launch(format!("Failed to start {}: {}", chrome.display(), e)))?;

        let mut process = ChromeProcess { child, profile_dir };
        debug!("Chrome started with PID {:?}", process.id());

        let endpoint = wait_for_devtools_endpoint(&mut process, self.config.launch_timeout()).await?;
        let browser = CdpBrowserImpl::connect(endpoint).await?;

        Ok(LaunchedBrowser {
            browser: Arc::new(browser),
            process: Some(process),
        })
    }

    async fn attach(&self, endpoint: &str) -> Result<LaunchedBrowser> {
        info!("Attaching to running browser at {}", endpoint);
        let ws_url = CdpBrowserImpl::resolve_endpoint(endpoint, self.config.launch_timeout()).await?;
        let browser = CdpBrowserImpl::connect(ws_url)
            .await
            .map_err(|e| Error::launch(format!("Failed to attach to {}: {}", endpoint, e)))?;

        Ok(LaunchedBrowser {
            browser: Arc::new(browser),
            process: None,
        })
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<LaunchedBrowser> {
        match &self.config.cdp_endpoint {
            Some(endpoint) => self.attach(endpoint).await,
            None => self.spawn().await,
        }
    }
}

/// Poll for `DevToolsActivePort`, failing fast if Chrome exits first
async fn wait_for_devtools_endpoint(process: &mut ChromeProcess, timeout: Duration) -> Result<String> {
    let port_file = process.profile_dir().join("DevToolsActivePort");
    let started = Instant::now();

    loop {
        if let Some(status) = process.child.try_wait()? {
            return Err(Error::launch(format!(
                "Chrome exited with {} before opening the DevTools port",
                status
            )));
        }

        if let Ok(contents) = tokio::fs::read_to_string(&port_file).await {
            if let Some(endpoint) = parse_devtools_active_port(&contents) {
                debug!("DevTools listening at {}", endpoint);
                return Ok(endpoint);
            }
        }

        if started.elapsed() >= timeout {
            return Err(Error::launch(format!(
                "Chrome did not open a DevTools port within {}ms",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// First line is the port, second the browser target path
fn parse_devtools_active_port(contents: &str) -> Option<String> {
    let mut lines = contents.lines();
    let port: u16 = lines.next()?.trim().parse().ok()?;
    let path = lines.next()?.trim();
    if port == 0 || !path.starts_with('/') {
        return None;
    }
    Some(format!("ws://127.0.0.1:{}{}", port, path))
}

fn known_install_paths() -> Vec<&'static str> {
    #[cfg(target_os = "macos")]
    {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devtools_active_port() {
        assert_eq!(
            parse_devtools_active_port("41235\n/devtools/browser/6c1f2d1e\n"),
            Some("ws://127.0.0.1:41235/devtools/browser/6c1f2d1e".to_string())
        );
        // Chrome writes the file in two steps; a partial file is not ready yet
        assert_eq!(parse_devtools_active_port("41235\n"), None);
        assert_eq!(parse_devtools_active_port(""), None);
        assert_eq!(parse_devtools_active_port("0\n/devtools/browser/x"), None);
    }

    #[test]
    fn test_missing_configured_path_is_launch_error() {
        let err = ChromeLauncher::find_chrome(Some(Path::new("/nonexistent/chrome-binary"))).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::Launch(_)));
    }

    #[tokio::test]
    async fn test_early_exit_is_launch_error() {
        // `false` exits immediately with status 1, standing in for a crashing browser
        let Ok(binary) = which::which("false") else {
            eprintln!("Skipping test: `false` not on PATH");
            return;
        };
        let profile_dir = tempfile::tempdir().unwrap();
        let child = Command::new(binary).kill_on_drop(true).spawn().unwrap();
        let mut process = ChromeProcess { child, profile_dir };

        let err = wait_for_devtools_endpoint(&mut process, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Launch(ref msg) if msg.contains("exited")));
    }
}
