//! Headless Chromium page fetcher.
//!
//! Renders the page, waits for client-side content to settle and returns
//! the live DOM serialized as HTML so it can be parsed like a plain fetch.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::{BrowserSettings, ScraperConfig};
use crate::error::ScrapeError;
use crate::fetcher::PageFetcher;

pub struct RenderedFetcher {
    settings: BrowserSettings,
    user_agent: String,
    /// Polled after navigation until present or the settle timeout passes.
    ready_selector: String,
}

impl RenderedFetcher {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            settings: config.browser.clone(),
            user_agent: config.user_agent.clone(),
            ready_selector: config.selectors.title.clone(),
        }
    }

    async fn render(&self, url: &str) -> Result<String> {
        let mut session = BrowserSession::launch(&self.settings, &self.user_agent).await?;
        let result = session.page_html(url, &self.ready_selector, self.settle_timeout()).await;
        session.close().await;
        result
    }

    fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.settle_timeout_ms)
    }
}

impl PageFetcher for RenderedFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime for browser")?;
        runtime.block_on(self.render(url))
    }

    fn name(&self) -> &'static str {
        "rendered"
    }
}

/// Running browser plus its CDP event-handler task.
///
/// `close` shuts Chromium down; if that never runs, `Drop` still aborts the
/// handler and `Browser`'s own drop kills the child process.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    closed: bool,
}

impl BrowserSession {
    async fn launch(settings: &BrowserSettings, user_agent: &str) -> Result<Self> {
        let executable = find_browser_executable(settings.executable.as_ref())?;
        info!("Launching browser: {}", executable.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .arg(format!("--user-agent={user_agent}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");
        if !settings.headless {
            builder = builder.with_head();
        }
        if should_disable_sandbox() {
            debug!("Detected containerized environment, disabling sandbox");
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to launch browser: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    // chromiumoxide doesn't know every CDP event Chrome sends.
                    if msg.contains("did not match any variant of untagged enum Message")
                        || msg.contains("Failed to deserialize WS response")
                    {
                        trace!("Ignored CDP message: {msg}");
                    } else {
                        error!("Browser handler error: {e:?}");
                    }
                }
            }
            debug!("Browser handler task completed");
        });

        Ok(Self {
            browser,
            handler,
            closed: false,
        })
    }

    async fn page_html(&self, url: &str, ready_selector: &str, settle: Duration) -> Result<String> {
        info!("Navigating to {url}");
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to open {url}: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Navigation to {url} failed: {e}")))?;

        if !wait_for_selector(&page, ready_selector, settle).await {
            warn!(
                "`{ready_selector}` did not appear within {}ms, using page as is",
                settle.as_millis()
            );
        }

        let html = page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("Failed to read page content: {e}")))?;
        Ok(html)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {e}");
        }
        self.handler.abort();
        info!("Browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Browser session dropped without close, aborting handler");
        }
        self.handler.abort();
    }
}

/// Polls for `selector` with backoff starting at 100ms, capped at 1s.
async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> bool {
    let start = Instant::now();
    let mut interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(max_interval);
    }
}

/// Configured path, then `CHROMIUM_PATH`, then well-known install locations.
fn find_browser_executable(configured: Option<&PathBuf>) -> Result<PathBuf, ScrapeError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.clone());
        }
        warn!("Configured browser executable does not exist: {}", path.display());
    }

    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to non-existent file: {}", path.display());
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
        ]
    };
    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    Err(ScrapeError::Browser(
        "Chrome/Chromium executable not found; set CHROMIUM_PATH or browser.executable".into(),
    ))
}

fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}
