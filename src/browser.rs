use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cookie_loader::CookieRecord;
use crate::proxy_loader::ProxyEndpoint;

// How often bounded DOM waits re-check the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no Chrome/Chromium executable found; install one or set CHROME")]
    NoBrowserFound,
    #[error("browser launch failed: {0}")]
    LaunchFailed(String),
    #[error("browser launch timed out after {0} seconds")]
    LaunchTimeout(u64),
    #[error("navigation failed: {0}")]
    NavigationFailed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub headless: bool,
    pub proxy: Option<ProxyEndpoint>,
    pub window_width: u32,
    pub window_height: u32,
    pub launch_timeout_secs: u64,
    pub close_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            headless: false,
            proxy: None,
            window_width: 1920,
            window_height: 1080,
            launch_timeout_secs: 30,
            close_timeout_secs: 10,
        }
    }
}

/// Locates a Chrome/Chromium executable; the `CHROME` env var overrides the scan.
pub fn find_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates = [
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/opt/google/chrome/chrome",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Windows
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files\Chromium\Application\chrome.exe",
    ];
    if let Some(found) = candidates.iter().map(PathBuf::from).find(|path| path.exists()) {
        return Some(found);
    }

    // Per-user Chrome installs on Windows live under LOCALAPPDATA.
    #[cfg(target_os = "windows")]
    {
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            let path = PathBuf::from(local).join(r"Google\Chrome\Application\chrome.exe");
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}

/// The slice of browser behavior the classifier, scraper, and per-file flow
/// need. Production uses the CDP-backed [`BrowserSession`]; tests script a
/// fake against the same seam.
#[async_trait]
pub trait PageProbe: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn refresh(&self) -> Result<(), BrowserError>;

    /// Injects cookies into the browser. Individual rejects are logged and
    /// skipped; a readable file never fails as a whole here.
    async fn inject_cookies(&self, cookies: &[CookieRecord]);

    /// True if any element of `tag` has text containing `needle`.
    async fn tag_text_present(&self, tag: &str, needle: &str) -> bool;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool;

    /// Waits up to `timeout` for `selector` and returns its inner text.
    /// A zero timeout is a single immediate lookup.
    async fn selector_text(&self, selector: &str, timeout: Duration) -> Option<String>;

    async fn current_url(&self) -> String;

    /// Best-effort screenshot; false when it could not be written.
    async fn save_screenshot(&self, path: &Path) -> bool;
}

/// One live Chrome instance bound to a single cookie file's check.
pub struct BrowserSession {
    label: String,
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    close_timeout: Duration,
}

impl BrowserSession {
    /// Launches a fresh browser and opens a blank page. `label` tags this
    /// session's log lines.
    pub async fn launch(config: &SessionConfig, label: &str) -> Result<BrowserSession, BrowserError> {
        let chrome = find_chrome().ok_or(BrowserError::NoBrowserFound)?;
        debug!("[{}] Using browser at {:?}", label, chrome);

        // A unique profile directory per session avoids lock conflicts
        // between iterations.
        let profile_dir =
            std::env::temp_dir().join(format!("cookie-checker-{}", uuid::Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .no_sandbox()
            .user_data_dir(&profile_dir)
            .chrome_executable(&chrome);

        if let Some(proxy) = &config.proxy {
            info!("[{}] Using proxy {}:{}", label, proxy.host, proxy.port);
            builder = builder.arg(format!("--proxy-server={}", proxy.chrome_arg()));
        }
        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder.build().map_err(BrowserError::LaunchFailed)?;

        std::fs::create_dir_all(&profile_dir)
            .map_err(|e| BrowserError::LaunchFailed(format!("profile dir: {}", e)))?;

        let launch = tokio::time::timeout(
            Duration::from_secs(config.launch_timeout_secs),
            Browser::launch(browser_config),
        )
        .await;

        let (browser, mut handler) = match launch {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(BrowserError::LaunchFailed(e.to_string()));
            }
            Err(_) => {
                let _ = std::fs::remove_dir_all(&profile_dir);
                return Err(BrowserError::LaunchTimeout(config.launch_timeout_secs));
            }
        };

        // The handler drives the websocket; it has to keep running for the
        // whole session.
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let close_timeout = Duration::from_secs(config.close_timeout_secs);

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(browser, handler_task, &profile_dir, close_timeout, label).await;
                return Err(BrowserError::LaunchFailed(format!("could not open a page: {}", e)));
            }
        };

        info!("[{}] Browser session ready", label);

        Ok(BrowserSession {
            label: label.to_string(),
            browser,
            page,
            handler_task,
            profile_dir,
            close_timeout,
        })
    }

    /// Tears everything down; problems are logged, never returned.
    pub async fn close(self) {
        shutdown_browser(
            self.browser,
            self.handler_task,
            &self.profile_dir,
            self.close_timeout,
            &self.label,
        )
        .await;
    }
}

async fn shutdown_browser(
    mut browser: Browser,
    handler_task: JoinHandle<()>,
    profile_dir: &Path,
    close_timeout: Duration,
    label: &str,
) {
    // Close while the handler is still pumping, otherwise the close command
    // never gets an answer.
    match tokio::time::timeout(close_timeout, browser.close()).await {
        Ok(Ok(_)) => debug!("[{}] Browser closed", label),
        Ok(Err(e)) => warn!("[{}] Browser close failed: {}", label, e),
        Err(_) => warn!("[{}] Browser close timed out", label),
    }
    handler_task.abort();

    // Give Chrome a moment to let go of the profile directory.
    tokio::time::sleep(Duration::from_secs(1)).await;
    if let Err(e) = std::fs::remove_dir_all(profile_dir) {
        warn!("[{}] Could not remove profile dir {:?}: {}", label, profile_dir, e);
    }
}

fn cookie_param(record: &CookieRecord) -> Result<CookieParam, String> {
    let mut builder = CookieParam::builder()
        .name(record.name.as_str())
        .value(record.value.as_str())
        .domain(record.domain.as_str())
        .path(record.path.as_str())
        .secure(record.secure);
    if let Some(expiry) = record.expiry {
        builder = builder.expires(TimeSinceEpoch::new(expiry as f64));
    }
    builder.build()
}

#[async_trait]
impl PageProbe for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        self.page
            .reload()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))
    }

    async fn inject_cookies(&self, cookies: &[CookieRecord]) {
        for record in cookies {
            let cookie = match cookie_param(record) {
                Ok(cookie) => cookie,
                Err(e) => {
                    warn!("[{}] Skipping cookie {}: {}", self.label, record.name, e);
                    continue;
                }
            };

            if let Err(e) = self.page.execute(SetCookiesParams::new(vec![cookie])).await {
                warn!("[{}] Browser rejected cookie {}: {}", self.label, record.name, e);
            }
        }
        debug!("[{}] Injected {} cookies", self.label, cookies.len());
    }

    async fn tag_text_present(&self, tag: &str, needle: &str) -> bool {
        // json! gives us a safely quoted JS string literal.
        let needle_js = serde_json::json!(needle).to_string();
        let js = format!(
            "Array.from(document.querySelectorAll('{}')).some(el => (el.innerText || el.textContent || '').includes({}))",
            tag, needle_js
        );
        match self.page.evaluate(js).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(e) => {
                debug!("[{}] Text probe on <{}> failed: {}", self.label, tag, e);
                false
            }
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn selector_text(&self, selector: &str, timeout: Duration) -> Option<String> {
        let start = Instant::now();
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                match element.inner_text().await {
                    Ok(text) => return Some(text.unwrap_or_default().trim().to_string()),
                    Err(e) => {
                        debug!("[{}] Could not read text of {}: {}", self.label, selector, e);
                        return None;
                    }
                }
            }
            if start.elapsed() >= timeout {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&self) -> String {
        match self.page.url().await {
            Ok(Some(url)) => url,
            Ok(None) => String::new(),
            Err(e) => {
                debug!("[{}] Could not read current URL: {}", self.label, e);
                String::new()
            }
        }
    }

    async fn save_screenshot(&self, path: &Path) -> bool {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        match self.page.save_screenshot(params, path).await {
            Ok(_) => true,
            Err(e) => {
                debug!("[{}] Screenshot to {:?} failed: {}", self.label, path, e);
                false
            }
        }
    }
}
