use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{error, info};
use rand::seq::SliceRandom;

use crate::account;
use crate::browser::{BrowserError, BrowserSession, PageProbe, SessionConfig};
use crate::cookie_loader;
use crate::proxy_loader::{self, ProxyEndpoint};
use crate::recorder::OutcomeRecorder;

/// Result-log pair for a cookie file that could not be read.
pub const READ_ERROR: &str = "Lỗi đọc cookie";
/// Result-log pair for any other per-file failure.
pub const PROCESSING_ERROR: &str = "Lỗi xử lý";

// Visited before injection so the cookies land on the right origin.
const INITIAL_URL: &str = "https://www.spotify.com";

/// Paths and pacing for one run; `Default` is the production wiring.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub proxy_file: PathBuf,
    pub cookie_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    pub result_file: PathBuf,
    pub headless: bool,
    pub initial_settle: Duration,
    // Doubles as the settle after landing on the account page.
    pub page_settle: Duration,
    pub between_files: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            proxy_file: PathBuf::from("proxy.txt"),
            cookie_dir: PathBuf::from("cookies"),
            quarantine_dir: PathBuf::from("expired_cookies"),
            result_file: PathBuf::from("spotify_accounts.txt"),
            headless: false,
            initial_settle: Duration::from_secs(2),
            page_settle: Duration::from_secs(3),
            between_files: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_files: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl RunSummary {
    pub fn tally(&mut self, valid: bool) {
        if valid {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
    }
}

pub struct CookieChecker {
    config: CheckerConfig,
}

impl CookieChecker {
    pub fn new(config: CheckerConfig) -> CookieChecker {
        CookieChecker { config }
    }

    /// Checks every cookie file in the configured directory. Only a missing
    /// or empty cookie directory aborts; everything else is a per-file
    /// outcome.
    pub async fn run(&self) -> Result<RunSummary> {
        let recorder =
            OutcomeRecorder::create(&self.config.result_file, &self.config.quarantine_dir)
                .context("could not prepare result file and quarantine directory")?;

        let proxies = proxy_loader::load_proxies(&self.config.proxy_file);

        let cookie_files = self.list_cookie_files()?;
        info!("Found {} cookie files to check", cookie_files.len());

        let mut summary = RunSummary {
            total_files: cookie_files.len(),
            ..RunSummary::default()
        };

        for (file_name, path) in &cookie_files {
            info!("=== Checking {} ===", file_name);

            let proxy = proxies.choose(&mut rand::thread_rng()).cloned();
            let valid = self.check_file(&recorder, file_name, path, proxy).await;
            summary.tally(valid);

            tokio::time::sleep(self.config.between_files).await;
        }

        info!("=== Finished checking all cookies ===");
        info!("Total cookie files: {}", summary.total_files);
        info!("Still valid: {}", summary.valid);
        info!("Expired or failed: {}", summary.invalid);
        info!("Results saved to {:?}", self.config.result_file);

        Ok(summary)
    }

    fn list_cookie_files(&self) -> Result<Vec<(String, PathBuf)>> {
        if !self.config.cookie_dir.exists() {
            bail!("cookie directory {:?} does not exist", self.config.cookie_dir);
        }

        let entries = fs::read_dir(&self.config.cookie_dir)
            .with_context(|| format!("could not list {:?}", self.config.cookie_dir))?;

        let mut files: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
            .collect();

        if files.is_empty() {
            bail!("no cookie files found in {:?}", self.config.cookie_dir);
        }

        files.sort();
        Ok(files)
    }

    // One fresh browser session per file, closed on every path out of here.
    async fn check_file(
        &self,
        recorder: &OutcomeRecorder,
        file_name: &str,
        cookie_path: &Path,
        proxy: Option<ProxyEndpoint>,
    ) -> bool {
        let session_config = SessionConfig {
            headless: self.config.headless,
            proxy,
            ..SessionConfig::default()
        };

        let session = match BrowserSession::launch(&session_config, file_name).await {
            Ok(session) => session,
            Err(e) => {
                error!("[{}] Could not open a browser session: {}", file_name, e);
                self.dispose_failure(recorder, file_name, cookie_path);
                return false;
            }
        };

        let valid = self.check_page(&session, recorder, file_name, cookie_path).await;

        session.close().await;
        info!("[{}] Browser closed", file_name);
        valid
    }

    /// Per-file flow on an open page, folding any failure into the fixed
    /// processing-error outcome. Every call ends in exactly one result line
    /// and one keep/quarantine decision.
    pub async fn check_page<P: PageProbe>(
        &self,
        page: &P,
        recorder: &OutcomeRecorder,
        file_name: &str,
        cookie_path: &Path,
    ) -> bool {
        match self.check_session(page, recorder, file_name, cookie_path).await {
            Ok(valid) => valid,
            Err(e) => {
                error!("[{}] Processing failed: {}", file_name, e);
                self.dispose_failure(recorder, file_name, cookie_path);
                false
            }
        }
    }

    fn dispose_failure(&self, recorder: &OutcomeRecorder, file_name: &str, cookie_path: &Path) {
        recorder.quarantine(cookie_path, file_name);
        recorder.record(file_name, PROCESSING_ERROR, PROCESSING_ERROR);
    }

    /// Land on the site, inject the cookies, refresh, inspect the account,
    /// then disposition + record. `Err` means nothing was recorded and the
    /// caller settles the processing-error outcome.
    pub async fn check_session<P: PageProbe>(
        &self,
        page: &P,
        recorder: &OutcomeRecorder,
        file_name: &str,
        cookie_path: &Path,
    ) -> Result<bool, BrowserError> {
        info!("[{}] Visiting {}", file_name, INITIAL_URL);
        page.navigate(INITIAL_URL).await?;
        tokio::time::sleep(self.config.initial_settle).await;

        let cookies = match cookie_loader::load_cookie_file(cookie_path) {
            Ok(cookies) => cookies,
            Err(e) => {
                error!("[{}] Could not read cookie file: {}", file_name, e);
                recorder.quarantine(cookie_path, file_name);
                recorder.record(file_name, READ_ERROR, READ_ERROR);
                return Ok(false);
            }
        };
        info!("[{}] Injecting {} cookies", file_name, cookies.len());
        page.inject_cookies(&cookies).await;

        page.refresh().await?;
        tokio::time::sleep(self.config.page_settle).await;

        let outcome = account::inspect_account(page, self.config.page_settle).await;

        if outcome.cookie_valid {
            info!("[{}] Cookie still valid, keeping the file", file_name);
        } else {
            info!("[{}] Cookie no longer valid", file_name);
            recorder.quarantine(cookie_path, file_name);
        }
        recorder.record(file_name, &outcome.plan, &outcome.expiry);

        Ok(outcome.cookie_valid)
    }
}
