use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use spotify_checker_lib::account::{EXPIRY_SELECTOR, PLAN_SELECTOR};
use spotify_checker_lib::browser::{BrowserError, PageProbe};
use spotify_checker_lib::checker::{CheckerConfig, CookieChecker, RunSummary};
use spotify_checker_lib::cookie_loader::CookieRecord;
use spotify_checker_lib::recorder::OutcomeRecorder;

const COOKIE_LINE: &str = ".spotify.com\tTRUE\t/\tTRUE\t0\tsp_dc\ttoken";

/// Scripted page standing in for a live browser session.
#[derive(Default)]
struct ScriptedPage {
    login_heading: bool,
    authenticated: bool,
    navigate_fails: bool,
    texts: HashMap<&'static str, &'static str>,
    injected: Mutex<Vec<CookieRecord>>,
}

impl ScriptedPage {
    fn signed_in(plan: &'static str, expiry: &'static str) -> ScriptedPage {
        ScriptedPage {
            authenticated: true,
            texts: HashMap::from([(PLAN_SELECTOR, plan), (EXPIRY_SELECTOR, expiry)]),
            ..ScriptedPage::default()
        }
    }

    fn login_wall() -> ScriptedPage {
        ScriptedPage {
            login_heading: true,
            ..ScriptedPage::default()
        }
    }
}

#[async_trait]
impl PageProbe for ScriptedPage {
    async fn navigate(&self, _url: &str) -> Result<(), BrowserError> {
        if self.navigate_fails {
            Err(BrowserError::NavigationFailed("connection reset".to_string()))
        } else {
            Ok(())
        }
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn inject_cookies(&self, cookies: &[CookieRecord]) {
        self.injected.lock().unwrap().extend_from_slice(cookies);
    }

    async fn tag_text_present(&self, tag: &str, needle: &str) -> bool {
        tag == "h1" && needle == "Log in to Spotify" && self.login_heading
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> bool {
        self.authenticated && selector.contains("account-header")
    }

    async fn selector_text(&self, selector: &str, _timeout: Duration) -> Option<String> {
        self.texts.get(selector).map(|text| text.to_string())
    }

    async fn current_url(&self) -> String {
        "https://www.spotify.com/vn-vi/account/manage-your-plan/".to_string()
    }

    async fn save_screenshot(&self, _path: &Path) -> bool {
        false
    }
}

fn test_config(base: &Path) -> CheckerConfig {
    CheckerConfig {
        proxy_file: base.join("proxy.txt"),
        cookie_dir: base.join("cookies"),
        quarantine_dir: base.join("expired_cookies"),
        result_file: base.join("spotify_accounts.txt"),
        headless: true,
        initial_settle: Duration::ZERO,
        page_settle: Duration::ZERO,
        between_files: Duration::ZERO,
    }
}

#[tokio::test]
async fn two_file_scenario_records_and_disposes_each_file_once() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.cookie_dir).unwrap();
    fs::write(
        config.cookie_dir.join("a.txt"),
        format!("# Netscape HTTP Cookie File\n{}\n", COOKIE_LINE),
    )
    .unwrap();
    fs::write(config.cookie_dir.join("b.txt"), format!("{}\n", COOKIE_LINE)).unwrap();

    let recorder = OutcomeRecorder::create(&config.result_file, &config.quarantine_dir).unwrap();
    let checker = CookieChecker::new(config.clone());
    let mut summary = RunSummary {
        total_files: 2,
        ..RunSummary::default()
    };

    let good = ScriptedPage::signed_in("Premium", "12/31/2025");
    let valid = checker
        .check_session(&good, &recorder, "a.txt", &config.cookie_dir.join("a.txt"))
        .await
        .unwrap();
    summary.tally(valid);

    let wall = ScriptedPage::login_wall();
    let valid = checker
        .check_session(&wall, &recorder, "b.txt", &config.cookie_dir.join("b.txt"))
        .await
        .unwrap();
    summary.tally(valid);

    let log = fs::read_to_string(&config.result_file).unwrap();
    assert_eq!(
        log,
        "a.txt|Premium|12/31/2025\nb.txt|Cookie hết hạn|Cookie hết hạn\n"
    );

    // a.txt stays, b.txt lands in quarantine.
    assert!(config.cookie_dir.join("a.txt").exists());
    assert!(!config.cookie_dir.join("b.txt").exists());
    assert!(config.quarantine_dir.join("b.txt").exists());

    assert_eq!(
        summary,
        RunSummary {
            total_files: 2,
            valid: 1,
            invalid: 1
        }
    );

    // Both files had their cookie injected before the verdict.
    assert_eq!(good.injected.lock().unwrap().len(), 1);
    assert_eq!(wall.injected.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_cookie_file_records_the_read_error_pair() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.cookie_dir).unwrap();

    let recorder = OutcomeRecorder::create(&config.result_file, &config.quarantine_dir).unwrap();
    let checker = CookieChecker::new(config.clone());

    let page = ScriptedPage::signed_in("Premium", "12/31/2025");
    let valid = checker
        .check_session(&page, &recorder, "c.txt", &config.cookie_dir.join("c.txt"))
        .await
        .unwrap();

    assert!(!valid);
    assert_eq!(
        fs::read_to_string(&config.result_file).unwrap(),
        "c.txt|Lỗi đọc cookie|Lỗi đọc cookie\n"
    );
    assert!(page.injected.lock().unwrap().is_empty());
}

#[tokio::test]
async fn navigation_failure_bubbles_up_without_recording() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.cookie_dir).unwrap();
    fs::write(config.cookie_dir.join("d.txt"), format!("{}\n", COOKIE_LINE)).unwrap();

    let recorder = OutcomeRecorder::create(&config.result_file, &config.quarantine_dir).unwrap();
    let checker = CookieChecker::new(config.clone());

    let page = ScriptedPage {
        navigate_fails: true,
        ..ScriptedPage::default()
    };
    let result = checker
        .check_session(&page, &recorder, "d.txt", &config.cookie_dir.join("d.txt"))
        .await;

    // The caller owns the processing-error outcome for this file.
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&config.result_file).unwrap(), "");
    assert!(config.cookie_dir.join("d.txt").exists());
}

#[tokio::test]
async fn processing_failure_quarantines_and_records_the_error_pair() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.cookie_dir).unwrap();
    fs::write(config.cookie_dir.join("e.txt"), format!("{}\n", COOKIE_LINE)).unwrap();

    let recorder = OutcomeRecorder::create(&config.result_file, &config.quarantine_dir).unwrap();
    let checker = CookieChecker::new(config.clone());
    let mut summary = RunSummary {
        total_files: 1,
        ..RunSummary::default()
    };

    let page = ScriptedPage {
        navigate_fails: true,
        ..ScriptedPage::default()
    };
    let valid = checker
        .check_page(&page, &recorder, "e.txt", &config.cookie_dir.join("e.txt"))
        .await;
    summary.tally(valid);

    assert_eq!(
        fs::read_to_string(&config.result_file).unwrap(),
        "e.txt|Lỗi xử lý|Lỗi xử lý\n"
    );
    assert!(!config.cookie_dir.join("e.txt").exists());
    assert!(config.quarantine_dir.join("e.txt").exists());
    assert_eq!(
        summary,
        RunSummary {
            total_files: 1,
            valid: 0,
            invalid: 1
        }
    );
}

#[tokio::test]
async fn missing_cookie_directory_aborts_the_run() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let checker = CookieChecker::new(config);

    let err = checker.run().await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn empty_cookie_directory_aborts_with_a_truncated_result_file() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    fs::create_dir_all(&config.cookie_dir).unwrap();
    fs::write(&config.result_file, "stale content from a previous run\n").unwrap();

    let checker = CookieChecker::new(config.clone());
    let err = checker.run().await.unwrap_err();

    assert!(err.to_string().contains("no cookie files"));
    // The run still truncates the result file before the abort.
    assert_eq!(fs::read_to_string(&config.result_file).unwrap(), "");
}
