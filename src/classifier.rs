use std::path::Path;
use std::time::Duration;

use log::info;

use crate::browser::PageProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Authenticated,
    NotAuthenticated,
}

const LOGIN_HEADING: &str = "Log in to Spotify";
// Only rendered for signed-in users.
const ACCOUNT_MARKER: &str = "div[class*='account-header'], div[class*='user-info']";
// English and Vietnamese storefront labels.
const LOGIN_BUTTON_LABELS: [&str; 2] = ["Log in", "Đăng nhập"];
const DEBUG_SCREENSHOT: &str = "login_check_debug.png";

const ACCOUNT_MARKER_WAIT: Duration = Duration::from_secs(5);

/// Decides whether the current page belongs to an authenticated session.
///
/// The checks run in fixed priority order and stop at the first verdict:
/// 1. login-page heading present: not authenticated
/// 2. signed-in marker appears within 5 s: authenticated
/// 3. a login button is on the page: not authenticated
/// 4. debug screenshot, then URL contains "login"/"sign-in": not authenticated
/// 5. nothing negative found: authenticated, optimistic on purpose
pub async fn classify_session<P: PageProbe>(page: &P) -> LoginStatus {
    if page.tag_text_present("h1", LOGIN_HEADING).await {
        info!("Login page detected via '{}' heading", LOGIN_HEADING);
        return LoginStatus::NotAuthenticated;
    }

    if page.wait_for_selector(ACCOUNT_MARKER, ACCOUNT_MARKER_WAIT).await {
        return LoginStatus::Authenticated;
    }

    for label in LOGIN_BUTTON_LABELS {
        if page.tag_text_present("button", label).await {
            info!("Login button detected ('{}')", label);
            return LoginStatus::NotAuthenticated;
        }
    }

    // Nothing conclusive on the page itself. Keep a screenshot around and
    // fall back to the URL.
    page.save_screenshot(Path::new(DEBUG_SCREENSHOT)).await;

    let url = page.current_url().await;
    if url.contains("login") || url.contains("sign-in") {
        info!("Current URL looks like a login page: {}", url);
        return LoginStatus::NotAuthenticated;
    }

    LoginStatus::Authenticated
}
