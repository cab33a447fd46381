use std::time::Duration;

use log::{error, info, warn};

use crate::browser::PageProbe;
use crate::classifier::{classify_session, LoginStatus};

pub const ACCOUNT_URL: &str = "https://www.spotify.com/vn-vi/account/manage-your-plan/";

/// Result-log pair for a session that is no longer signed in.
pub const COOKIE_EXPIRED: &str = "Cookie hết hạn";
/// Default plan text when the element never shows up.
pub const PLAN_UNKNOWN: &str = "Không xác định";
/// Default expiry text when neither position yields anything.
pub const EXPIRY_UNKNOWN: &str = "Không rõ";

pub const PLAN_SELECTOR: &str =
    "#your-plan > section > div > div:nth-of-type(1) > div > div > div:nth-of-type(2) > span";
pub const EXPIRY_SELECTOR: &str = "#your-plan > section > div > div:nth-of-type(2) > div > div:nth-of-type(2) > div:nth-of-type(2) > div > div:nth-of-type(1) > b:nth-of-type(2)";
/// Expiry position on the older page layout, checked once without waiting.
pub const EXPIRY_SELECTOR_ALT: &str = "#your-plan > section > div > div:nth-of-type(2) > div > div:nth-of-type(2) > div > div > div:nth-of-type(1) > b:nth-of-type(2)";

const PLAN_WAIT: Duration = Duration::from_secs(20);
const EXPIRY_WAIT: Duration = Duration::from_secs(5);

/// `cookie_valid` decides whether the source file is kept or quarantined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInfo {
    pub plan: String,
    pub expiry: String,
    pub cookie_valid: bool,
}

/// Visits the plan page and scrapes both fields. Field misses degrade to
/// the unknown literals; only a dead session or a navigation failure makes
/// the cookie invalid, and partial fields survive either.
pub async fn inspect_account<P: PageProbe>(page: &P, settle: Duration) -> PlanInfo {
    let mut result = PlanInfo {
        plan: PLAN_UNKNOWN.to_string(),
        expiry: EXPIRY_UNKNOWN.to_string(),
        cookie_valid: false,
    };

    info!("Visiting {}", ACCOUNT_URL);
    if let Err(e) = page.navigate(ACCOUNT_URL).await {
        error!("Could not reach the account page: {}", e);
        return result;
    }
    tokio::time::sleep(settle).await;

    if classify_session(page).await == LoginStatus::NotAuthenticated {
        result.plan = COOKIE_EXPIRED.to_string();
        result.expiry = COOKIE_EXPIRED.to_string();
        return result;
    }
    result.cookie_valid = true;

    match page.selector_text(PLAN_SELECTOR, PLAN_WAIT).await {
        Some(plan) => {
            info!("Plan: {}", plan);
            result.plan = plan;
        }
        None => warn!("Plan element never appeared, keeping '{}'", PLAN_UNKNOWN),
    }

    match page.selector_text(EXPIRY_SELECTOR, EXPIRY_WAIT).await {
        Some(expiry) => {
            info!("Expiry: {}", expiry);
            result.expiry = expiry;
        }
        None => {
            // Some plan layouts place the date one level shallower.
            match page.selector_text(EXPIRY_SELECTOR_ALT, Duration::ZERO).await {
                Some(expiry) => {
                    info!("Expiry (alternate position): {}", expiry);
                    result.expiry = expiry;
                }
                None => warn!("Expiry element never appeared, keeping '{}'", EXPIRY_UNKNOWN),
            }
        }
    }

    result
}
