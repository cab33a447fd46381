pub mod logger;
pub mod proxy_loader;
pub mod cookie_loader;
pub mod browser;
pub mod classifier;
pub mod account;
pub mod recorder;
pub mod checker;

// Exporting types for convenience
pub use proxy_loader::ProxyEndpoint;
pub use cookie_loader::CookieRecord;
pub use browser::{BrowserError, BrowserSession, PageProbe, SessionConfig};
pub use classifier::LoginStatus;
pub use account::PlanInfo;
pub use recorder::OutcomeRecorder;
pub use checker::{CheckerConfig, CookieChecker, RunSummary};
