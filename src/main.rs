use spotify_checker_lib::logger;
use spotify_checker_lib::{CheckerConfig, CookieChecker};

use log::{error, info};

#[tokio::main]
async fn main() {
    logger::init();
    info!("Starting Spotify cookie checker...");

    // Fixed wiring: proxy.txt, cookies/, expired_cookies/,
    // spotify_accounts.txt in the working directory.
    let checker = CookieChecker::new(CheckerConfig::default());

    if let Err(e) = checker.run().await {
        error!("Run aborted: {:#}", e);
        std::process::exit(1);
    }
}
