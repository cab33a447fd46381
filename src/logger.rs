use log::LevelFilter;
use env_logger::Builder;
use std::io::Write;
use chrono::Local;

pub fn init() {
    Builder::new()
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        // The CDP handler chatters at debug/info; keep it down unless asked for.
        .filter_module("chromiumoxide", LevelFilter::Warn)
        .parse_default_env()
        .init();

    log::info!("Logger initialized.");
}
