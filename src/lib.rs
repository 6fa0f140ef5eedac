//! Speedtest Monitor
//!
//! Runs a single internet speed check against speedtest.net (or reports
//! placeholder figures on a dry run), records the result in SQLite and
//! emails an alert when the download drops to or below a threshold.

pub mod app;
pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod notify;
pub mod output;
pub mod provider;
pub mod reporter;
pub mod store;
pub mod units;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, Measurement, StoredResult};
pub use collector::MeasurementCollector;
pub use reporter::{ReportOutcome, ResultReporter};
pub use output::OutputFormatter;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Version line shown in debug output
pub fn build_info() -> String {
    match GIT_COMMIT {
        Some(commit) => format!("{} v{} ({}, built {})", PKG_NAME, VERSION, commit, BUILD_TIME),
        None => format!("{} v{} (built {})", PKG_NAME, VERSION, BUILD_TIME),
    }
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_DOWNLOAD_THRESHOLD: f64 = 10.0;
    pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
    pub const DEFAULT_SMTP_PORT: u16 = 465;
    pub const DEFAULT_DEBUG_SMTP_HOST: &str = "localhost";
    pub const DEFAULT_DEBUG_SMTP_PORT: u16 = 1025;
    pub const DEFAULT_DATABASE_PATH: &str = "speedtest_results.db";
    pub const DEFAULT_LOG_FILE: &str = "speedtest_app.log";
    pub const DEFAULT_SERVERS_URL: &str =
        "https://www.speedtest.net/api/js/servers?engine=js&https_functional=true&limit=10";
    pub const DEFAULT_SHARE_URL: &str = "https://www.speedtest.net/api/api.php";
    pub const DEFAULT_DOWNLOAD_SIZES: &[u32] = &[350, 750, 1500, 2500, 3500];
    pub const DEFAULT_UPLOAD_SIZES: &[usize] = &[32768, 131072, 524288, 1048576];
    pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
