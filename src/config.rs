use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Navbat";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=debug,info", env!("CARGO_PKG_NAME"))
}

/// Silent background refresh cadence.
pub const POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Delay between a domain event and the follow-up fetch, to tolerate
/// backend write-then-read lag.
pub const EVENT_SETTLE_DELAY: Duration = Duration::from_millis(400);

/// Default lifetime of an optimistic override.
pub const DEFAULT_OVERRIDE_TTL: Duration = Duration::from_secs(10 * 60);

/// Get the application data directory
/// ~/Navbat/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Navbat")
}

/// Path of the local override database (survives reload, not process memory).
pub fn overrides_db_path() -> PathBuf {
    app_data_dir().join("overrides.db")
}
