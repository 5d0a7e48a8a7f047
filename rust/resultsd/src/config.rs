/// Application-level constants
pub const APP_NAME: &str = "resultsd";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Workspace database file, relative to the selected workspace folder.
pub const DB_FILE_NAME: &str = "results.sqlite3";

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV_VAR: &str = "RESULTSD_LOG";

pub fn default_log_filter() -> &'static str {
    "resultsd=info"
}
