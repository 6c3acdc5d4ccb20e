use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Medagenda";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "info,medagenda=debug"
}

/// Get the application data directory
/// ~/Medagenda/ on all platforms (user-visible, per front-office deployment)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Medagenda")
}

/// Get the default database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("database").join("medagenda.db")
}
