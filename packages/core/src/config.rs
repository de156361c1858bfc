//! Runtime Configuration
//!
//! Settings for the catalog core, resolved once at startup and passed
//! explicitly to [`crate::db::DatabaseService`] - there is no process-wide
//! configuration state.

use std::path::PathBuf;

/// Default busy timeout applied to every connection, milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Catalog runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Path to the database file
    pub db_path: PathBuf,

    /// Busy timeout applied to every connection, milliseconds. Concurrent
    /// writers wait this long for the write lock before failing.
    pub busy_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/orgatlas.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl CatalogConfig {
    /// Build a configuration from the environment.
    ///
    /// Reads `ORGATLAS_DB` (database file path) and
    /// `ORGATLAS_BUSY_TIMEOUT_MS`; unset or unparseable values fall back to
    /// the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ORGATLAS_DB") {
            if !path.is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }

        if let Ok(raw) = std::env::var("ORGATLAS_BUSY_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => config.busy_timeout_ms = ms,
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "ignoring unparseable ORGATLAS_BUSY_TIMEOUT_MS"
                    );
                }
            }
        }

        config
    }
}

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = CatalogConfig::default();
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.db_path.to_string_lossy().ends_with("orgatlas.db"));
    }
}
