//! Runtime configuration.
//!
//! Defaults live here as constants; [`Settings::from_env`] overrides them from
//! the environment (a `.env` file is loaded first when present).

use std::env;
use std::path::PathBuf;

/// Default HTTP port for `splitledger serve`.
pub const DEFAULT_PORT: u16 = 3000;

/// Directory where column mappings are stored (relative to current dir).
pub const DEFAULT_REGISTRY_DIR: &str = ".splitledger/mappings";

/// Maximum accepted upload size for the HTTP API (in bytes).
///
/// 20 MB limit.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Timeout for fetching a report over HTTP.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `SPLITLEDGER_PORT`
    pub port: u16,
    /// `SPLITLEDGER_REGISTRY_DIR`
    pub registry_dir: PathBuf,
    /// `SPLITLEDGER_SOURCE_TOKEN`, bearer token for report fetches.
    pub source_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            registry_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
            source_token: None,
        }
    }
}

impl Settings {
    /// Load settings, reading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            port: env::var("SPLITLEDGER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            registry_dir: env::var("SPLITLEDGER_REGISTRY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_dir),
            source_token: env::var("SPLITLEDGER_SOURCE_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}
