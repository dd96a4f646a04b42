//! Client configuration with optional per-user overrides.
//!
//! Defaults can be overridden by `~/.config/skywatch/config.json`; any key
//! missing from the file keeps its default. Builder arguments on
//! [`SessionBuilder`](crate::SessionBuilder) take precedence over both.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Application name used for config/cache directory paths
pub(crate) const APP_NAME: &str = "skywatch";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default ceiling on concurrent batch requests.
const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while still failing reasonably fast.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Safety margin subtracted from token expiry, in seconds.
/// A token this close to expiring is refreshed rather than reused.
const DEFAULT_TOKEN_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_concurrency: usize,
    pub timeout_secs: u64,
    pub token_margin_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_margin_secs: DEFAULT_TOKEN_MARGIN_SECS,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_json::from_str(&contents).map_err(|e| {
                    crate::Error::Configuration(format!(
                        "invalid config file {}: {}",
                        path.display(),
                        e
                    ))
                })
            }
            _ => Ok(Self::default()),
        }
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME).join(CONFIG_FILE))
    }
}
