//! Credential resolution for the Skywatch API.
//!
//! Credentials are resolved once, at session construction, from the first
//! source that provides each field:
//!
//! 1. explicit builder arguments
//! 2. environment variables (`SKYWATCH_CLIENT_ID`, `SKYWATCH_CLIENT_SECRET`,
//!    `SKYWATCH_API_URL`)
//! 3. the per-user credentials file (`~/.config/skywatch/credentials.json`)
//!
//! A missing client id or secret is a fatal configuration error. The API URL
//! falls back to the production default when absent everywhere.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::APP_NAME;
use crate::error::{Error, Result};

const ENV_CLIENT_ID: &str = "SKYWATCH_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "SKYWATCH_CLIENT_SECRET";
const ENV_API_URL: &str = "SKYWATCH_API_URL";

const CREDENTIALS_FILE: &str = "credentials.json";

/// Production API base URL, used when no override is configured.
pub(crate) const DEFAULT_API_URL: &str = "https://api.skywatch.dev/v1";

/// Recognized keys in the credentials file.
#[derive(Debug, Default, Deserialize)]
struct FileCredentials {
    skywatch_client_id: Option<String>,
    skywatch_client_secret: Option<String>,
    skywatch_api_url: Option<String>,
}

/// Explicit credential arguments, each optional.
#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_url: Option<String>,
}

/// Fully resolved credentials. Immutable after resolution.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    client_secret: String,
    pub api_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from overrides, environment and the per-user file.
    pub fn resolve(overrides: CredentialOverrides) -> Result<Self> {
        let file = Self::default_file_path();
        Self::resolve_from(overrides, |key| std::env::var(key).ok(), file.as_deref())
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    fn default_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME).join(CREDENTIALS_FILE))
    }

    fn resolve_from(
        overrides: CredentialOverrides,
        env: impl Fn(&str) -> Option<String>,
        file_path: Option<&Path>,
    ) -> Result<Self> {
        let file = match file_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                let parsed: FileCredentials = serde_json::from_str(&contents).map_err(|e| {
                    Error::Configuration(format!(
                        "invalid credentials file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                debug!(path = %path.display(), "Credentials file found");
                parsed
            }
            _ => FileCredentials::default(),
        };

        let client_id = overrides
            .client_id
            .or_else(|| env(ENV_CLIENT_ID))
            .or(file.skywatch_client_id)
            .ok_or_else(|| missing_field("client id", ENV_CLIENT_ID))?;

        let client_secret = overrides
            .client_secret
            .or_else(|| env(ENV_CLIENT_SECRET))
            .or(file.skywatch_client_secret)
            .ok_or_else(|| missing_field("client secret", ENV_CLIENT_SECRET))?;

        let api_url = overrides
            .api_url
            .or_else(|| env(ENV_API_URL))
            .or(file.skywatch_api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client_id,
            client_secret,
            api_url,
        })
    }
}

fn missing_field(name: &str, env_var: &str) -> Error {
    Error::Configuration(format!(
        "no {} could be found; set {} or add it to the credentials file",
        name, env_var
    ))
}
