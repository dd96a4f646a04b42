//! Access tokens and their durable, file-backed cache.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::APP_NAME;
use crate::error::Result;

/// Directory under the user cache dir holding one token file per client id.
const TOKEN_DIR: &str = "tokens";

/// A short-lived bearer token and its absolute expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Build a token from the exchange response's validity duration.
    pub fn with_lifetime(access_token: String, expires_in_secs: i64) -> Self {
        Self {
            access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    /// A token is valid iff now is strictly before expiry minus the margin.
    pub fn is_valid(&self, margin_secs: i64) -> bool {
        Utc::now() < self.expires_at - Duration::seconds(margin_secs)
    }
}

/// Durable cache of the last-obtained token, shared across processes.
///
/// One plain-JSON file per client id. An absent or unreadable file is not an
/// error; it simply triggers a fresh token exchange. Writes go through the
/// session's token lock, so the file has a single writer per process.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
    client_id: String,
}

impl TokenStore {
    /// Store rooted at an explicit directory. Used for tests and overrides.
    pub fn new(dir: impl Into<PathBuf>, client_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            client_id: client_id.into(),
        }
    }

    /// Store at the default per-user location for the given client id.
    pub fn default_for(client_id: &str) -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_NAME)
            .join(TOKEN_DIR);
        Self::new(dir, client_id)
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.client_id))
    }

    /// Read the cached token, if any. Unparseable files are treated as absent.
    pub fn read(&self) -> Option<Token> {
        let path = self.token_path();
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(token) => {
                debug!(path = %path.display(), "Loaded cached token");
                Some(token)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    /// Persist a token, replacing any prior cache.
    ///
    /// A failed write removes the file so a partial token never persists.
    pub fn write(&self, token: &Token) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.token_path();
        let contents = serde_json::to_string(token)
            .map_err(|e| crate::Error::InvalidResponse(e.to_string()))?;
        if let Err(e) = std::fs::write(&path, contents) {
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }
        debug!(path = %path.display(), "Token written to store");
        Ok(())
    }

    /// Remove the cached token, if present.
    pub fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity_margin() {
        let fresh = Token::with_lifetime("t".to_string(), 3600);
        assert!(fresh.is_valid(60));

        // Expires within the margin: treated as already expired.
        let closing = Token::with_lifetime("t".to_string(), 30);
        assert!(!closing.is_valid(60));

        let expired = Token {
            access_token: "t".to_string(),
            expires_at: Utc::now() - Duration::seconds(10),
        };
        assert!(!expired.is_valid(0));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path(), "client-a");
        assert!(store.read().is_none());

        let token = Token::with_lifetime("abc123".to_string(), 3600);
        store.write(&token).unwrap();

        let loaded = store.read().unwrap();
        assert_eq!(loaded.access_token, "abc123");
        assert_eq!(loaded.expires_at, token.expires_at);

        store.clear().unwrap();
        assert!(store.read().is_none());
    }

    #[test]
    fn test_stores_are_keyed_by_client_id() {
        let dir = tempfile::tempdir().unwrap();
        let store_a = TokenStore::new(dir.path(), "client-a");
        let store_b = TokenStore::new(dir.path(), "client-b");

        store_a
            .write(&Token::with_lifetime("a-token".to_string(), 3600))
            .unwrap();
        assert!(store_b.read().is_none());
        assert_eq!(store_a.read().unwrap().access_token, "a-token");
    }

    #[test]
    fn test_corrupt_file_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path(), "client-a");
        std::fs::write(dir.path().join("client-a.json"), "not json").unwrap();
        assert!(store.read().is_none());
    }
}
