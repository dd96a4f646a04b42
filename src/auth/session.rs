//! Authenticated session management for the Skywatch API.
//!
//! A [`Session`] resolves credentials once, exchanges them for a short-lived
//! bearer token via the OAuth2 client-credentials flow, persists the token in
//! a [`TokenStore`] for reuse across processes, and refreshes it lazily when
//! it nears expiry. All resource clients borrow a session for their calls.
//!
//! Dropping the session releases the underlying connection pool; there is
//! nothing to close manually on any exit path.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::credentials::{CredentialOverrides, Credentials};
use crate::auth::token::{Token, TokenStore};
use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: i64,
}

/// Mutable token state, guarded by a single async lock so that only one
/// refresh is ever in flight per session. Concurrent callers that need a
/// token while a refresh is running wait on the same exchange instead of
/// racing a second one.
#[derive(Default)]
struct TokenState {
    token: Option<Token>,
    /// Set when the server rejects the credentials. Terminal for this
    /// session instance; replayed on later calls without touching the
    /// network.
    auth_failure: Option<(u16, String)>,
}

/// Builder for [`Session`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    overrides: CredentialOverrides,
    token_store: Option<TokenStore>,
    max_concurrency: Option<usize>,
    timeout_secs: Option<u64>,
    token_margin_secs: Option<i64>,
}

impl SessionBuilder {
    /// API key id. Overrides environment and file sources.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.overrides.client_id = Some(id.into());
        self
    }

    /// API key secret. Overrides environment and file sources.
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.overrides.client_secret = Some(secret.into());
        self
    }

    /// Override the API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.api_url = Some(url.into());
        self
    }

    /// Use a specific token store instead of the default per-user location.
    pub fn token_store(mut self, store: TokenStore) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Ceiling on concurrent batch requests made through this session.
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Per-request HTTP timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Seconds before expiry at which a token is refreshed rather than used.
    pub fn token_margin_secs(mut self, secs: i64) -> Self {
        self.token_margin_secs = Some(secs);
        self
    }

    /// Resolve credentials and construct the session. No network calls are
    /// made; the first token is acquired lazily or via
    /// [`Session::start_session`].
    pub fn build(self) -> Result<Session> {
        let config = Config::load()?;
        let credentials = Credentials::resolve(self.overrides)?;

        let store = self
            .token_store
            .unwrap_or_else(|| TokenStore::default_for(&credentials.client_id));

        let timeout = self.timeout_secs.unwrap_or(config.timeout_secs);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(Error::Network)?;

        Ok(Session {
            http,
            credentials,
            store,
            max_concurrency: self.max_concurrency.unwrap_or(config.max_concurrency),
            token_margin_secs: self.token_margin_secs.unwrap_or(config.token_margin_secs),
            state: Mutex::new(TokenState::default()),
        })
    }
}

/// An authenticated session against the Skywatch API.
pub struct Session {
    http: Client,
    credentials: Credentials,
    store: TokenStore,
    max_concurrency: usize,
    token_margin_secs: i64,
    state: Mutex<TokenState>,
}

impl Session {
    /// Start building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Session with credentials resolved from the environment or the
    /// per-user credentials file.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Base API URL, without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.credentials.api_url
    }

    /// Ceiling on concurrent batch requests for this session.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Ensure a valid token exists, reusing the store or exchanging
    /// credentials as needed. Calling this is optional; every API call
    /// obtains its token through [`Session::token`] anyway.
    pub async fn start_session(&self) -> Result<()> {
        self.token().await.map(|_| ())
    }

    /// Current bearer token, refreshing transparently if expired.
    pub async fn token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        self.current_token(&mut state).await
    }

    async fn current_token(&self, state: &mut TokenState) -> Result<String> {
        if let Some((status, body)) = &state.auth_failure {
            return Err(Error::Authentication {
                status: *status,
                body: body.clone(),
            });
        }

        if let Some(token) = &state.token {
            if token.is_valid(self.token_margin_secs) {
                return Ok(token.access_token.clone());
            }
            debug!("Cached token expired; refreshing");
        } else if let Some(token) = self.store.read() {
            // First use in this process: the store may hold a token obtained
            // by an earlier run, in which case no exchange is needed.
            if token.is_valid(self.token_margin_secs) {
                let value = token.access_token.clone();
                state.token = Some(token);
                return Ok(value);
            }
            debug!("Stored token expired; refreshing");
        }

        self.exchange(state).await
    }

    /// Perform the client-credentials exchange. Caller holds the state lock.
    async fn exchange(&self, state: &mut TokenState) -> Result<String> {
        info!("Acquiring a new access token");

        let url = format!("{}/oauth/token", self.credentials.api_url);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.credentials.client_id),
            ("client_secret", self.credentials.client_secret()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(Error::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Error::auth_rejected(status, &body);
            if let Error::Authentication { status, body } = &err {
                state.auth_failure = Some((*status, body.clone()));
            }
            warn!(status = status.as_u16(), "Token exchange rejected");
            return Err(err);
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("token exchange response: {e}")))?;

        let token = Token::with_lifetime(grant.access_token, grant.expires_in);
        self.store.write(&token)?;

        info!(expires_at = %token.expires_at, "Acquired new token");
        let value = token.access_token.clone();
        state.token = Some(token);
        Ok(value)
    }

    /// Discard a stale token and exchange credentials again.
    ///
    /// Concurrent 401s coalesce here: if another caller already replaced
    /// the token while this one waited on the lock, the replacement is
    /// reused instead of exchanging a second time.
    async fn force_refresh(&self, stale: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(token) = &state.token {
            if token.access_token != stale && token.is_valid(self.token_margin_secs) {
                return Ok(token.access_token.clone());
            }
        }
        state.token = None;
        self.exchange(&mut state).await
    }

    /// Send a bearer-authenticated request built by `build`.
    ///
    /// A 401/403 response triggers exactly one re-authentication and one
    /// retry of this call; the retried call's own outcome is surfaced
    /// whatever it is, so an unrelated persistent 401 cannot loop.
    pub(crate) async fn send_authenticated<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.token().await?;
        let response = build(&self.http, &token)
            .send()
            .await
            .map_err(Error::from_transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "Call rejected; re-authenticating once");
            let token = self.force_refresh(&token).await?;
            let retried = build(&self.http, &token)
                .send()
                .await
                .map_err(Error::from_transport)?;
            return Self::check_response(retried).await;
        }

        Self::check_response(response).await
    }

    /// Check if a response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::from_status(status, &body))
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .send_authenticated(|http, token| http.get(url).bearer_auth(token))
            .await?;
        response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("{url}: {e}")))
    }

    pub(crate) async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .send_authenticated(|http, token| http.get(url).bearer_auth(token))
            .await?;
        let bytes = response.bytes().await.map_err(Error::from_transport)?;
        Ok(bytes.to_vec())
    }

    pub(crate) async fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        let response = self
            .send_authenticated(|http, token| http.post(url).bearer_auth(token).form(params))
            .await?;
        response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(format!("{url}: {e}")))
    }

    pub(crate) async fn post_form(&self, url: &str, params: &[(String, String)]) -> Result<()> {
        self.send_authenticated(|http, token| http.post(url).bearer_auth(token).form(params))
            .await
            .map(|_| ())
    }

    pub(crate) async fn patch_form(&self, url: &str, params: &[(String, String)]) -> Result<()> {
        self.send_authenticated(|http, token| http.patch(url).bearer_auth(token).form(params))
            .await
            .map(|_| ())
    }

    pub(crate) async fn delete(&self, url: &str) -> Result<()> {
        self.send_authenticated(|http, token| http.delete(url).bearer_auth(token))
            .await
            .map(|_| ())
    }
}
