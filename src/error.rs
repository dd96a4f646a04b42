use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors surfaced by the Skywatch client.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid credentials. Fatal; retrying cannot succeed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token exchange was rejected by the server. Fatal for the
    /// session instance that attempted it.
    #[error("authentication rejected (status {status}): {body}")]
    Authentication { status: u16, body: String },

    /// Transport-level failure. Transient; safe to retry with backoff.
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// Non-2xx application response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request deadline was exceeded.
    #[error("request timed out")]
    Timeout,

    /// A batch item was never started because the batch was cancelled.
    #[error("cancelled before dispatch")]
    Cancelled,

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Truncate a response body to avoid carrying excessive data in messages
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        // Back off to a char boundary; a fixed byte cut can split a
        // multi-byte character.
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    /// Build an error from a non-2xx application response.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        Error::Http {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// Build an error from a rejected token exchange.
    pub(crate) fn auth_rejected(status: reqwest::StatusCode, body: &str) -> Self {
        Error::Authentication {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// Map a transport error, distinguishing timeouts from other failures.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }

    /// Whether a retry with backoff could plausibly succeed.
    ///
    /// Network failures, timeouts and 5xx responses are transient; rejected
    /// credentials, configuration problems and other 4xx responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
