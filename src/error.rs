/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum WebApiError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Error reported by the Web API in its structured error payload.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Non-success response whose body is not the vendor error JSON.
    #[error("malformed error payload for http {status} {reason}: {detail}; body: {body}")]
    MalformedErrorPayload {
        status: u16,
        reason: String,
        /// What was wrong with the payload.
        detail: String,
        /// Raw response body as received.
        body: String,
    },
    /// The token provider could not produce an access token.
    #[error("token acquisition failed: {0}")]
    Token(String),
    /// The request could not be turned into a valid HTTP request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// A successful response did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid service configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// The caller abandoned the request through its cancellation token.
    #[error("request cancelled")]
    Cancelled,
}

/// Structured error returned by the Web API.
///
/// The service encodes its error code as a hexadecimal string
/// (`"80040217"`); [`ServiceError::code`] holds the parsed value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("http {status_code} {reason_phrase} (code 0x{code:08X}): {message}")]
pub struct ServiceError {
    pub code: u32,
    pub status_code: u16,
    pub reason_phrase: String,
    pub message: String,
}

impl ServiceError {
    /// Returns `true` when the service rejected the call because of its
    /// service protection limits (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        self.status_code == 429
    }

    /// Returns `true` for failures that may succeed if retried later.
    ///
    /// The dispatcher only retries 429 itself; 5xx responses are surfaced
    /// so callers can decide.
    pub fn is_transient(&self) -> bool {
        self.is_rate_limited() || (500..600).contains(&self.status_code)
    }
}
