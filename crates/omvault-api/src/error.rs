use thiserror::Error;

/// Top-level error type for the `omvault-api` crate.
///
/// These are internal to the crate: the public polling surface of
/// [`OmvClient`](crate::client::OmvClient) never returns them. Expected
/// failures degrade to a `None` return plus an [`ErrorKind`]
/// classification readable through `last_error()`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (rejected credentials, `authenticated: false` body).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── RPC ─────────────────────────────────────────────────────────
    /// Error envelope returned by the appliance.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Response body was not valid JSON. Carries the raw body for logs.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is the appliance's "your session is gone"
    /// signal, which warrants exactly one silent reconnect-and-retry.
    pub fn is_session_expired(&self) -> bool {
        match self {
            Self::Rpc { code, message } => {
                crate::rpc::SESSION_EXPIRED_CODES.contains(code)
                    || crate::rpc::SESSION_EXPIRED_MESSAGES.contains(&message.as_str())
            }
            _ => false,
        }
    }
}

// ── User-facing classification ──────────────────────────────────────

/// Stable classification of a connection failure.
///
/// Surfaced to whatever layer drives the initial setup handshake so a
/// failed `connect()` reads as "wrong password" vs "unreachable host"
/// vs "TLS issue" instead of a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Host unreachable, connection refused, DNS failure, timeout.
    CannotConnect,
    /// Credentials rejected by the appliance.
    InvalidAuth,
    /// Certificate verification failed.
    SslVerifyFailed,
    /// Transport produced no response object at all.
    NoResponse,
    /// Non-success HTTP status from the endpoint.
    Http(u16),
}

impl ErrorKind {
    /// The stable string code for this classification.
    pub fn code(self) -> String {
        match self {
            Self::CannotConnect => "cannot_connect".into(),
            Self::InvalidAuth => "invalid_auth".into(),
            Self::SslVerifyFailed => "ssl_verify_failed".into(),
            Self::NoResponse => "no_response".into(),
            Self::Http(status) => format!("http_{status}"),
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<&Error> for ErrorKind {
    /// Collapse an internal error into its user-facing classification.
    ///
    /// RPC error messages are matched by substring, which is how the
    /// appliance reports credential and certificate failures.
    fn from(err: &Error) -> Self {
        match err {
            Error::Authentication { .. } => Self::InvalidAuth,
            Error::Rpc { message, .. } => {
                if message.contains("Incorrect username or password") {
                    Self::InvalidAuth
                } else if message.contains("certificate verify failed") {
                    Self::SslVerifyFailed
                } else {
                    Self::CannotConnect
                }
            }
            Error::Tls(_) => Self::SslVerifyFailed,
            Error::Transport(e) => {
                if let Some(status) = e.status() {
                    Self::Http(status.as_u16())
                } else if e.is_connect() || e.is_timeout() {
                    Self::CannotConnect
                } else {
                    Self::NoResponse
                }
            }
            Error::Deserialization { .. } => Self::NoResponse,
            Error::InvalidUrl(_) => Self::CannotConnect,
        }
    }
}
