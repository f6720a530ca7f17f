//! Remote completion-service errors and retry classification.

/// Remote call failure conditions.
///
/// The first four variants are transient: the service (or the network in
/// front of it) may succeed if the call is repeated later. Everything else
/// is a client-side rejection and is surfaced without retrying.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum RemoteErrorKind {
    /// The service rejected the call because a budget was exhausted (HTTP 429)
    #[display("Rate limited: {}", _0)]
    RateLimited(String),
    /// The call did not complete within its timeout
    #[display("Request timed out: {}", _0)]
    Timeout(String),
    /// Upstream server error (HTTP 5xx)
    #[display("HTTP {} server error: {}", status_code, message)]
    Server {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// Connection, DNS or OS-level I/O failure
    #[display("Network error: {}", _0)]
    Network(String),
    /// Malformed request (HTTP 400)
    #[display("Bad request: {}", _0)]
    BadRequest(String),
    /// Missing or invalid credentials (HTTP 401)
    #[display("Unauthorized: {}", _0)]
    Unauthorized(String),
    /// Credentials lack permission (HTTP 403)
    #[display("Forbidden: {}", _0)]
    Forbidden(String),
    /// Unknown model, prompt or endpoint (HTTP 404)
    #[display("Not found: {}", _0)]
    NotFound(String),
    /// Any other client-side rejection (HTTP 4xx)
    #[display("HTTP {} client error: {}", status_code, message)]
    Client {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// A status outside the 2xx, 4xx and 5xx ranges
    #[display("Unexpected HTTP status {}: {}", status_code, message)]
    UnexpectedStatus {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// The batch deadline passed before the item was started
    #[display("Batch deadline elapsed before the item was started")]
    BatchDeadline,
}

impl RemoteErrorKind {
    /// Classify an HTTP status code returned by the remote service.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice_error::RemoteErrorKind;
    ///
    /// assert!(RemoteErrorKind::from_status(429, "slow down").is_retryable());
    /// assert!(RemoteErrorKind::from_status(503, "overloaded").is_retryable());
    /// assert!(!RemoteErrorKind::from_status(401, "bad key").is_retryable());
    /// assert!(!RemoteErrorKind::from_status(302, "moved").is_retryable());
    /// ```
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            400 => RemoteErrorKind::BadRequest(message),
            401 => RemoteErrorKind::Unauthorized(message),
            403 => RemoteErrorKind::Forbidden(message),
            404 => RemoteErrorKind::NotFound(message),
            408 => RemoteErrorKind::Timeout(message),
            429 => RemoteErrorKind::RateLimited(message),
            400..=499 => RemoteErrorKind::Client {
                status_code,
                message,
            },
            500..=599 => RemoteErrorKind::Server {
                status_code,
                message,
            },
            _ => RemoteErrorKind::UnexpectedStatus {
                status_code,
                message,
            },
        }
    }

    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteErrorKind::RateLimited(_)
                | RemoteErrorKind::Timeout(_)
                | RemoteErrorKind::Server { .. }
                | RemoteErrorKind::Network(_)
        )
    }

    /// Short stable label for metrics and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            RemoteErrorKind::RateLimited(_) => "rate_limit",
            RemoteErrorKind::Timeout(_) => "timeout",
            RemoteErrorKind::Server { .. } => "server",
            RemoteErrorKind::Network(_) => "network",
            RemoteErrorKind::BadRequest(_) => "bad_request",
            RemoteErrorKind::Unauthorized(_) => "auth",
            RemoteErrorKind::Forbidden(_) => "forbidden",
            RemoteErrorKind::NotFound(_) => "not_found",
            RemoteErrorKind::Client { .. } => "client",
            RemoteErrorKind::UnexpectedStatus { .. } => "unexpected_status",
            RemoteErrorKind::BatchDeadline => "batch_deadline",
        }
    }
}

/// Remote call error with source location tracking.
///
/// # Examples
///
/// ```
/// use sluice_error::{RemoteError, RemoteErrorKind, RetryableError};
///
/// let err = RemoteError::new(RemoteErrorKind::Network("connection reset".to_string()));
/// assert!(err.is_retryable());
/// assert!(format!("{}", err).contains("connection reset"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Remote Error: {} at line {} in {}", kind, line, file)]
pub struct RemoteError {
    /// The kind of error that occurred
    pub kind: RemoteErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl RemoteError {
    /// Create a new RemoteError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: RemoteErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RemoteErrorKind {
        &self.kind
    }
}

/// Trait for errors that support retry logic.
///
/// Transient errors like 503 (service unavailable), 429 (rate limit),
/// or network timeouts return true. Permanent errors like 401
/// (unauthorized) or 400 (bad request) return false.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for RemoteError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
