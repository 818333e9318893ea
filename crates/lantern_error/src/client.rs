//! Inference client errors and retry classification.

/// Inference client error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ClientErrorKind {
    /// Transport failure (refused, reset, DNS). Retried.
    #[display("Connection failed: {}", _0)]
    Connection(String),

    /// Request exceeded the configured timeout. Retried.
    #[display("Request timed out: {}", _0)]
    Timeout(String),

    /// Transient faults persisted through every attempt.
    #[display("Connection failed after {} attempts: {}", attempts, cause)]
    RetriesExhausted {
        /// Total attempts made, including the first
        attempts: u32,
        /// Last underlying cause
        cause: String,
    },

    /// Server answered with a non-success status.
    #[display("Server returned HTTP {}: {}", status, message)]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Server rejected the credentials.
    #[display("Unauthorized (HTTP {})", _0)]
    Unauthorized(u16),

    /// Response body could not be decoded.
    #[display("Malformed response: {}", _0)]
    Decode(String),

    /// A streamed chunk could not be decoded.
    #[display("Stream decode failed: {}", _0)]
    StreamDecode(String),

    /// The per-configuration request queue is full.
    #[display("Request queue saturated (capacity {})", capacity)]
    QueueSaturated {
        /// Number of requests allowed to wait
        capacity: usize,
    },

    /// Model pull did not report success.
    #[display("Model pull failed: {}", _0)]
    PullFailed(String),

    /// Invalid client configuration.
    #[display("Invalid configuration: {}", _0)]
    Configuration(String),

    /// The client has been closed.
    #[display("Client is closed")]
    Closed,
}

impl ClientErrorKind {
    /// Check if this error is a transient fault worth retrying.
    ///
    /// Connection failures, timeouts and the usual overload statuses
    /// (408, 429, 502, 503, 504) are transient. Everything else, including
    /// auth failures and malformed bodies, is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientErrorKind::Connection(_) | ClientErrorKind::Timeout(_) => true,
            ClientErrorKind::Server { status, .. } => {
                matches!(*status, 408 | 429 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Classify error type for metrics labeling.
    pub fn label(&self) -> &'static str {
        match self {
            ClientErrorKind::Connection(_) => "network",
            ClientErrorKind::Timeout(_) => "timeout",
            ClientErrorKind::RetriesExhausted { .. } => "exhausted",
            ClientErrorKind::Server { .. } => "server",
            ClientErrorKind::Unauthorized(_) => "auth",
            ClientErrorKind::Decode(_) => "decode",
            ClientErrorKind::StreamDecode(_) => "stream_decode",
            ClientErrorKind::QueueSaturated { .. } => "saturated",
            ClientErrorKind::PullFailed(_) => "pull",
            ClientErrorKind::Configuration(_) => "config",
            ClientErrorKind::Closed => "closed",
        }
    }
}

/// Inference client error with source location tracking.
///
/// # Examples
///
/// ```
/// use lantern_error::{ClientError, ClientErrorKind, RetryableError};
///
/// let err = ClientError::new(ClientErrorKind::Timeout("30s elapsed".into()));
/// assert!(err.is_retryable());
///
/// let err = ClientError::new(ClientErrorKind::Unauthorized(401));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Client Error: {} at line {} in {}", kind, line, file)]
pub struct ClientError {
    /// The kind of error that occurred
    pub kind: ClientErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ClientError {
    /// Create a new ClientError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ClientErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ClientErrorKind {
        &self.kind
    }
}

/// Errors the client retry policy knows how to classify.
pub trait RetryableError {
    /// Whether another attempt may succeed where this one failed.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ClientError {
    fn is_retryable(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Result type for inference client operations.
pub type ClientResult<T> = Result<T, ClientError>;
