// Error types module

use crate::transform::TransformError;

/// Centralized error type for the request path
///
/// `Clone` so that one failed derivative computation can be delivered to
/// every request that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// Client supplied a malformed or out-of-range transform parameter
    #[error("Invalid parameter '{param}': {message}")]
    InvalidSpec { param: String, message: String },

    /// Object key in the path is empty or unsafe
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// Object store reported the key as missing
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Object store failed or the object changed underneath the request
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    /// Transform engine rejected or failed on the source
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A bounded call exceeded its deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// Anything else (panicked worker, closed channel)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn invalid_spec(param: impl Into<String>, message: impl Into<String>) -> Self {
        ProxyError::InvalidSpec {
            param: param.into(),
            message: message.into(),
        }
    }

    /// HTTP status code for this error
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::InvalidSpec { .. } | ProxyError::InvalidKey(_) => 400,
            ProxyError::ObjectNotFound(_) => 404,
            ProxyError::StoreUnavailable(_) | ProxyError::Timeout { .. } => 503,
            ProxyError::Transform(e) => e.to_http_status(),
            ProxyError::Internal(_) => 500,
        }
    }

    /// Short error title used in JSON error bodies
    pub fn title(&self) -> &'static str {
        match self.to_http_status() {
            400 => "Bad Request",
            404 => "Not Found",
            413 => "Payload Too Large",
            415 => "Unsupported Media Type",
            422 => "Unprocessable Entity",
            503 => "Service Temporarily Unavailable",
            _ => "Internal Server Error",
        }
    }

    /// Whether a client may reasonably retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProxyError::StoreUnavailable(_) | ProxyError::Timeout { .. }
        )
    }
}
