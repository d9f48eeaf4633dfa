//! Response generators for built-in endpoints and error bodies.
//!
//! Functions return `EndpointResponse` instead of writing directly to the
//! session, which keeps them testable without a live connection. The caller
//! writes the response.

use std::time::Instant;

use crate::cache::CacheStats;
use crate::constants::RETRY_AFTER_SECS;
use crate::error::ProxyError;

/// Response from a special endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Extra headers beyond Content-Type/Content-Length
    pub headers: Vec<(&'static str, String)>,
}

impl EndpointResponse {
    /// Create a JSON response with the given status and body.
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Generate response for /health endpoint.
///
/// Returns health status with uptime, version and derivative cache figures.
pub fn handle_health(start_time: Instant, cache: &CacheStats) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "cache": {
            "hits": cache.hits,
            "misses": cache.misses,
            "hit_rate": cache.hit_rate(),
            "evictions": cache.evictions,
            "insertions": cache.insertions,
            "coalesced": cache.coalesced,
            "oversized": cache.oversized,
            "entries": cache.current_item_count,
            "size_bytes": cache.current_size_bytes,
            "max_size_bytes": cache.max_size_bytes,
            "in_flight": cache.in_flight,
        }
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// JSON error body in the `{error, message, status}` shape.
pub fn error_body(status: u16, error: &str, message: &str) -> String {
    serde_json::json!({
        "error": error,
        "message": message,
        "status": status
    })
    .to_string()
}

/// Error response for a failed request.
///
/// Retryable failures (store outage, timeouts) carry `Retry-After`.
pub fn handle_error(err: &ProxyError) -> EndpointResponse {
    let status = err.to_http_status();
    let response = EndpointResponse::json(status, error_body(status, err.title(), &err.to_string()));
    if err.is_retryable() {
        response.with_header("Retry-After", RETRY_AFTER_SECS.to_string())
    } else {
        response
    }
}

pub fn handle_not_found(path: &str) -> EndpointResponse {
    EndpointResponse::json(
        404,
        error_body(404, "Not Found", &format!("No route for path: {}", path)),
    )
}

pub fn handle_method_not_allowed(method: &str) -> EndpointResponse {
    EndpointResponse::json(
        405,
        error_body(
            405,
            "Method Not Allowed",
            &format!("Method {} is not supported; use GET or HEAD", method),
        ),
    )
    .with_header("Allow", "GET, HEAD")
}

/// Server-wide concurrency cap reached.
pub fn handle_overloaded() -> EndpointResponse {
    EndpointResponse::json(
        503,
        error_body(
            503,
            "Service Temporarily Unavailable",
            &format!(
                "Server has reached maximum concurrent request limit. Please retry after {} seconds.",
                RETRY_AFTER_SECS
            ),
        ),
    )
    .with_header("Retry-After", RETRY_AFTER_SECS.to_string())
}
