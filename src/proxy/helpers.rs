//! Proxy utility functions.
//!
//! This module contains helper functions for request processing:
//! - Query parameter parsing
//! - Client IP detection (X-Forwarded-For aware)

use std::collections::HashMap;

use pingora_http::RequestHeader;
use pingora_proxy::Session;

/// Extract query parameters from URI.
///
/// Parses the query string from the request URI and returns key-value pairs.
/// Values are URL-decoded. When a key repeats, the first occurrence wins.
pub fn extract_query_params(req: &RequestHeader) -> HashMap<String, String> {
    req.uri
        .query()
        .map(parse_query_string)
        .unwrap_or_default()
}

/// Parse a raw query string (without the leading `?`).
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            params.entry(key.to_string()).or_insert_with(|| {
                urlencoding::decode(value)
                    .map(|v| v.into_owned())
                    .unwrap_or_default()
            });
        }
    }
    params
}

/// Extract client IP address from session (X-Forwarded-For aware).
///
/// The header can contain multiple IPs: `"client, proxy1, proxy2"`.
/// The first IP is the original client, which is what we return.
pub fn get_client_ip(session: &Session) -> String {
    if let Some(forwarded_for) = session
        .req_header()
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(client_ip) = forwarded_for.split(',').next() {
            return client_ip.trim().to_string();
        }
    }

    session
        .client_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
