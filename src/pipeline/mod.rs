// Request pipeline module - per-request context carried through the Pingora hooks

use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

use crate::coordinator::CacheStatus;

/// Request context that holds all information about an HTTP request
/// as it flows through the proxy hooks
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    method: String,
    path: String,
    query_params: HashMap<String, String>,
    started: Instant,
    object_key: Option<String>,
    cache_status: Option<CacheStatus>,
}

impl RequestContext {
    /// Create a new RequestContext
    /// Automatically generates a unique request ID (UUID v4) and starts the request clock
    pub fn new(method: String, path: String) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method,
            path,
            query_params: HashMap::new(),
            started: Instant::now(),
            object_key: None,
            cache_status: None,
        }
    }

    /// Fill in request line details once the session header is available
    pub fn set_request(
        &mut self,
        method: String,
        path: String,
        query_params: HashMap<String, String>,
    ) {
        self.method = method;
        self.path = path;
        self.query_params = query_params;
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Milliseconds since the context was created
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn set_object_key(&mut self, object_key: String) {
        self.object_key = Some(object_key);
    }

    pub fn object_key(&self) -> Option<&str> {
        self.object_key.as_deref()
    }

    pub fn set_cache_status(&mut self, status: CacheStatus) {
        self.cache_status = Some(status);
    }

    pub fn cache_status(&self) -> Option<CacheStatus> {
        self.cache_status
    }
}
