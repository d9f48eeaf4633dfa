//! Server configuration types.
//!
//! Address/port bindings, worker threads, the server-wide concurrent request
//! cap and the fallback Cache-Control header. Default values are sourced from
//! `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_CONTROL, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_THREADS};

// Default connection pool values
fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Number of worker threads (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Requests beyond this are answered with 503 immediately
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Cache-Control for responses whose original carries none
    #[serde(default = "default_cache_control")]
    pub default_cache_control: String,
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("server.address cannot be empty".to_string());
        }
        if self.threads == 0 {
            return Err("server.threads must be > 0".to_string());
        }
        if self.max_concurrent_requests == 0 {
            return Err("server.max_concurrent_requests must be > 0".to_string());
        }
        Ok(())
    }
}
