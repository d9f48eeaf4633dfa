//! Object store configuration

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_REGION, DEFAULT_STORE_TIMEOUT_MS};

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bucket holding the original images
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack); AWS when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Use path-style addressing (required by most S3-compatible servers)
    #[serde(default)]
    pub force_path_style: bool,
    /// Static credentials; the default AWS provider chain is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Deadline for each HEAD/GET call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("store.timeout_ms must be > 0".to_string());
        }
        if self.bucket.trim().is_empty() {
            return Err("store.bucket cannot be empty".to_string());
        }
        if self.region.trim().is_empty() {
            return Err("store.region cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!(
                    "store.endpoint '{}' must start with http:// or https://",
                    endpoint
                ));
            }
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(
                "store.access_key and store.secret_key must be set together".to_string(),
            );
        }
        Ok(())
    }
}
