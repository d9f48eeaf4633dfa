//! Derivative cache configuration

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHE_MAX_BYTES, DEFAULT_CACHE_MAX_ENTRY_BYTES};

fn default_max_bytes() -> u64 {
    DEFAULT_CACHE_MAX_BYTES
}

fn default_max_entry_bytes() -> u64 {
    DEFAULT_CACHE_MAX_ENTRY_BYTES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total byte budget across all entries
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Larger derivatives are served but never stored
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("cache.max_bytes must be > 0".to_string());
        }
        if self.max_entry_bytes == 0 {
            return Err("cache.max_entry_bytes must be > 0".to_string());
        }
        if self.max_entry_bytes > self.max_bytes {
            return Err(format!(
                "cache.max_entry_bytes ({}) cannot exceed cache.max_bytes ({})",
                self.max_entry_bytes, self.max_bytes
            ));
        }
        Ok(())
    }
}
