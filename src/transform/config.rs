use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_TRANSFORMS, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_OUTPUT_BYTES,
    DEFAULT_MAX_SOURCE_BYTES, DEFAULT_MAX_SOURCE_PIXELS, DEFAULT_MAX_WIDTH, DEFAULT_QUALITY,
    DEFAULT_TRANSFORM_TIMEOUT_MS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Maximum allowed requested width (prevents resource abuse)
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Maximum allowed requested height
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// Sources larger than this are rejected before decoding
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: u64,

    /// Sources whose header declares more pixels than this are rejected
    #[serde(default = "default_max_source_pixels")]
    pub max_source_pixels: u64,

    /// Encoded derivatives larger than this are rejected
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,

    /// Quality for JPEG output when `q` is not given
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// Deadline for a single decode/resize/encode
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Transforms allowed to run at once; further misses queue
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_source_bytes: default_max_source_bytes(),
            max_source_pixels: default_max_source_pixels(),
            max_output_bytes: default_max_output_bytes(),
            default_quality: default_quality(),
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl TransformConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err("transform.max_width and transform.max_height must be > 0".to_string());
        }
        if self.max_source_bytes == 0 || self.max_source_pixels == 0 {
            return Err(
                "transform.max_source_bytes and transform.max_source_pixels must be > 0"
                    .to_string(),
            );
        }
        if self.max_output_bytes == 0 {
            return Err("transform.max_output_bytes must be > 0".to_string());
        }
        if !(1..=100).contains(&self.default_quality) {
            return Err(format!(
                "transform.default_quality must be 1-100, got {}",
                self.default_quality
            ));
        }
        if self.timeout_ms == 0 {
            return Err("transform.timeout_ms must be > 0".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("transform.max_concurrent must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}

fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}

fn default_max_source_bytes() -> u64 {
    DEFAULT_MAX_SOURCE_BYTES
}

fn default_max_source_pixels() -> u64 {
    DEFAULT_MAX_SOURCE_PIXELS
}

fn default_max_output_bytes() -> u64 {
    DEFAULT_MAX_OUTPUT_BYTES
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TRANSFORM_TIMEOUT_MS
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_TRANSFORMS
}
