// Constants module - centralized default values for configuration
//
// Every tunable that can appear in config.yaml has its default here so the
// serde default functions and the tests agree on a single value.

// =============================================================================
// Server defaults
// =============================================================================

/// Default maximum concurrent requests
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1000;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Cache-Control sent when the source object carries none
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=3600";

/// Route prefix for image requests
pub const IMAGES_PATH_PREFIX: &str = "/images/";

/// Health endpoint path
pub const HEALTH_PATH: &str = "/health";

/// Longest object key accepted (S3 limit)
pub const MAX_OBJECT_KEY_BYTES: usize = 1024;

/// Retry-After seconds sent with overload and store failure responses
pub const RETRY_AFTER_SECS: u64 = 5;

// =============================================================================
// Object store defaults
// =============================================================================

/// Default object store call timeout in milliseconds
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// Transform defaults
// =============================================================================

/// Default maximum requested output width
pub const DEFAULT_MAX_WIDTH: u32 = 4096;

/// Default maximum requested output height
pub const DEFAULT_MAX_HEIGHT: u32 = 4096;

/// Default maximum source object size accepted for decoding (25 MB)
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 25 * 1024 * 1024;

/// Default maximum decoded source pixels (50 megapixels)
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 50_000_000;

/// Default maximum encoded output size (10 MB)
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 10 * 1024 * 1024;

/// Default JPEG quality
pub const DEFAULT_QUALITY: u8 = 80;

/// Default transform timeout in milliseconds
pub const DEFAULT_TRANSFORM_TIMEOUT_MS: u64 = 10_000;

/// Default number of transforms allowed to run at once
pub const DEFAULT_MAX_CONCURRENT_TRANSFORMS: usize = 4;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default derivative cache budget (256 MB)
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 256 * 1024 * 1024;

/// Default largest single derivative kept in cache (10 MB)
pub const DEFAULT_CACHE_MAX_ENTRY_BYTES: u64 = 10 * 1024 * 1024;
