//! Image transform engine
//!
//! Turns original image bytes plus a [`TransformSpec`] into derivative bytes:
//! - Resize with `stretch`, `contain` or `cover` fit
//! - Optional re-encode to JPEG, PNG or WebP
//! - Size and pixel-count guards against decompression bombs
//!
//! # URL Format
//!
//! ```text
//! /images/photo.jpg?w=800&h=600&fit=cover&fmt=webp&q=80
//! ```
//!
//! Output is a pure function of `(bytes, spec)`, which is what allows the
//! derivative cache to store each result exactly once.

pub mod config;
pub mod encoder;
pub mod error;
pub mod params;
pub mod processor;

pub use config::TransformConfig;
pub use encoder::{EncodedImage, EncoderFactory, ImageEncoder};
pub use error::TransformError;
pub use params::{FitMode, OutputFormat, TransformSpec};
pub use processor::{plan_resize, ImageTransformEngine, ResizePlan, TransformedImage};

/// A deterministic bytes-to-bytes image transform
///
/// Implementations are CPU bound and are called from a blocking thread.
pub trait TransformEngine: Send + Sync {
    fn transform(
        &self,
        data: &[u8],
        spec: &TransformSpec,
    ) -> Result<TransformedImage, TransformError>;
}
