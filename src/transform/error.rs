//! Transform error types
//!
//! Every variant is `Clone` because a single failed transform is handed to
//! every request that was waiting on the same derivative.

use std::fmt;

/// Errors produced by the transform engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    // === Input Errors ===
    /// Source bytes are not in a format the engine can decode
    Unsupported { format: String },
    /// Source bytes could not be decoded
    DecodeFailed { message: String },
    /// Source object is larger than the decode limit
    FileTooLarge { size: u64, max_size: u64 },
    /// Source pixel count exceeds the decode limit (image bomb protection)
    ImageBombDetected {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    // === Processing Errors ===
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to the output format failed
    EncodeFailed { format: String, message: String },
    /// Encoded output exceeds the configured limit
    OutputTooLarge { size: u64, max_size: u64 },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Unsupported { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            TransformError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            TransformError::FileTooLarge { size, max_size } => {
                write!(
                    f,
                    "Source size {} bytes exceeds maximum {} bytes",
                    size, max_size
                )
            }
            TransformError::ImageBombDetected {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
            TransformError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            TransformError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            TransformError::OutputTooLarge { size, max_size } => {
                write!(
                    f,
                    "Output size {} bytes exceeds maximum {} bytes",
                    size, max_size
                )
            }
        }
    }
}

impl std::error::Error for TransformError {}

impl TransformError {
    /// Maps transform errors to HTTP status codes
    ///
    /// - Unsupported → 415
    /// - DecodeFailed → 422 (malformed source)
    /// - FileTooLarge → 413
    /// - ImageBombDetected, OutputTooLarge → 400 (abusive request)
    /// - ResizeFailed, EncodeFailed → 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            TransformError::Unsupported { .. } => 415,
            TransformError::DecodeFailed { .. } => 422,
            TransformError::FileTooLarge { .. } => 413,
            TransformError::ImageBombDetected { .. } | TransformError::OutputTooLarge { .. } => {
                400
            }
            TransformError::ResizeFailed { .. } | TransformError::EncodeFailed { .. } => 500,
        }
    }

    pub fn unsupported(format: impl Into<String>) -> Self {
        TransformError::Unsupported {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        TransformError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        TransformError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        TransformError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn image_bomb(width: u32, height: u32, max_pixels: u64) -> Self {
        TransformError::ImageBombDetected {
            width,
            height,
            pixels: width as u64 * height as u64,
            max_pixels,
        }
    }
}
