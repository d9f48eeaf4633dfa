//! Image processing implementation
//!
//! decode → (crop) → resize → encode, with size guards before decoding and
//! after encoding.

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::num::NonZeroU32;

use super::config::TransformConfig;
use super::encoder::EncoderFactory;
use super::error::TransformError;
use super::params::{FitMode, OutputFormat, TransformSpec};
use super::TransformEngine;
use crate::constants::DEFAULT_QUALITY;

/// Result of a successful transform
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Source dimensions (width, height)
    pub source_size: (u32, u32),
    /// Output dimensions (width, height)
    pub output_size: (u32, u32),
}

/// Source region to keep before resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Geometry of a transform, computed from source size and spec alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub crop: Option<CropRect>,
    pub width: u32,
    pub height: u32,
}

/// Compute output geometry for a source of `src_w`x`src_h`
pub fn plan_resize(src_w: u32, src_h: u32, spec: &TransformSpec) -> ResizePlan {
    let box_w = spec.width.unwrap_or(src_w);
    let box_h = spec.height.unwrap_or(src_h);

    match spec.fit {
        FitMode::Stretch => ResizePlan {
            crop: None,
            width: box_w,
            height: box_h,
        },
        FitMode::Contain => {
            let scale = f64::min(
                box_w as f64 / src_w as f64,
                box_h as f64 / src_h as f64,
            );
            ResizePlan {
                crop: None,
                width: scale_dimension(src_w, scale),
                height: scale_dimension(src_h, scale),
            }
        }
        FitMode::Cover => {
            // Keep the centered region of the source with the box's aspect ratio
            let src_ratio = src_w as f64 / src_h as f64;
            let box_ratio = box_w as f64 / box_h as f64;
            let (crop_w, crop_h) = if src_ratio > box_ratio {
                let w = (src_h as f64 * box_ratio).round() as u32;
                (w.max(1).min(src_w), src_h)
            } else {
                let h = (src_w as f64 / box_ratio).round() as u32;
                (src_w, h.max(1).min(src_h))
            };

            let crop = if crop_w == src_w && crop_h == src_h {
                None
            } else {
                Some(CropRect {
                    x: (src_w - crop_w) / 2,
                    y: (src_h - crop_h) / 2,
                    width: crop_w,
                    height: crop_h,
                })
            };

            ResizePlan {
                crop,
                width: box_w,
                height: box_h,
            }
        }
    }
}

fn scale_dimension(source: u32, scale: f64) -> u32 {
    ((source as f64 * scale).round() as u32).max(1)
}

/// Transform engine backed by the `image` crate and `fast_image_resize`
#[derive(Debug, Clone)]
pub struct ImageTransformEngine {
    config: TransformConfig,
}

impl ImageTransformEngine {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }
}

impl TransformEngine for ImageTransformEngine {
    fn transform(
        &self,
        data: &[u8],
        spec: &TransformSpec,
    ) -> Result<TransformedImage, TransformError> {
        // 1. Bound memory before touching the decoder
        let size = data.len() as u64;
        if size > self.config.max_source_bytes {
            return Err(TransformError::FileTooLarge {
                size,
                max_size: self.config.max_source_bytes,
            });
        }

        // 2. Identify the source format
        let source_format = image::guess_format(data)
            .map_err(|_| TransformError::unsupported("unrecognized"))?;
        let output_format = match spec.format {
            Some(format) => format,
            None => output_format_for(source_format)?,
        };

        // 3. Check declared dimensions without decoding pixel data
        let (src_w, src_h) = read_dimensions(data, source_format)?;
        if src_w == 0 || src_h == 0 {
            return Err(TransformError::decode_failed("zero image dimension"));
        }
        if src_w as u64 * src_h as u64 > self.config.max_source_pixels {
            return Err(TransformError::image_bomb(
                src_w,
                src_h,
                self.config.max_source_pixels,
            ));
        }

        // 4. Decode, crop, resize
        let img = decode_image(data, source_format)?;
        if img.width() == 0 || img.height() == 0 {
            return Err(TransformError::decode_failed("zero image dimension"));
        }
        let plan = plan_resize(img.width(), img.height(), spec);

        let img = match plan.crop {
            Some(rect) => img.crop_imm(rect.x, rect.y, rect.width, rect.height),
            None => img,
        };
        let img = if img.width() != plan.width || img.height() != plan.height {
            resize_image(&img, plan.width, plan.height)?
        } else {
            img
        };

        // 5. Encode and bound the output
        let quality = spec.quality.unwrap_or(DEFAULT_QUALITY);
        let encoder = EncoderFactory::create(output_format);
        let rgba_data = img.to_rgba8().into_raw();
        let encoded = encoder.encode(&rgba_data, plan.width, plan.height, quality)?;

        let output_size = encoded.data.len() as u64;
        if output_size > self.config.max_output_bytes {
            return Err(TransformError::OutputTooLarge {
                size: output_size,
                max_size: self.config.max_output_bytes,
            });
        }

        Ok(TransformedImage {
            data: encoded.data,
            format: output_format,
            content_type: encoded.content_type,
            source_size: (src_w, src_h),
            output_size: (plan.width, plan.height),
        })
    }
}

/// Output format when the request does not name one
///
/// GIF has no encoder here; it becomes PNG to keep transparency.
fn output_format_for(source: ImageFormat) -> Result<OutputFormat, TransformError> {
    match source {
        ImageFormat::Jpeg => Ok(OutputFormat::Jpeg),
        ImageFormat::Png | ImageFormat::Gif => Ok(OutputFormat::Png),
        ImageFormat::WebP => Ok(OutputFormat::WebP),
        other => Err(TransformError::unsupported(format!("{:?}", other))),
    }
}

fn read_dimensions(data: &[u8], format: ImageFormat) -> Result<(u32, u32), TransformError> {
    ImageReader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(map_image_error)
}

fn decode_image(data: &[u8], format: ImageFormat) -> Result<DynamicImage, TransformError> {
    image::load_from_memory_with_format(data, format).map_err(map_image_error)
}

fn map_image_error(err: image::ImageError) -> TransformError {
    match err {
        image::ImageError::Unsupported(e) => TransformError::unsupported(e.to_string()),
        other => TransformError::decode_failed(other.to_string()),
    }
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(
    img: &DynamicImage,
    target_w: u32,
    target_h: u32,
) -> Result<DynamicImage, TransformError> {
    let src_width = NonZeroU32::new(img.width())
        .ok_or_else(|| TransformError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| TransformError::resize_failed("Source height is 0"))?;
    let dst_width = NonZeroU32::new(target_w)
        .ok_or_else(|| TransformError::resize_failed("Target width is 0"))?;
    let dst_height = NonZeroU32::new(target_h)
        .ok_or_else(|| TransformError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| TransformError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| TransformError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| TransformError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
