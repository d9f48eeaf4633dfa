//! Transform parameter parsing
//!
//! Query parameters: `?w=800&h=600&fit=cover&fmt=webp&q=80`
//!
//! Absent width/height preserve the source dimension on that axis. The
//! requested box is `(w or source width, h or source height)` and the fit
//! mode decides how the source is reconciled with that box.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::config::TransformConfig;
use crate::error::ProxyError;

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Whether `q` changes the encoded output
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(ProxyError::invalid_spec(
                "fmt",
                format!("unknown format: {}", s),
            )),
        }
    }
}

/// How to reconcile the requested box with the source aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FitMode {
    /// Resize to exactly the requested box (may distort)
    Stretch,
    /// Scale to fit inside the box, preserving aspect ratio
    #[default]
    Contain,
    /// Scale to fill the box, preserving aspect ratio, center-cropping overflow
    Cover,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Stretch => "stretch",
            FitMode::Contain => "contain",
            FitMode::Cover => "cover",
        }
    }
}

impl FromStr for FitMode {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stretch" | "fill" => Ok(FitMode::Stretch),
            "contain" => Ok(FitMode::Contain),
            "cover" => Ok(FitMode::Cover),
            _ => Err(ProxyError::invalid_spec(
                "fit",
                format!("unknown fit mode: {}", s),
            )),
        }
    }
}

/// A validated transform request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransformSpec {
    /// Target width in pixels (None = source width)
    pub width: Option<u32>,
    /// Target height in pixels (None = source height)
    pub height: Option<u32>,
    pub fit: FitMode,
    /// Output format (None = same family as the source)
    pub format: Option<OutputFormat>,
    /// JPEG quality 1-100
    pub quality: Option<u8>,
}

impl TransformSpec {
    /// Parse and validate transform parameters from a query map
    ///
    /// Unknown parameters are ignored. Every recognised parameter is
    /// validated even when the result turns out to be the identity spec, so
    /// `?fit=bogus` is still a client error.
    pub fn from_query(
        params: &HashMap<String, String>,
        config: &TransformConfig,
    ) -> Result<Self, ProxyError> {
        let mut spec = Self::default();

        if let Some(w) = params.get("w") {
            spec.width = Some(parse_dimension("w", w, config.max_width)?);
        }

        if let Some(h) = params.get("h") {
            spec.height = Some(parse_dimension("h", h, config.max_height)?);
        }

        if let Some(fit) = params.get("fit") {
            spec.fit = fit.parse()?;
        }

        // Format (fmt or f)
        if let Some(fmt) = params.get("fmt").or_else(|| params.get("f")) {
            spec.format = Some(fmt.parse()?);
        }

        let quality = match params.get("q") {
            Some(q) => parse_quality(q)?,
            None => config.default_quality,
        };
        spec.quality = Some(quality);

        Ok(spec)
    }

    /// True when the request asks for nothing but the original bytes
    pub fn is_identity(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.format.is_none()
    }

    /// Canonical form used for cache keys
    ///
    /// Quality only survives when the output can be JPEG; two requests that
    /// differ only in `q` for a PNG derivative produce identical bytes.
    pub fn normalized(&self) -> Self {
        let mut spec = *self;
        if let Some(format) = spec.format {
            if !format.is_lossy() {
                spec.quality = None;
            }
        }
        spec
    }
}

fn parse_dimension(param: &str, value: &str, max: u32) -> Result<u32, ProxyError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| ProxyError::invalid_spec(param, "must be a positive integer"))?;

    if parsed <= 0 {
        return Err(ProxyError::invalid_spec(param, "must be greater than 0"));
    }
    if parsed > max as i64 {
        return Err(ProxyError::invalid_spec(
            param,
            format!("must be at most {}", max),
        ));
    }

    Ok(parsed as u32)
}

fn parse_quality(value: &str) -> Result<u8, ProxyError> {
    let quality: u8 = value
        .trim()
        .parse()
        .map_err(|_| ProxyError::invalid_spec("q", "must be 1-100"))?;
    if !(1..=100).contains(&quality) {
        return Err(ProxyError::invalid_spec("q", "must be 1-100"));
    }
    Ok(quality)
}
