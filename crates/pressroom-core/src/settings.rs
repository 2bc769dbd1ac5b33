//! Settings resolution.
//!
//! Turns the raw values collected by the UI (quality slider, resize inputs,
//! output format picker) into a validated [`CompressionSettings`] for one
//! source image. Resolution is a pure function of its inputs: the source's
//! format and pixel dimensions are passed in explicitly, never read from
//! shared state.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::SourceInfo;
use crate::format::ImageFormat;
use crate::transform::{resolve_output_dimensions, ResolvedOutputDimensions, MAX_DIMENSION};

/// Errors raised while validating user settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Quality percent outside `0..=100` (or not a number).
    #[error("Quality must be between 0 and 100, got {0}")]
    InvalidQuality(f64),

    /// A target dimension needed for pixel resizing was not given.
    #[error("Missing target {0}")]
    MissingDimension(Dimension),

    /// A target dimension was zero.
    #[error("Target {0} must be greater than zero")]
    InvalidDimension(Dimension),

    /// Percentage resize without a positive, finite percentage.
    #[error("Resize percentage must be a positive number, got {0:?}")]
    InvalidPercentage(Option<f64>),

    /// The source has a zero dimension, so it has no aspect ratio.
    #[error("Source dimensions {width}x{height} have no aspect ratio")]
    DegenerateSource { width: u32, height: u32 },

    /// The requested output exceeds the size limits.
    #[error("Output {width}x{height} exceeds 32768 pixels per side or 100 megapixels in total")]
    OutputTooLarge { width: u32, height: u32 },
}

/// One of the two resize dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    #[default]
    Width,
    Height,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Width => f.write_str("width"),
            Dimension::Height => f.write_str("height"),
        }
    }
}

/// Resize mode as picked in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawResizeMode {
    #[default]
    Pixels,
    Percentage,
}

/// Output format as picked in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawOutputFormat {
    /// Keep the input's format.
    #[default]
    Same,
    Jpeg,
    Png,
    Webp,
}

/// Settings exactly as the UI collects them.
///
/// Deserializes from a camelCase JS object; omitted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSettings {
    /// Quality in percent (0 to 100)
    pub quality: f64,
    /// Whether resizing is enabled at all
    pub resize_enabled: bool,
    /// Pixels or percentage
    pub resize_mode: RawResizeMode,
    /// Target width in pixels
    pub width: Option<u32>,
    /// Target height in pixels
    pub height: Option<u32>,
    /// Keep the source aspect ratio in pixel mode
    pub maintain_aspect: bool,
    /// Scale in percent (50 = half size)
    pub percentage: Option<f64>,
    /// Requested output format
    pub output_format: RawOutputFormat,
    /// The dimension the user edited last; it drives the other one when the
    /// aspect ratio is locked.
    pub anchor: Dimension,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            quality: 80.0,
            resize_enabled: false,
            resize_mode: RawResizeMode::Pixels,
            width: None,
            height: None,
            maintain_aspect: true,
            percentage: None,
            output_format: RawOutputFormat::Same,
            anchor: Dimension::Width,
        }
    }
}

/// How the output is sized relative to the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ResizeMode {
    /// Keep the source dimensions.
    None,
    /// Exact output dimensions, both positive.
    Absolute { width: u32, height: u32 },
    /// Scale both dimensions by a positive fraction (0.5 = half).
    Percentage { fraction: f64 },
}

/// Normalized settings for one compression run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSettings {
    /// Encoder quality in `0.0..=1.0`
    pub quality: f32,
    pub resize: ResizeMode,
    pub maintain_aspect_ratio: bool,
    /// Concrete output format; "same as input" is already resolved
    pub output_format: ImageFormat,
}

/// Pixel targets as typed, before any source is known.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PixelTarget {
    /// One dimension drives, the other follows the source's aspect ratio.
    Locked(Dimension, u32),
    /// Both dimensions given, aspect ratio free.
    Exact { width: u32, height: u32 },
}

/// Check the parts of `raw` that do not depend on any source image.
///
/// A batch calls this once up front; errors that only show up against a
/// particular file (aspect ratio, scaled output size) are left to [`resolve`].
///
/// # Errors
///
/// The same errors [`resolve`] would report for quality, missing or zero
/// dimensions, a bad percentage, or an exact size over the limits.
pub fn validate(raw: &RawSettings) -> Result<(), ValidationError> {
    resolve_quality(raw.quality)?;
    if !raw.resize_enabled {
        return Ok(());
    }
    match raw.resize_mode {
        RawResizeMode::Pixels => match pixel_target(raw)? {
            PixelTarget::Exact { width, height } => check_limits(ResolvedOutputDimensions { width, height }),
            PixelTarget::Locked(Dimension::Width, width) if width > MAX_DIMENSION => {
                Err(ValidationError::OutputTooLarge { width, height: 1 })
            }
            PixelTarget::Locked(Dimension::Height, height) if height > MAX_DIMENSION => {
                Err(ValidationError::OutputTooLarge { width: 1, height })
            }
            PixelTarget::Locked(..) => Ok(()),
        },
        RawResizeMode::Percentage => resolve_percentage(raw.percentage).map(|_| ()),
    }
}

/// Resolve raw UI settings against one source image.
///
/// # Errors
///
/// Returns a [`ValidationError`] when quality, dimensions or percentage are
/// out of range, or when the resized output would exceed [`MAX_DIMENSION`]
/// or [`MAX_PIXELS`](crate::transform::MAX_PIXELS). No pipeline work should
/// start for a file whose settings fail to resolve.
pub fn resolve(raw: &RawSettings, source: &SourceInfo) -> Result<CompressionSettings, ValidationError> {
    let quality = resolve_quality(raw.quality)?;

    let resize = if raw.resize_enabled {
        match raw.resize_mode {
            RawResizeMode::Pixels => resolve_absolute(raw, source)?,
            RawResizeMode::Percentage => resolve_percentage(raw.percentage)?,
        }
    } else {
        ResizeMode::None
    };

    if resize != ResizeMode::None {
        check_limits(resolve_output_dimensions(source.width, source.height, &resize))?;
    }

    let output_format = match raw.output_format {
        RawOutputFormat::Same => source.format,
        RawOutputFormat::Jpeg => ImageFormat::Jpeg,
        RawOutputFormat::Png => ImageFormat::Png,
        RawOutputFormat::Webp => ImageFormat::Webp,
    };

    Ok(CompressionSettings {
        quality,
        resize,
        maintain_aspect_ratio: raw.maintain_aspect,
        output_format,
    })
}

/// Aspect ratio (`width / height`) of a source.
pub fn aspect_ratio(width: u32, height: u32) -> Result<f64, ValidationError> {
    if width == 0 || height == 0 {
        return Err(ValidationError::DegenerateSource { width, height });
    }
    Ok(width as f64 / height as f64)
}

/// Height that keeps `ratio` for the given width. Never below 1.
pub fn companion_height(width: u32, ratio: f64) -> u32 {
    ((width as f64 / ratio).round() as u32).max(1)
}

/// Width that keeps `ratio` for the given height. Never below 1.
pub fn companion_width(height: u32, ratio: f64) -> u32 {
    ((height as f64 * ratio).round() as u32).max(1)
}

fn resolve_quality(percent: f64) -> Result<f32, ValidationError> {
    // NaN fails the range check too
    if !(0.0..=100.0).contains(&percent) {
        return Err(ValidationError::InvalidQuality(percent));
    }
    Ok((percent / 100.0) as f32)
}

fn pixel_target(raw: &RawSettings) -> Result<PixelTarget, ValidationError> {
    let width = positive(raw.width, Dimension::Width)?;
    let height = positive(raw.height, Dimension::Height)?;

    if raw.maintain_aspect {
        let driver = match raw.anchor {
            Dimension::Width => width
                .map(|w| (Dimension::Width, w))
                .or(height.map(|h| (Dimension::Height, h))),
            Dimension::Height => height
                .map(|h| (Dimension::Height, h))
                .or(width.map(|w| (Dimension::Width, w))),
        };
        driver
            .map(|(dimension, value)| PixelTarget::Locked(dimension, value))
            .ok_or(ValidationError::MissingDimension(raw.anchor))
    } else {
        Ok(PixelTarget::Exact {
            width: width.ok_or(ValidationError::MissingDimension(Dimension::Width))?,
            height: height.ok_or(ValidationError::MissingDimension(Dimension::Height))?,
        })
    }
}

fn resolve_absolute(raw: &RawSettings, source: &SourceInfo) -> Result<ResizeMode, ValidationError> {
    let (width, height) = match pixel_target(raw)? {
        PixelTarget::Exact { width, height } => (width, height),
        PixelTarget::Locked(dimension, value) => {
            let ratio = aspect_ratio(source.width, source.height)?;
            match dimension {
                Dimension::Width => (value, companion_height(value, ratio)),
                Dimension::Height => (companion_width(value, ratio), value),
            }
        }
    };

    Ok(ResizeMode::Absolute { width, height })
}

fn check_limits(dims: ResolvedOutputDimensions) -> Result<(), ValidationError> {
    if dims.within_limits() {
        Ok(())
    } else {
        Err(ValidationError::OutputTooLarge {
            width: dims.width,
            height: dims.height,
        })
    }
}

fn resolve_percentage(percentage: Option<f64>) -> Result<ResizeMode, ValidationError> {
    match percentage {
        Some(p) if p.is_finite() && p > 0.0 => Ok(ResizeMode::Percentage { fraction: p / 100.0 }),
        other => Err(ValidationError::InvalidPercentage(other)),
    }
}

fn positive(value: Option<u32>, dimension: Dimension) -> Result<Option<u32>, ValidationError> {
    match value {
        Some(0) => Err(ValidationError::InvalidDimension(dimension)),
        other => Ok(other),
    }
}


// ============================================================================
// Property-Based Tests
// ============================================================================
