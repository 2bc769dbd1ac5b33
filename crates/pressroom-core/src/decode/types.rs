//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::ImageFormat;

/// Error types for image decoding operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The MIME type is not one of JPEG, PNG or WebP. Raised before any
    /// decoding is attempted.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The bytes could not be loaded as an image.
    #[error("Corrupt or unreadable image: {0}")]
    CorruptOrUnreadable(String),
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Normal = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90CW = 6,
    Transverse = 7,
    Rotate270CW = 8,
}

impl Orientation {
    /// Returns true if displaying with this orientation swaps width and height.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Format and displayed pixel dimensions of a source, read from its header.
///
/// This is the authoritative aspect-ratio source for settings resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Format declared by the file's MIME type
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// A decoded RGBA raster.
///
/// Serves both as the decoded source and as the output-sized drawing surface.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGBA pixel data in row-major order (4 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Bytes per pixel in `pixels`.
    pub const CHANNELS: usize = 4;

    /// Create a new DecodedImage with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * Self::CHANNELS,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a DecodedImage from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Convert into an image::RgbaImage without copying.
    ///
    /// Returns `None` if the buffer length does not match the dimensions.
    pub fn into_rgba_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels)
    }

    /// Pixel data with the alpha channel dropped (3 bytes per pixel).
    pub fn to_rgb_pixels(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(Self::CHANNELS)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }

    /// Expected buffer length for the current dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::CHANNELS
    }

    /// Get the size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

/// A successfully decoded input file.
///
/// Only [`decode`](super::decode) constructs one, so every `SourceImage` has a
/// non-empty raster and a supported format. Read-only after construction.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    format: ImageFormat,
    file_name: String,
    raster: DecodedImage,
}

impl SourceImage {
    pub(crate) fn new(bytes: Vec<u8>, format: ImageFormat, file_name: String, raster: DecodedImage) -> Self {
        Self {
            bytes,
            format,
            file_name,
            raster,
        }
    }

    /// The original encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size of the original encoded file.
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn pixel_width(&self) -> u32 {
        self.raster.width
    }

    pub fn pixel_height(&self) -> u32 {
        self.raster.height
    }

    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            format: self.format,
            width: self.raster.width,
            height: self.raster.height,
        }
    }

    pub fn raster(&self) -> &DecodedImage {
        &self.raster
    }

    /// Split off the raster, releasing the original bytes.
    pub(crate) fn into_raster(self) -> (DecodedImage, SourceMeta) {
        let meta = SourceMeta {
            file_name: self.file_name,
            byte_size: self.bytes.len(),
            width: self.raster.width,
            height: self.raster.height,
        };
        (self.raster, meta)
    }
}

/// What the encoder still needs to know about a source once its raster is
/// being transformed.
#[derive(Debug, Clone)]
pub(crate) struct SourceMeta {
    pub file_name: String,
    pub byte_size: usize,
    pub width: u32,
    pub height: u32,
}
