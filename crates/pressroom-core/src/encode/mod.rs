//! Image encoding for Pressroom.
//!
//! Encoding goes through the [`HostEncoder`] seam so the pipeline never cares
//! who produces the bytes. [`NativeEncoder`] (the `image` crate) is the
//! default; a host with its own codecs can plug in another implementation.
//!
//! # Examples
//!
//! ```ignore
//! use pressroom_core::encode::{HostEncoder, NativeEncoder};
//! use pressroom_core::ImageFormat;
//!
//! let jpeg = NativeEncoder.encode(&surface, ImageFormat::Jpeg, 0.8).unwrap();
//! println!("Encoded {} bytes", jpeg.len());
//! ```

mod native;

use thiserror::Error;

use crate::decode::DecodedImage;
use crate::format::ImageFormat;

pub use native::{encode_jpeg, quality_percent, NativeEncoder};

/// Errors that can occur while rasterizing or encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The output surface would exceed the size limits
    #[error("Output {width}x{height} is too large to allocate")]
    OutputTooLarge { width: u32, height: u32 },

    /// The encoder failed or produced no data
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
}

/// An image encoder supplied by the host environment.
pub trait HostEncoder {
    /// Encode an RGBA surface.
    ///
    /// `quality` is in `0.0..=1.0`. Lossless formats must accept it without
    /// error even if they ignore it.
    fn encode(&self, surface: &DecodedImage, format: ImageFormat, quality: f32) -> Result<Vec<u8>, EncodeError>;
}

impl<E: HostEncoder + ?Sized> HostEncoder for &E {
    fn encode(&self, surface: &DecodedImage, format: ImageFormat, quality: f32) -> Result<Vec<u8>, EncodeError> {
        (**self).encode(surface, format, quality)
    }
}
