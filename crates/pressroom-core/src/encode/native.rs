//! Encoder backed by the `image` crate.
//!
//! JPEG honours quality; PNG and WebP are written losslessly and accept but
//! ignore quality, the same contract a browser canvas gives for PNG.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{EncodeError, HostEncoder};
use crate::decode::DecodedImage;
use crate::format::ImageFormat;

/// The default [`HostEncoder`], available natively and inside WASM.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEncoder;

impl HostEncoder for NativeEncoder {
    fn encode(&self, surface: &DecodedImage, format: ImageFormat, quality: f32) -> Result<Vec<u8>, EncodeError> {
        validate(surface)?;
        let (width, height) = (surface.width, surface.height);

        match format {
            ImageFormat::Jpeg => encode_jpeg(&surface.to_rgb_pixels(), width, height, quality_percent(quality)),
            ImageFormat::Png => {
                let mut buffer = Cursor::new(Vec::new());
                PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive)
                    .write_image(&surface.pixels, width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| EncodeError::EncodeFailed(e.to_string()))?;
                Ok(buffer.into_inner())
            }
            ImageFormat::Webp => {
                let mut buffer = Cursor::new(Vec::new());
                WebPEncoder::new_lossless(&mut buffer)
                    .write_image(&surface.pixels, width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| EncodeError::EncodeFailed(e.to_string()))?;
                Ok(buffer.into_inner())
            }
        }
    }
}

/// Map a `0.0..=1.0` quality onto the JPEG encoder's `1..=100` scale.
pub fn quality_percent(quality: f32) -> u8 {
    // NaN casts to 0 and is then clamped up
    ((quality.clamp(0.0, 1.0) * 100.0).round() as u8).clamp(1, 100)
}

/// Encode RGB pixel data to JPEG bytes.
///
/// # Arguments
///
/// * `pixels` - RGB pixel data (3 bytes per pixel, row-major order)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `quality` - JPEG quality (1-100, where 100 is highest quality)
pub fn encode_jpeg(pixels: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected_len = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected_len {
        return Err(EncodeError::InvalidPixelData {
            expected: expected_len,
            actual: pixels.len(),
        });
    }

    let quality = quality.clamp(1, 100);
    let mut buffer = Cursor::new(Vec::new());

    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodeFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

fn validate(surface: &DecodedImage) -> Result<(), EncodeError> {
    if surface.width == 0 || surface.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: surface.width,
            height: surface.height,
        });
    }
    if surface.pixels.len() != surface.expected_len() {
        return Err(EncodeError::InvalidPixelData {
            expected: surface.expected_len(),
            actual: surface.pixels.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::gradient;

    #[test]
    fn test_encode_jpeg_markers() {
        let jpeg = NativeEncoder
            .encode(&gradient(100, 100), ImageFormat::Jpeg, 0.9)
            .unwrap();

        // SOI and EOI markers
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_png_signature() {
        let png = NativeEncoder
            .encode(&gradient(10, 10), ImageFormat::Png, 0.5)
            .unwrap();
        assert_eq!(&png[0..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_encode_webp_signature() {
        let webp = NativeEncoder
            .encode(&gradient(10, 10), ImageFormat::Webp, 0.5)
            .unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[test]
    fn test_lossless_formats_accept_any_quality() {
        for format in [ImageFormat::Png, ImageFormat::Webp] {
            for quality in [0.0, 0.37, 1.0] {
                assert!(NativeEncoder.encode(&gradient(8, 8), format, quality).is_ok());
            }
        }
    }

    #[test]
    fn test_jpeg_quality_affects_size() {
        let img = gradient(128, 128);
        let low = NativeEncoder.encode(&img, ImageFormat::Jpeg, 0.1).unwrap();
        let high = NativeEncoder.encode(&img, ImageFormat::Jpeg, 0.95).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn test_quality_percent_mapping() {
        assert_eq!(quality_percent(0.0), 1);
        assert_eq!(quality_percent(0.8), 80);
        assert_eq!(quality_percent(1.0), 100);
        assert_eq!(quality_percent(7.0), 100);
        assert_eq!(quality_percent(f32::NAN), 1);
    }

    #[test]
    fn test_encode_jpeg_invalid_pixel_data() {
        let pixels = vec![128u8; 99 * 100 * 3];
        assert!(matches!(
            encode_jpeg(&pixels, 100, 100, 90),
            Err(EncodeError::InvalidPixelData { .. })
        ));
    }

    #[test]
    fn test_encode_zero_dimensions() {
        let empty = DecodedImage {
            width: 0,
            height: 4,
            pixels: vec![],
        };
        assert!(matches!(
            NativeEncoder.encode(&empty, ImageFormat::Png, 1.0),
            Err(EncodeError::InvalidDimensions { width: 0, height: 4 })
        ));
    }

    #[test]
    fn test_encode_mismatched_surface() {
        let bad = DecodedImage {
            width: 4,
            height: 4,
            pixels: vec![0u8; 10],
        };
        assert!(matches!(
            NativeEncoder.encode(&bad, ImageFormat::Webp, 1.0),
            Err(EncodeError::InvalidPixelData {
                expected: 64,
                actual: 10
            })
        ));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
