//! Rasterizing a decoded source onto an output-sized surface.

use super::ResolvedOutputDimensions;
use crate::decode::{DecodedImage, FilterType};
use crate::encode::EncodeError;

/// Draw `image` scaled to exactly `dims`.
///
/// Takes the source by value: its buffer is either reused (dimensions already
/// match) or dropped once the scaled surface exists.
///
/// # Errors
///
/// Returns `EncodeError::InvalidPixelData` if the source buffer does not match
/// its declared dimensions.
pub fn rasterize(
    image: DecodedImage,
    dims: ResolvedOutputDimensions,
    filter: FilterType,
) -> Result<DecodedImage, EncodeError> {
    if image.pixels.len() != image.expected_len() {
        return Err(EncodeError::InvalidPixelData {
            expected: image.expected_len(),
            actual: image.pixels.len(),
        });
    }

    // Fast path: nothing to resample
    if image.width == dims.width && image.height == dims.height {
        return Ok(image);
    }

    let expected = image.expected_len();
    let actual = image.pixels.len();
    let rgba = image
        .into_rgba_image()
        .ok_or(EncodeError::InvalidPixelData { expected, actual })?;

    let surface = image::imageops::resize(&rgba, dims.width, dims.height, filter.to_image_filter());

    Ok(DecodedImage::from_rgba_image(surface))
}
