//! Loading encoded bytes into a [`SourceImage`], with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, DecodedImage, Orientation, SourceImage, SourceInfo};
use crate::format::ImageFormat;

/// Decode an image file into a [`SourceImage`].
///
/// The MIME type is checked first; unsupported types are rejected without
/// touching the bytes. EXIF orientation is applied so the raster matches what
/// a browser would display.
///
/// # Errors
///
/// - `DecodeError::UnsupportedFormat` for MIME types other than JPEG, PNG, WebP
/// - `DecodeError::CorruptOrUnreadable` if the bytes cannot be decoded
pub fn decode(bytes: Vec<u8>, mime_type: &str, file_name: &str) -> Result<SourceImage, DecodeError> {
    let format = supported_format(mime_type)?;
    let orientation = extract_orientation(&bytes);

    let img = reader(&bytes, format)?
        .decode()
        .map_err(|e| DecodeError::CorruptOrUnreadable(e.to_string()))?;

    let raster = DecodedImage::from_rgba_image(apply_orientation(img, orientation).into_rgba8());
    if raster.is_empty() {
        return Err(DecodeError::CorruptOrUnreadable(
            "image has no pixels".to_string(),
        ));
    }

    Ok(SourceImage::new(bytes, format, file_name.to_string(), raster))
}

/// Read format and displayed dimensions from the header only.
///
/// Much cheaper than [`decode`]; used to resolve per-file settings before a
/// file is handed to a worker.
pub fn probe(bytes: &[u8], mime_type: &str) -> Result<SourceInfo, DecodeError> {
    let format = supported_format(mime_type)?;

    let (width, height) = reader(bytes, format)?
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptOrUnreadable(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(DecodeError::CorruptOrUnreadable(format!(
            "invalid dimensions {width}x{height}"
        )));
    }

    let (width, height) = if extract_orientation(bytes).swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    };

    Ok(SourceInfo {
        format,
        width,
        height,
    })
}

fn supported_format(mime_type: &str) -> Result<ImageFormat, DecodeError> {
    ImageFormat::from_mime(mime_type).ok_or_else(|| DecodeError::UnsupportedFormat(mime_type.to_string()))
}

/// Build a reader that trusts the content over the declared type, falling back
/// to the declared type when sniffing fails.
fn reader(bytes: &[u8], format: ImageFormat) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    let mut reader = ImageReader::new(Cursor::new(bytes));
    reader.set_format(format.to_image_format());
    reader
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptOrUnreadable(e.to_string()))
}

/// Returns `Orientation::Normal` if no EXIF data is found.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
