//! Transform & encode engine.
//!
//! [`process`] takes a decoded [`SourceImage`] and resolved settings, sizes
//! and rasterizes the output surface, encodes it and packages the bytes into
//! a [`CompressionResult`]. The source is consumed, so its raster and the
//! intermediate surface are released on every exit path.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::{FilterType, SourceImage};
use crate::encode::{EncodeError, HostEncoder};
use crate::format::ImageFormat;
use crate::settings::CompressionSettings;
use crate::transform::{rasterize, resolve_output_dimensions};

/// Per-pipeline options that are not user settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Resampling filter used when the output size differs from the source
    pub filter: FilterType,
}

/// The output of one successful pipeline run. Owns its encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub encoded_bytes: Vec<u8>,
    pub output_format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub original_byte_size: usize,
    pub original_width: u32,
    pub original_height: u32,
    pub suggested_file_name: String,
}

/// Everything in a [`CompressionResult`] except the bytes.
///
/// Small enough to serialize across a worker boundary or into a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionSummary {
    pub byte_size: usize,
    pub output_format: ImageFormat,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub original_byte_size: usize,
    pub original_width: u32,
    pub original_height: u32,
    pub suggested_file_name: String,
    pub reduction_percent: f64,
}

/// A downloadable view of a result: bytes, name and MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportHandle<'a> {
    pub bytes: &'a [u8],
    pub file_name: &'a str,
    pub mime_type: &'static str,
}

impl CompressionResult {
    /// Size of the encoded output.
    pub fn byte_size(&self) -> usize {
        self.encoded_bytes.len()
    }

    pub fn mime_type(&self) -> &'static str {
        self.output_format.mime_type()
    }

    /// Size reduction relative to the original file, in percent.
    ///
    /// Negative when the output is larger than the input; zero for an empty
    /// original.
    pub fn reduction_percent(&self) -> f64 {
        reduction_percent(self.original_byte_size, self.byte_size())
    }

    pub fn export(&self) -> ExportHandle<'_> {
        ExportHandle {
            bytes: &self.encoded_bytes,
            file_name: &self.suggested_file_name,
            mime_type: self.mime_type(),
        }
    }

    pub fn summary(&self) -> CompressionSummary {
        CompressionSummary {
            byte_size: self.byte_size(),
            output_format: self.output_format,
            mime_type: self.mime_type().to_string(),
            width: self.width,
            height: self.height,
            original_byte_size: self.original_byte_size,
            original_width: self.original_width,
            original_height: self.original_height,
            suggested_file_name: self.suggested_file_name.clone(),
            reduction_percent: self.reduction_percent(),
        }
    }

    /// Reassemble a result that crossed a worker boundary as summary + bytes.
    pub fn from_summary(summary: CompressionSummary, encoded_bytes: Vec<u8>) -> Self {
        Self {
            encoded_bytes,
            output_format: summary.output_format,
            width: summary.width,
            height: summary.height,
            original_byte_size: summary.original_byte_size,
            original_width: summary.original_width,
            original_height: summary.original_height,
            suggested_file_name: summary.suggested_file_name,
        }
    }
}

/// Percentage saved going from `original` to `compressed` bytes.
pub fn reduction_percent(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

/// `<base name>-compressed.<ext>`, with the extension taken from the output
/// format rather than the original name.
pub fn suggested_file_name(original: &str, format: ImageFormat) -> String {
    let base = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => original,
    };
    format!("{base}-compressed.{}", format.extension())
}

/// Resize, rasterize and encode a decoded source.
///
/// # Errors
///
/// - `EncodeError::EncodeFailed` if the encoder fails or returns no data
/// - `EncodeError::InvalidPixelData` / `InvalidDimensions` for a malformed raster
/// - `EncodeError::OutputTooLarge` if the output is over the size limits;
///   nothing is allocated for it
pub fn process<E: HostEncoder>(
    source: SourceImage,
    settings: &CompressionSettings,
    options: &PipelineOptions,
    encoder: &E,
) -> Result<CompressionResult, EncodeError> {
    let (raster, meta) = source.into_raster();
    let dims = resolve_output_dimensions(meta.width, meta.height, &settings.resize);
    debug!(
        file = %meta.file_name,
        from = %format_args!("{}x{}", meta.width, meta.height),
        to = %format_args!("{}x{}", dims.width, dims.height),
        format = %settings.output_format,
        "transforming"
    );

    if !dims.within_limits() {
        return Err(EncodeError::OutputTooLarge {
            width: dims.width,
            height: dims.height,
        });
    }

    let surface = rasterize(raster, dims, options.filter)?;
    let encoded_bytes = encoder.encode(&surface, settings.output_format, settings.quality)?;
    drop(surface);

    if encoded_bytes.is_empty() {
        return Err(EncodeError::EncodeFailed("encoder returned no data".to_string()));
    }

    Ok(CompressionResult {
        encoded_bytes,
        output_format: settings.output_format,
        width: dims.width,
        height: dims.height,
        original_byte_size: meta.byte_size,
        original_width: meta.width,
        original_height: meta.height,
        suggested_file_name: suggested_file_name(&meta.file_name, settings.output_format),
    })
}
