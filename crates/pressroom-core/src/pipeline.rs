//! Single-item pipeline: probe, resolve settings, decode, process.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::decode::{decode, probe, DecodeError};
use crate::encode::{EncodeError, HostEncoder};
use crate::engine::{process, CompressionResult, PipelineOptions};
use crate::settings::{resolve, RawSettings, ValidationError};

/// A raw file handed over by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Any failure of the single-item pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Coarse failure category, for the caller's messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    UnsupportedFormat,
    Decode,
    Encode,
    /// The worker running the file failed before reporting a result.
    Worker,
}

impl CompressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompressError::Validation(_) => ErrorKind::Validation,
            CompressError::Decode(DecodeError::UnsupportedFormat(_)) => ErrorKind::UnsupportedFormat,
            CompressError::Decode(_) => ErrorKind::Decode,
            CompressError::Encode(_) => ErrorKind::Encode,
        }
    }
}

/// Run the full pipeline for one file.
///
/// Settings are resolved from the header before the file is decoded, so a
/// `ValidationError` surfaces without any decode work.
pub fn compress_file<E: HostEncoder>(
    file: InputFile,
    raw: &RawSettings,
    options: &PipelineOptions,
    encoder: &E,
) -> Result<CompressionResult, CompressError> {
    let info = probe(&file.bytes, &file.mime_type)?;
    let settings = resolve(raw, &info)?;
    debug!(file = %file.name, ?settings, "settings resolved");

    let source = decode(file.bytes, &file.mime_type, &file.name)?;
    Ok(process(source, &settings, options, encoder)?)
}

/// Human-readable file size in 1024-based units: `"512 B"`, `"1.5 KB"`, `"2 MB"`.
pub fn format_file_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        return format!("{bytes} B");
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
