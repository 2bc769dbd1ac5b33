//! Single-file compression bindings.
//!
//! # Functions
//!
//! - [`compress_image`] - Run the whole pipeline for one file
//! - [`probe_image`] - Read format and dimensions from the header only
//! - [`companion_height`] / [`companion_width`] - Aspect-locked dimension helpers
//! - [`format_file_size`] - Human-readable byte counts
//!
//! # Example
//!
//! ```typescript
//! import { compress_image, format_file_size } from '@pressroom/wasm';
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const result = compress_image(bytes, file.type, file.name, { quality: 75, outputFormat: 'webp' });
//! console.log(`${format_file_size(result.byte_size)} (${result.reduction_percent.toFixed(1)}% smaller)`);
//! ```

use pressroom_core::settings::{
    aspect_ratio, companion_height as core_companion_height, companion_width as core_companion_width,
};
use pressroom_core::{compress_file, probe, InputFile, NativeEncoder, PipelineOptions};
use wasm_bindgen::prelude::*;

use crate::types::{error_to_js, settings_from_js, JsCompressionResult};

/// Compress one image file.
///
/// # Arguments
///
/// * `bytes` - The raw file contents
/// * `mime_type` - The file's declared MIME type (`File.type`)
/// * `file_name` - Used to derive the suggested download name
/// * `settings` - UI settings object (camelCase); `undefined` for defaults
///
/// # Errors
///
/// Throws a `{ kind, message }` object, where `kind` is one of
/// `validation`, `unsupportedFormat`, `decode` or `encode`.
#[wasm_bindgen]
pub fn compress_image(
    bytes: Vec<u8>,
    mime_type: &str,
    file_name: &str,
    settings: JsValue,
) -> Result<JsCompressionResult, JsValue> {
    let raw = settings_from_js(settings)?;
    let file = InputFile::new(file_name, mime_type, bytes);

    compress_file(file, &raw, &PipelineOptions::default(), &NativeEncoder)
        .map(JsCompressionResult::from)
        .map_err(|e| error_to_js(&e))
}

/// Read `{ format, width, height }` from a file header without decoding pixels.
///
/// Dimensions are as displayed, after EXIF orientation.
#[wasm_bindgen]
pub fn probe_image(bytes: &[u8], mime_type: &str) -> Result<JsValue, JsValue> {
    let info = probe(bytes, mime_type).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&info).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Height matching `width` for a source of the given dimensions.
#[wasm_bindgen]
pub fn companion_height(source_width: u32, source_height: u32, width: u32) -> Result<u32, JsValue> {
    let ratio = aspect_ratio(source_width, source_height).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(core_companion_height(width, ratio))
}

/// Width matching `height` for a source of the given dimensions.
#[wasm_bindgen]
pub fn companion_width(source_width: u32, source_height: u32, height: u32) -> Result<u32, JsValue> {
    let ratio = aspect_ratio(source_width, source_height).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(core_companion_width(height, ratio))
}

/// Format a byte count, e.g. `"1.5 KB"`.
#[wasm_bindgen]
pub fn format_file_size(bytes: usize) -> String {
    pressroom_core::format_file_size(bytes)
}

/// Tests for compress bindings.
///
/// Functions returning `Result<T, JsValue>` only work on wasm32 targets; the
/// pipeline itself is covered in `pressroom_core`.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(1536), "1.5 KB");
    }
}
