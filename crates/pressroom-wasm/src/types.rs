//! WASM-compatible wrapper types.
//!
//! This module provides JavaScript-friendly types that wrap the core Pressroom
//! types, plus the conversions used at the JS boundary.

use pressroom_core::{CompressError, CompressionResult, FailureRecord, RawSettings};
use wasm_bindgen::prelude::*;

/// A compressed image wrapper for JavaScript.
///
/// # Memory Management
///
/// The encoded bytes live in WASM memory. `bytes()` copies them into a
/// `Uint8Array`, which is what the page wraps in a `Blob` for download.
#[wasm_bindgen]
pub struct JsCompressionResult {
    inner: CompressionResult,
}

#[wasm_bindgen]
impl JsCompressionResult {
    /// Output width in pixels
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    /// Output height in pixels
    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    #[wasm_bindgen(getter)]
    pub fn original_width(&self) -> u32 {
        self.inner.original_width
    }

    #[wasm_bindgen(getter)]
    pub fn original_height(&self) -> u32 {
        self.inner.original_height
    }

    /// Size of the encoded output in bytes
    #[wasm_bindgen(getter)]
    pub fn byte_size(&self) -> usize {
        self.inner.byte_size()
    }

    #[wasm_bindgen(getter)]
    pub fn original_byte_size(&self) -> usize {
        self.inner.original_byte_size
    }

    /// MIME type of the output, e.g. `image/webp`
    #[wasm_bindgen(getter)]
    pub fn mime_type(&self) -> String {
        self.inner.mime_type().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn suggested_file_name(&self) -> String {
        self.inner.suggested_file_name.clone()
    }

    /// Size reduction in percent; negative if the output grew
    #[wasm_bindgen(getter)]
    pub fn reduction_percent(&self) -> f64 {
        self.inner.reduction_percent()
    }

    /// Returns the encoded bytes as a Uint8Array (copied).
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.encoded_bytes.clone()
    }

    /// Everything but the bytes, as a plain object.
    pub fn summary(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.summary()).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Explicitly free WASM memory.
    ///
    /// This is optional - wasm-bindgen's finalizer will handle cleanup automatically.
    pub fn free(self) {}
}

impl From<CompressionResult> for JsCompressionResult {
    fn from(inner: CompressionResult) -> Self {
        Self { inner }
    }
}

/// Parse UI settings; `undefined` or `null` means all defaults.
pub(crate) fn settings_from_js(value: JsValue) -> Result<RawSettings, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(RawSettings::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}

/// Pipeline errors cross the boundary as `{ kind, message }` objects.
pub(crate) fn error_to_js(err: &CompressError) -> JsValue {
    let record = FailureRecord::from(err);
    serde_wasm_bindgen::to_value(&record).unwrap_or_else(|_| JsValue::from_str(&record.message))
}

#[cfg(test)]
mod tests {
    use pressroom_core::ImageFormat;

    use super::*;

    fn result() -> CompressionResult {
        CompressionResult {
            encoded_bytes: vec![7u8; 300],
            output_format: ImageFormat::Webp,
            width: 50,
            height: 25,
            original_byte_size: 1000,
            original_width: 100,
            original_height: 50,
            suggested_file_name: "cat-compressed.webp".to_string(),
        }
    }

    #[test]
    fn test_js_compression_result_getters() {
        let js = JsCompressionResult::from(result());
        assert_eq!((js.width(), js.height()), (50, 25));
        assert_eq!((js.original_width(), js.original_height()), (100, 50));
        assert_eq!(js.byte_size(), 300);
        assert_eq!(js.original_byte_size(), 1000);
        assert_eq!(js.mime_type(), "image/webp");
        assert_eq!(js.suggested_file_name(), "cat-compressed.webp");
        assert!((js.reduction_percent() - 70.0).abs() < 1e-9);
        assert_eq!(js.bytes().len(), 300);
    }
}
