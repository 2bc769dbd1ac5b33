//! Pressroom WASM - WebAssembly bindings for Pressroom
//!
//! This crate provides WASM bindings to expose the pressroom-core functionality
//! to JavaScript/TypeScript applications.
//!
//! # Module Structure
//!
//! - `compress` - Single-file compression and settings helpers
//! - `batch` - Batch compression driven from the page
//! - `worker` - The Web Worker entry point for batch tasks
//! - `types` - WASM-compatible wrapper types
//! - `logging` - `tracing` output to the browser console
//!
//! # Usage
//!
//! ```typescript
//! import init, { compress_image } from '@pressroom/wasm';
//!
//! // Initialize WASM module (must call first)
//! await init();
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const result = compress_image(bytes, file.type, file.name, { quality: 80 });
//! const blob = new Blob([result.bytes()], { type: result.mime_type });
//! ```

use wasm_bindgen::prelude::*;

mod batch;
mod compress;
mod logging;
mod types;
mod worker;

// Re-export public types
pub use batch::JsBatch;
pub use compress::{companion_height, companion_width, compress_image, format_file_size, probe_image};
pub use logging::init_logging;
pub use types::JsCompressionResult;
pub use worker::run_worker_task;

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    init_logging();
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
