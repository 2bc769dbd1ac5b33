//! Image decoding for Pressroom.
//!
//! This module provides functionality for:
//! - Rejecting unsupported MIME types before any decoding work
//! - Decoding JPEG, PNG and WebP files into RGBA rasters
//! - Reading header-only dimensions so settings can be resolved up front
//!
//! # Architecture
//!
//! Decoding runs inside a worker (a Web Worker in the browser, a blocking
//! thread natively). The functions here are synchronous; the asynchrony lives
//! at the dispatch boundary in [`crate::batch`].
//!
//! # Examples
//!
//! ```ignore
//! use pressroom_core::decode::decode;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let source = decode(bytes, "image/jpeg", "photo.jpg").unwrap();
//! println!("Decoded {}x{} image", source.pixel_width(), source.pixel_height());
//! ```

mod loader;
mod types;

pub use loader::{decode, probe};
pub(crate) use types::SourceMeta;
pub use types::{DecodeError, DecodedImage, FilterType, Orientation, SourceImage, SourceInfo};
