//! Pressroom Core - Image compression library
//!
//! This crate provides the core functionality for Pressroom: resolving user
//! settings against a source image, decoding JPEG/PNG/WebP files, resizing
//! and re-encoding them, and running whole batches with bounded concurrency.
//!
//! The single-file path is [`compress_file`]; batches go through
//! [`BatchOrchestrator`].

pub mod batch;
pub mod decode;
pub mod encode;
pub mod engine;
pub mod format;
pub mod pipeline;
pub mod settings;
pub mod transform;

pub use batch::{
    abort_pair, AbortHandle, AbortSignal, BatchConfig, BatchEntry, BatchEvent, BatchJob, BatchOrchestrator,
    BatchState, Dispatcher, FailureRecord, FileId, InlineDispatcher,
};
pub use decode::{decode, probe, DecodeError, FilterType, SourceImage, SourceInfo};
pub use encode::{EncodeError, HostEncoder, NativeEncoder};
pub use engine::{process, CompressionResult, CompressionSummary, ExportHandle, PipelineOptions};
pub use format::ImageFormat;
pub use pipeline::{compress_file, format_file_size, CompressError, ErrorKind, InputFile};
pub use settings::{resolve, validate, CompressionSettings, RawSettings, ResizeMode, ValidationError};
