//! # Error Types Module
//!
//! Custom error types for the optimization stage.
//!
//! ## Categories:
//! - `Io`: I/O failures (missing files, permissions) - caught per file
//! - `Image`: raster codec failures (corrupt input, encode errors)
//! - `Svg`: vector cleanup failures (malformed XML)
//! - `Selection`: malformed matcher or test pattern - fails fast at
//!   configuration time, never per file
//! - `UnsupportedFormat`: extension routed to no codec
//! - `UnsupportedParameter`: per-format option the in-process codec
//!   cannot honor
//!
//! Per-file errors are captured into the error ledger and converted to
//! empty results; only `Selection` and `Validation` errors abort a run.

/// Custom error types for image optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("SVG processing error: {0}")]
    Svg(String),

    #[error("Invalid matcher specification: {0}")]
    Selection(#[from] regex::Error),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported codec parameter: {0}")]
    UnsupportedParameter(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
