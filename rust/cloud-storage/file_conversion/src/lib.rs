//! File transformations used by docvault: PDF page operations, raster image operations and ZIP
//! bundling, plus a sequential batch runner.
//!
//! Every operation works on in-memory buffers and is synchronous. Callers running inside an async
//! runtime should move the work onto a blocking thread.

/// ZIP bundling
pub mod archive;
/// Sequential batch execution with per item outcomes
pub mod batch;
/// Conversion errors
pub mod error;
/// Supported file types and their categories
pub mod file_type;
/// Raster image operations
pub mod image_ops;
/// PDF page operations
pub mod pdf;
/// Scratch directories for conversion jobs
pub mod workspace;

pub use error::ConversionError;
pub use file_type::{FileCategory, FileType};

/// Result alias for this crate
pub type Result<T, E = ConversionError> = std::result::Result<T, E>;
