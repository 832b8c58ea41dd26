//! Error types for flowcam_data.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while reading flow patches.
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid data shape.
    #[error("Invalid shape in {path}: {reason}")]
    InvalidShape {
        /// File the array was read from.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Patch directory holds no `.npy` files.
    #[error("No .npy patches found in {0}")]
    EmptySource(PathBuf),

    /// File format error.
    #[error("File format error: {0}")]
    FormatError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] flowcam_core::CoreError),
}
