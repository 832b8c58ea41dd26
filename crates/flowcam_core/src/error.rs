//! Error types for flowcam_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors raised while building patches, shapes and class labels.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid patch shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Dimension error.
    #[error("Dimension error: expected {expected} dimensions, got {got}")]
    DimensionError {
        /// Expected number of dimensions.
        expected: usize,
        /// Actual number of dimensions.
        got: usize,
    },

    /// Class index outside of the vortex label set.
    #[error("Unknown class index {index} (expected < {n_classes})")]
    UnknownClass {
        /// Offending index.
        index: usize,
        /// Number of known classes.
        n_classes: usize,
    },

    /// Class label that does not name a vortex category.
    #[error("Unknown class label '{0}'")]
    UnknownLabel(String),

    /// Tensor data could not be converted.
    #[error("Tensor data error: {0}")]
    TensorData(String),
}
