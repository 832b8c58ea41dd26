//! Error types for flowcam_viz.

use thiserror::Error;

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, VizError>;

/// Errors raised while rendering or persisting visualizations.
#[derive(Error, Debug)]
pub enum VizError {
    /// Nothing to draw.
    #[error("Empty image: {0}")]
    EmptyImage(String),

    /// Rendering settings out of range.
    #[error("Invalid visualization config: {0}")]
    InvalidConfig(String),

    /// Vector drawing failed, including missing fonts.
    #[error("Plot error: {0}")]
    Plot(String),

    /// PNG encoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
