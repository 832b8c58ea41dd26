//! Error types for flowcam_models.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while building, saving or loading classifiers.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Architecture name not recognised.
    #[error("Unknown architecture: {0} (expected one of cnn, resnet, unet)")]
    UnknownArchitecture(String),

    /// Config override could not be applied.
    #[error("Invalid {arch} config: {reason}")]
    InvalidConfig {
        /// Architecture the config was meant for.
        arch: String,
        /// What was wrong.
        reason: String,
    },

    /// Checkpoint metadata names a different architecture than requested.
    #[error("Checkpoint holds a {found} model, expected {expected}")]
    ArchitectureMismatch {
        /// Requested architecture.
        expected: String,
        /// Architecture recorded in the checkpoint.
        found: String,
    },

    /// No architecture given and no metadata next to the weights.
    #[error("No checkpoint metadata at {0} and no architecture given")]
    MissingMetadata(PathBuf),

    /// Failed to save weights or metadata.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Failed to load weights or metadata.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),
}
