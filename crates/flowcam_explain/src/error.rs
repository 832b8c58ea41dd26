//! Error types for flowcam_explain.

use thiserror::Error;

/// Result type for explanation operations.
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing a Grad-CAM heatmap.
///
/// A heatmap that is zero everywhere is not an error; it is returned as an
/// all-zero map.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// The classifier has no convolutional layer to explain.
    #[error("No spatial feature layer found in {model}")]
    NoSpatialLayerFound {
        /// Classifier name.
        model: String,
    },

    /// The requested layer id is not in the classifier.
    #[error("Layer '{layer}' not found in {model}")]
    LayerNotFound {
        /// Requested layer id.
        layer: String,
        /// Classifier name.
        model: String,
    },

    /// The requested layer does not produce a spatial map.
    #[error("Layer '{layer}' ({kind}) does not produce a spatial feature map")]
    LayerNotSpatial {
        /// Requested layer id.
        layer: String,
        /// Kind of the layer.
        kind: String,
    },

    /// The backward pass produced no gradient for the captured layer.
    #[error("Gradient computation failed: {0}")]
    GradientComputation(String),

    /// Target class outside the prediction vector.
    #[error("Target class {index} out of range for {n_classes} classes")]
    InvalidTargetClass {
        /// Requested class index.
        index: usize,
        /// Number of classes the classifier predicts.
        n_classes: usize,
    },

    /// Input patch does not match the classifier.
    #[error("Input shape mismatch: classifier expects {expected}, got {got}")]
    InputShape {
        /// Shape the classifier expects.
        expected: String,
        /// Shape of the given patch.
        got: String,
    },

    /// Activation and gradient shapes differ.
    #[error("Shape mismatch: activation {activation:?}, gradient {gradient:?}")]
    ShapeMismatch {
        /// Activation shape `[C, H, W]`.
        activation: [usize; 3],
        /// Gradient shape `[C, H, W]`.
        gradient: [usize; 3],
    },

    /// Tensor data could not be read back.
    #[error("Tensor data error: {0}")]
    Tensor(String),
}
