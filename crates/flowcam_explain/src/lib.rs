//! # flowcam_explain
//!
//! Grad-CAM for flowcam classifiers.
//!
//! This crate provides:
//! - [`find_last_spatial_layer`], the layer locator
//! - [`compute_gradient`], one forward and one backward pass capturing a
//!   layer's activation and the gradient of a class score at it
//! - [`reduce`], the channel-weighted, clipped and normalised heatmap
//! - [`GradCam`] tying the three together into an [`Explanation`]
//! - [`ActivationCapture`] and [`GradientTap`], reusable layer taps
//!
//! Gradients need an autodiff backend such as
//! [`AutodiffNdArray`](flowcam_core::backend::AutodiffNdArray).
//!
//! ## Example
//!
//! ```rust,ignore
//! use flowcam_explain::grad_cam;
//!
//! let heatmap = grad_cam(&model, &patch.to_tensor(&device), None)?;
//! assert!(heatmap.max() <= 1.0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod capture;
mod error;
mod extractor;
mod gradcam;
mod heatmap;
mod locator;
mod reducer;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{ActivationCapture, GradientTap};
pub use error::{ExplainError, Result};
pub use extractor::{compute_gradient, LayerGradients};
pub use gradcam::{grad_cam, Explanation, GradCam, GradCamConfig};
pub use heatmap::Heatmap;
pub use locator::{find_last_spatial_layer, resolve_layer};
pub use reducer::{pooled_weights, reduce};
