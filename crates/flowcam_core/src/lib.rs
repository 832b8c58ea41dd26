//! # flowcam_core
//!
//! Core types and traits for flowcam, Grad-CAM explanations of flow-field
//! vortex classifiers.
//!
//! This crate provides:
//! - [`Seed`] for explicit, deterministic initialisation
//! - [`PatchShape`] and [`PatchTensor`] for classifier inputs
//! - [`VortexClass`] labels (CCW, CW, SADDLE)
//! - [`LayerInfo`] layer records with a spatial-feature capability tag
//! - [`VortexClassifier`] and [`LayerTap`], the classifier capability contract
//! - Error types and common utilities
//!
//! ## Shape Convention
//!
//! Patches follow burn's channel-first convention `(C, H, W)`, batched as
//! `(B, C, H, W)`. Flow patches are single-channel 64×64 magnitude images.
//!
//! ## Example
//!
//! ```rust,ignore
//! use flowcam_core::{PatchShape, Seed, VortexClass};
//!
//! let seed = Seed::new(1234);
//! let shape = PatchShape::square(1, 64);
//! let label = VortexClass::from_index(2)?; // SADDLE
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod class;
mod error;
mod layer;
mod model_trait;
mod seed;
mod shape;
mod tensor;

pub use class::{argmax, VortexClass};
pub use error::{CoreError, Result};
pub use layer::{LayerInfo, LayerKind};
pub use model_trait::{LayerTap, Passthrough, VortexClassifier};
pub use seed::{Seed, DEFAULT_SEED};
pub use shape::PatchShape;
pub use tensor::PatchTensor;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-ndarray")]
    pub use burn_autodiff::Autodiff;

    /// CPU backend with automatic differentiation, used for gradient capture.
    #[cfg(feature = "backend-ndarray")]
    pub type AutodiffNdArray = burn_autodiff::Autodiff<burn_ndarray::NdArray>;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;
}
