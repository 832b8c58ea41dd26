//! # flowcam_models
//!
//! Vortex classifiers for flowcam: CNN, ResNet-101 and U-Net.
//!
//! This crate provides:
//! - [`VortexCnn`], [`VortexResNet`] and [`VortexUNet`], burn modules that
//!   implement [`VortexClassifier`](flowcam_core::VortexClassifier)
//! - [`Architecture`] and [`ModelConfig`] for selecting and configuring a
//!   network by name, with JSON overrides
//! - [`VortexModel`], a classifier of any architecture
//! - [`checkpoint`] for saving and loading weights with their config
//!
//! Batch normalisation uses frozen running statistics and the source
//! networks' dropout is left out, so a forward pass on an autodiff backend
//! computes exactly what inference computes.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arch;
pub mod checkpoint;
mod error;
pub mod registry;

pub use arch::{
    CnnConfig, FrozenBatchNorm, ResNetConfig, UNetConfig, VortexCnn, VortexResNet, VortexUNet,
};
pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointMetadata};
pub use error::{ModelError, Result};
pub use registry::{Architecture, ModelConfig, VortexModel};
