//! Classifier architectures.
//!
//! All three networks take `(batch, 1, 64, 64)` patches by default and
//! return `(batch, 3)` logits. They report their layers through
//! [`VortexClassifier::layers`](flowcam_core::VortexClassifier::layers) and
//! pass every spatial layer output through the caller's tap.

pub mod blocks;
mod resnet;
mod unet;
mod vortex_cnn;

pub use blocks::FrozenBatchNorm;
pub use resnet::{Bottleneck, ResNetConfig, ResNetStage, VortexResNet, ADAPTER_LAYER};
pub use unet::{DoubleConv, UNetConfig, UpStage, VortexUNet, HEAD_LAYER};
pub use vortex_cnn::{CnnBlock, CnnConfig, VortexCnn};
