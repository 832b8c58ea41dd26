//! Architecture registry.
//!
//! Classifiers are selected by name and built from a JSON config in which
//! every field is optional; missing fields fall back to the default sizes.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowcam_models::{Architecture, ModelConfig};
//! use serde_json::json;
//!
//! let arch: Architecture = "unet".parse()?;
//! let config = ModelConfig::from_json(arch, &json!({ "base_filters": 32 }))?;
//! let model = config.init::<NdArray>(&device);
//! ```

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;
use flowcam_core::{LayerInfo, LayerTap, PatchShape, Seed, VortexClassifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arch::{CnnConfig, ResNetConfig, UNetConfig, VortexCnn, VortexResNet, VortexUNet};
use crate::error::{ModelError, Result};

/// Supported classifier architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Plain convolutional network.
    Cnn,
    /// ResNet-101 backbone with an input adapter.
    #[serde(rename = "resnet")]
    ResNet,
    /// U-Net with a dense classification head.
    #[serde(rename = "unet", alias = "u_net")]
    UNet,
}

impl Architecture {
    /// All architectures, in the order they are usually compared.
    pub const ALL: [Architecture; 3] = [Architecture::Cnn, Architecture::ResNet, Architecture::UNet];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Cnn => "cnn",
            Architecture::ResNet => "resnet",
            Architecture::UNet => "unet",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cnn" => Ok(Architecture::Cnn),
            "resnet" | "resnet101" | "resnet-101" => Ok(Architecture::ResNet),
            "unet" | "u_net" | "u-net" => Ok(Architecture::UNet),
            _ => Err(ModelError::UnknownArchitecture(s.to_string())),
        }
    }
}

/// Configuration of any supported architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arch", content = "config")]
pub enum ModelConfig {
    /// CNN config.
    #[serde(rename = "cnn")]
    Cnn(CnnConfig),
    /// ResNet config.
    #[serde(rename = "resnet")]
    ResNet(ResNetConfig),
    /// U-Net config.
    #[serde(rename = "unet")]
    UNet(UNetConfig),
}

impl ModelConfig {
    /// Default config for `arch`.
    pub fn default_for(arch: Architecture) -> Self {
        match arch {
            Architecture::Cnn => ModelConfig::Cnn(CnnConfig::default()),
            Architecture::ResNet => ModelConfig::ResNet(ResNetConfig::default()),
            Architecture::UNet => ModelConfig::UNet(UNetConfig::default()),
        }
    }

    /// Build a config for `arch` from a JSON object of overrides.
    ///
    /// `null` selects the defaults.
    pub fn from_json(arch: Architecture, overrides: &Value) -> Result<Self> {
        if overrides.is_null() {
            return Ok(Self::default_for(arch));
        }
        let invalid = |e: serde_json::Error| ModelError::InvalidConfig {
            arch: arch.to_string(),
            reason: e.to_string(),
        };
        let config = match arch {
            Architecture::Cnn => {
                ModelConfig::Cnn(serde_json::from_value(overrides.clone()).map_err(invalid)?)
            }
            Architecture::ResNet => {
                ModelConfig::ResNet(serde_json::from_value(overrides.clone()).map_err(invalid)?)
            }
            Architecture::UNet => {
                ModelConfig::UNet(serde_json::from_value(overrides.clone()).map_err(invalid)?)
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Architecture of this config.
    pub fn architecture(&self) -> Architecture {
        match self {
            ModelConfig::Cnn(_) => Architecture::Cnn,
            ModelConfig::ResNet(_) => Architecture::ResNet,
            ModelConfig::UNet(_) => Architecture::UNet,
        }
    }

    /// Input shape of a single patch.
    pub fn input_shape(&self) -> PatchShape {
        match self {
            ModelConfig::Cnn(c) => PatchShape::square(c.in_channels, c.image_size),
            ModelConfig::ResNet(c) => PatchShape::square(c.in_channels, c.image_size),
            ModelConfig::UNet(c) => PatchShape::square(c.in_channels, c.image_size),
        }
    }

    /// Reject configs that cannot produce a working network.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ModelError::InvalidConfig {
            arch: self.architecture().to_string(),
            reason,
        };
        let shape = self.input_shape();
        if shape.is_empty() {
            return Err(invalid(format!("empty input shape {shape}")));
        }
        match self {
            ModelConfig::Cnn(c) => {
                if c.filters.is_empty() || c.feature_size() == 0 {
                    return Err(invalid(format!(
                        "{} pooling blocks do not fit a {}px patch",
                        c.filters.len(),
                        c.image_size
                    )));
                }
                if c.kernel_size % 2 == 0 {
                    return Err(invalid(format!("kernel size {} must be odd", c.kernel_size)));
                }
            }
            ModelConfig::ResNet(c) => {
                if c.stage_blocks.len() != c.stage_filters.len() || c.stage_blocks.contains(&0) {
                    return Err(invalid(
                        "stage_blocks and stage_filters must pair up with at least one block each"
                            .to_string(),
                    ));
                }
            }
            ModelConfig::UNet(c) => {
                if c.image_size % 8 != 0 {
                    return Err(invalid(format!(
                        "image size {} must be divisible by 8",
                        c.image_size
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the classifier with freshly initialised weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VortexModel<B> {
        match self {
            ModelConfig::Cnn(c) => VortexModel::Cnn(c.init(device)),
            ModelConfig::ResNet(c) => VortexModel::ResNet(c.init(device)),
            ModelConfig::UNet(c) => VortexModel::UNet(c.init(device)),
        }
    }

    /// Build the classifier with weights drawn from `seed`.
    pub fn init_seeded<B: Backend>(&self, seed: Seed, device: &B::Device) -> VortexModel<B> {
        seed.apply::<B>();
        self.init(device)
    }
}

/// A classifier of any supported architecture.
#[derive(Debug)]
pub enum VortexModel<B: Backend> {
    /// CNN.
    Cnn(VortexCnn<B>),
    /// ResNet.
    ResNet(VortexResNet<B>),
    /// U-Net.
    UNet(VortexUNet<B>),
}

impl<B: Backend> VortexModel<B> {
    /// Architecture of the wrapped classifier.
    pub fn architecture(&self) -> Architecture {
        match self {
            VortexModel::Cnn(_) => Architecture::Cnn,
            VortexModel::ResNet(_) => Architecture::ResNet,
            VortexModel::UNet(_) => Architecture::UNet,
        }
    }

    fn as_classifier(&self) -> &dyn VortexClassifier<B> {
        match self {
            VortexModel::Cnn(m) => m,
            VortexModel::ResNet(m) => m,
            VortexModel::UNet(m) => m,
        }
    }
}

impl<B: Backend> VortexClassifier<B> for VortexModel<B> {
    fn name(&self) -> &str {
        self.as_classifier().name()
    }

    fn input_shape(&self) -> PatchShape {
        self.as_classifier().input_shape()
    }

    fn n_classes(&self) -> usize {
        self.as_classifier().n_classes()
    }

    fn layers(&self) -> Vec<LayerInfo> {
        self.as_classifier().layers()
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        self.as_classifier().forward_tapped(x, tap)
    }
}
