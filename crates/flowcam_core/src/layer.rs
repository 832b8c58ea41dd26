//! Layer records describing a classifier's internal structure.

use serde::{Deserialize, Serialize};

/// Kind of an internal classifier layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// 2-D convolution; produces a multi-channel spatial feature map.
    Conv2d,
    /// Element-wise activation.
    Activation,
    /// Batch normalisation.
    BatchNorm,
    /// Spatial max pooling.
    MaxPool,
    /// Nearest-neighbour up-sampling.
    UpSample,
    /// Channel concatenation of two feature maps.
    Concatenate,
    /// Element-wise residual addition.
    Add,
    /// Flatten to a feature vector.
    Flatten,
    /// Fully connected layer.
    Dense,
}

impl LayerKind {
    /// Whether layers of this kind produce a spatial feature map usable for
    /// class-activation mapping.
    #[must_use]
    pub const fn is_spatial_feature_layer(self) -> bool {
        matches!(self, LayerKind::Conv2d)
    }

    /// Whether the layer's output keeps the `(C, H, W)` layout and can be
    /// observed by a [`LayerTap`](crate::LayerTap).
    #[must_use]
    pub const fn keeps_spatial_layout(self) -> bool {
        !matches!(self, LayerKind::Flatten | LayerKind::Dense)
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerKind::Conv2d => "Conv2d",
            LayerKind::Activation => "Activation",
            LayerKind::BatchNorm => "BatchNorm",
            LayerKind::MaxPool => "MaxPool",
            LayerKind::UpSample => "UpSample",
            LayerKind::Concatenate => "Concatenate",
            LayerKind::Add => "Add",
            LayerKind::Flatten => "Flatten",
            LayerKind::Dense => "Dense",
        };
        f.write_str(name)
    }
}

/// One entry of a classifier's layer table.
///
/// The spatial capability is fixed when the record is built, so consumers
/// query a flag instead of inspecting layer types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    id: String,
    kind: LayerKind,
    spatial: bool,
}

impl LayerInfo {
    /// Create a layer record.
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            spatial: kind.is_spatial_feature_layer(),
        }
    }

    /// Shorthand for a convolution record.
    pub fn conv(id: impl Into<String>) -> Self {
        Self::new(id, LayerKind::Conv2d)
    }

    /// Layer identifier, unique within its classifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Layer kind.
    #[must_use]
    pub const fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Whether this layer produces a spatial feature map.
    #[must_use]
    pub const fn is_spatial(&self) -> bool {
        self.spatial
    }
}
