//! Plain convolutional vortex classifier.

use burn::nn::conv::Conv2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;
use flowcam_core::{LayerInfo, LayerKind, LayerTap, PatchShape, VortexClassifier};
use serde::{Deserialize, Serialize};

use super::blocks::{conv_same, FrozenBatchNorm};

/// Configuration for [`VortexCnn`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CnnConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Height and width of the square input patch.
    pub image_size: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Filters of each convolution block.
    pub filters: Vec<usize>,
    /// Widths of the hidden dense layers.
    pub hidden: Vec<usize>,
    /// Convolution kernel size.
    pub kernel_size: usize,
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            image_size: 64,
            n_classes: 3,
            filters: vec![512, 256, 128],
            hidden: vec![1024, 512],
            kernel_size: 3,
        }
    }
}

impl CnnConfig {
    /// Create a new config.
    pub fn new(in_channels: usize, image_size: usize, n_classes: usize) -> Self {
        Self {
            in_channels,
            image_size,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the block filters.
    #[must_use]
    pub fn with_filters(mut self, filters: Vec<usize>) -> Self {
        self.filters = filters;
        self
    }

    /// Set the hidden dense widths.
    #[must_use]
    pub fn with_hidden(mut self, hidden: Vec<usize>) -> Self {
        self.hidden = hidden;
        self
    }

    /// Spatial size after the last pooling layer.
    pub fn feature_size(&self) -> usize {
        self.filters
            .iter()
            .fold(self.image_size, |size, _| size / 2)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VortexCnn<B> {
        VortexCnn::new(self.clone(), device)
    }
}

/// Conv → ReLU → BatchNorm → MaxPool.
#[derive(Module, Debug)]
pub struct CnnBlock<B: Backend> {
    conv: Conv2d<B>,
    bn: FrozenBatchNorm<B>,
    pool: MaxPool2d,
}

impl<B: Backend> CnnBlock<B> {
    /// Create a new block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            conv: conv_same(in_channels, out_channels, kernel_size, device),
            bn: FrozenBatchNorm::new(out_channels, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    fn forward_tapped(
        &self,
        x: Tensor<B, 4>,
        index: usize,
        tap: &mut dyn LayerTap<B>,
    ) -> Tensor<B, 4> {
        let x = tap.visit(&format!("conv{index}"), self.conv.forward(x));
        let x = tap.visit(&format!("relu{index}"), relu(x));
        let x = tap.visit(&format!("bn{index}"), self.bn.forward(x));
        tap.visit(&format!("pool{index}"), self.pool.forward(x))
    }
}

/// Convolutional classifier for flow patches.
///
/// Stacked conv blocks, then a dense head over the flattened features.
#[derive(Module, Debug)]
pub struct VortexCnn<B: Backend> {
    blocks: Vec<CnnBlock<B>>,
    hidden: Vec<Linear<B>>,
    head: Linear<B>,
    in_channels: usize,
    image_size: usize,
}

impl<B: Backend> VortexCnn<B> {
    /// Create a new model.
    pub fn new(config: CnnConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.filters.len());
        let mut in_channels = config.in_channels;
        for &out_channels in &config.filters {
            blocks.push(CnnBlock::new(
                in_channels,
                out_channels,
                config.kernel_size,
                device,
            ));
            in_channels = out_channels;
        }

        let feature_size = config.feature_size();
        let mut width = in_channels * feature_size * feature_size;
        let mut hidden = Vec::with_capacity(config.hidden.len());
        for &units in &config.hidden {
            hidden.push(LinearConfig::new(width, units).init(device));
            width = units;
        }
        let head = LinearConfig::new(width, config.n_classes).init(device);

        Self {
            blocks,
            hidden,
            head,
            in_channels: config.in_channels,
            image_size: config.image_size,
        }
    }
}

impl<B: Backend> VortexClassifier<B> for VortexCnn<B> {
    fn name(&self) -> &str {
        "cnn"
    }

    fn input_shape(&self) -> PatchShape {
        PatchShape::square(self.in_channels, self.image_size)
    }

    fn n_classes(&self) -> usize {
        let [_, n_classes] = self.head.weight.val().dims();
        n_classes
    }

    fn layers(&self) -> Vec<LayerInfo> {
        let mut layers = Vec::new();
        for n in 1..=self.blocks.len() {
            layers.push(LayerInfo::conv(format!("conv{n}")));
            layers.push(LayerInfo::new(format!("relu{n}"), LayerKind::Activation));
            layers.push(LayerInfo::new(format!("bn{n}"), LayerKind::BatchNorm));
            layers.push(LayerInfo::new(format!("pool{n}"), LayerKind::MaxPool));
        }
        layers.push(LayerInfo::new("flatten", LayerKind::Flatten));
        for n in 1..=self.hidden.len() + 1 {
            layers.push(LayerInfo::new(format!("dense{n}"), LayerKind::Dense));
        }
        layers
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        let mut x = x;
        for (i, block) in self.blocks.iter().enumerate() {
            x = block.forward_tapped(x, i + 1, tap);
        }

        let mut x = x.flatten::<2>(1, 3);
        for dense in &self.hidden {
            x = relu(dense.forward(x));
        }
        self.head.forward(x)
    }
}
