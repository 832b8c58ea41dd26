//! Three-level U-Net used as a patch classifier.
//!
//! The encoder halves the resolution three times, the decoder restores it
//! with up-convolutions and skip concatenations, and a 1×1 sigmoid
//! convolution (`conv10`) produces a single-channel map that a dense layer
//! turns into class logits.

use burn::nn::conv::Conv2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};
use flowcam_core::{LayerInfo, LayerKind, LayerTap, PatchShape, VortexClassifier};
use serde::{Deserialize, Serialize};

use super::blocks::{conv_same, conv_valid, pad_even_kernel, upsample2x};

/// Id of the single-channel head convolution.
pub const HEAD_LAYER: &str = "conv10";

// Encoder levels are numbered 1..=3, the bottleneck 4, decoder stages 7..=9.
const ENCODER_LEVELS: usize = 3;
const BOTTLENECK_LEVEL: usize = ENCODER_LEVELS + 1;
const FIRST_DECODER_LEVEL: usize = 7;

/// Configuration for [`VortexUNet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UNetConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Height and width of the square input patch. Must be divisible by 8.
    pub image_size: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Filters of the first level; each level below doubles them.
    pub base_filters: usize,
}

impl Default for UNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            image_size: 64,
            n_classes: 3,
            base_filters: 64,
        }
    }
}

impl UNetConfig {
    /// Create a new config.
    pub fn new(in_channels: usize, image_size: usize, n_classes: usize) -> Self {
        Self {
            in_channels,
            image_size,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the first-level filters.
    #[must_use]
    pub fn with_base_filters(mut self, base_filters: usize) -> Self {
        self.base_filters = base_filters;
        self
    }

    /// Filters at encoder level `level` (0-based; level 3 is the bottleneck).
    pub fn filters_at(&self, level: usize) -> usize {
        self.base_filters << level
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VortexUNet<B> {
        VortexUNet::new(self.clone(), device)
    }
}

/// Two 3×3 ReLU convolutions.
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    first: Conv2d<B>,
    second: Conv2d<B>,
}

impl<B: Backend> DoubleConv<B> {
    fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        Self {
            first: conv_same(in_channels, out_channels, 3, device),
            second: conv_same(out_channels, out_channels, 3, device),
        }
    }

    fn forward_tapped(
        &self,
        x: Tensor<B, 4>,
        level: usize,
        tap: &mut dyn LayerTap<B>,
    ) -> Tensor<B, 4> {
        let x = tap.visit(&format!("conv{level}_1"), relu(self.first.forward(x)));
        tap.visit(&format!("conv{level}_2"), relu(self.second.forward(x)))
    }

    fn layers(level: usize, layers: &mut Vec<LayerInfo>) {
        layers.push(LayerInfo::conv(format!("conv{level}_1")));
        layers.push(LayerInfo::conv(format!("conv{level}_2")));
    }
}

/// Decoder stage: up-sample, 2×2 up-convolution, skip concatenation and a
/// double convolution.
#[derive(Module, Debug)]
pub struct UpStage<B: Backend> {
    up_conv: Conv2d<B>,
    block: DoubleConv<B>,
}

impl<B: Backend> UpStage<B> {
    fn new(
        in_channels: usize,
        skip_channels: usize,
        out_channels: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            up_conv: conv_valid(in_channels, out_channels, 2, 1, device),
            block: DoubleConv::new(skip_channels + out_channels, out_channels, device),
        }
    }

    fn forward_tapped(
        &self,
        x: Tensor<B, 4>,
        skip: Tensor<B, 4>,
        level: usize,
        tap: &mut dyn LayerTap<B>,
    ) -> Tensor<B, 4> {
        let up = tap.visit(&format!("up{level}_upsample"), upsample2x(x));
        let up = tap.visit(
            &format!("up{level}_conv"),
            relu(self.up_conv.forward(pad_even_kernel(up))),
        );
        let merged = tap.visit(&format!("merge{level}"), Tensor::cat(vec![skip, up], 1));
        self.block.forward_tapped(merged, level, tap)
    }

    fn layers(level: usize, layers: &mut Vec<LayerInfo>) {
        layers.push(LayerInfo::new(format!("up{level}_upsample"), LayerKind::UpSample));
        layers.push(LayerInfo::conv(format!("up{level}_conv")));
        layers.push(LayerInfo::new(format!("merge{level}"), LayerKind::Concatenate));
        DoubleConv::<B>::layers(level, layers);
    }
}

/// U-Net classifier.
#[derive(Module, Debug)]
pub struct VortexUNet<B: Backend> {
    encoder: Vec<DoubleConv<B>>,
    pool: MaxPool2d,
    bottleneck: DoubleConv<B>,
    decoder: Vec<UpStage<B>>,
    head_conv: Conv2d<B>,
    head: Linear<B>,
    in_channels: usize,
    image_size: usize,
}

impl<B: Backend> VortexUNet<B> {
    /// Create a new model.
    pub fn new(config: UNetConfig, device: &B::Device) -> Self {
        let mut encoder = Vec::with_capacity(ENCODER_LEVELS);
        let mut in_channels = config.in_channels;
        for level in 0..ENCODER_LEVELS {
            let filters = config.filters_at(level);
            encoder.push(DoubleConv::new(in_channels, filters, device));
            in_channels = filters;
        }

        let bottleneck = DoubleConv::new(in_channels, config.filters_at(ENCODER_LEVELS), device);
        in_channels = config.filters_at(ENCODER_LEVELS);

        let mut decoder = Vec::with_capacity(ENCODER_LEVELS);
        for level in (0..ENCODER_LEVELS).rev() {
            let filters = config.filters_at(level);
            decoder.push(UpStage::new(in_channels, filters, filters, device));
            in_channels = filters;
        }

        let head_conv = conv_valid(in_channels, 1, 1, 1, device);
        let head = LinearConfig::new(config.image_size * config.image_size, config.n_classes)
            .init(device);

        Self {
            encoder,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            bottleneck,
            decoder,
            head_conv,
            head,
            in_channels: config.in_channels,
            image_size: config.image_size,
        }
    }
}

impl<B: Backend> VortexClassifier<B> for VortexUNet<B> {
    fn name(&self) -> &str {
        "unet"
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
        for level in 1..=self.encoder.len() {
            DoubleConv::<B>::layers(level, &mut layers);
            layers.push(LayerInfo::new(format!("pool{level}"), LayerKind::MaxPool));
        }
        DoubleConv::<B>::layers(BOTTLENECK_LEVEL, &mut layers);
        for i in 0..self.decoder.len() {
            UpStage::<B>::layers(FIRST_DECODER_LEVEL + i, &mut layers);
        }
        layers.push(LayerInfo::conv(HEAD_LAYER));
        layers.push(LayerInfo::new("flatten", LayerKind::Flatten));
        layers.push(LayerInfo::new("dense", LayerKind::Dense));
        layers
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        let mut skips = Vec::with_capacity(self.encoder.len());
        let mut x = x;
        for (i, block) in self.encoder.iter().enumerate() {
            let level = i + 1;
            let features = block.forward_tapped(x, level, tap);
            x = tap.visit(&format!("pool{level}"), self.pool.forward(features.clone()));
            skips.push(features);
        }

        let mut x = self.bottleneck.forward_tapped(x, BOTTLENECK_LEVEL, tap);
        for (i, stage) in self.decoder.iter().enumerate() {
            let Some(skip) = skips.pop() else {
                break;
            };
            x = stage.forward_tapped(x, skip, FIRST_DECODER_LEVEL + i, tap);
        }

        let x = tap.visit(HEAD_LAYER, sigmoid(self.head_conv.forward(x)));
        self.head.forward(x.flatten::<2>(1, 3))
    }
}
