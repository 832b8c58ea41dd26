//! ResNet-v1 bottleneck classifier for flow patches.
//!
//! A 3×3 adapter convolution lifts the single-channel patch to three
//! channels, followed by a ResNet backbone (ResNet-101 with the default
//! stage layout) and a dense head on the flattened features.
//!
//! Layer ids follow the Keras ResNet naming: `conv1_conv`, `pool1_pool`,
//! `conv{stage}_block{n}_{i}_conv`, `..._add`, `..._out`.

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;
use flowcam_core::{LayerInfo, LayerKind, LayerTap, PatchShape, VortexClassifier};
use serde::{Deserialize, Serialize};

use super::blocks::{conv_same, conv_valid, window_output, FrozenBatchNorm};

/// Layer id of the input adapter convolution.
pub const ADAPTER_LAYER: &str = "input_adapter";

/// Configuration for [`VortexResNet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResNetConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Height and width of the square input patch.
    pub image_size: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Output channels of the input adapter.
    pub adapter_channels: usize,
    /// Filters of the 7×7 stem convolution.
    pub stem_filters: usize,
    /// Bottleneck blocks per stage.
    pub stage_blocks: Vec<usize>,
    /// Bottleneck width per stage.
    pub stage_filters: Vec<usize>,
    /// Channel expansion of the last bottleneck convolution.
    pub expansion: usize,
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            image_size: 64,
            n_classes: 3,
            adapter_channels: 3,
            stem_filters: 64,
            stage_blocks: vec![3, 4, 23, 3],
            stage_filters: vec![64, 128, 256, 512],
            expansion: 4,
        }
    }
}

impl ResNetConfig {
    /// Create a new config with the ResNet-101 layout.
    pub fn new(in_channels: usize, image_size: usize, n_classes: usize) -> Self {
        Self {
            in_channels,
            image_size,
            n_classes,
            ..Default::default()
        }
    }

    /// ResNet-50 stage layout.
    #[must_use]
    pub fn resnet50(mut self) -> Self {
        self.stage_blocks = vec![3, 4, 6, 3];
        self
    }

    /// Set the stage layout.
    #[must_use]
    pub fn with_stages(mut self, blocks: Vec<usize>, filters: Vec<usize>) -> Self {
        self.stage_blocks = blocks;
        self.stage_filters = filters;
        self
    }

    /// Set the stem width.
    #[must_use]
    pub fn with_stem_filters(mut self, stem_filters: usize) -> Self {
        self.stem_filters = stem_filters;
        self
    }

    /// Spatial size of the backbone output.
    pub fn feature_size(&self) -> usize {
        let stem = window_output(self.image_size, 7, 2, 3);
        let pooled = window_output(stem, 3, 2, 1);
        (1..self.stage_count()).fold(pooled, |size, _| window_output(size, 1, 2, 0))
    }

    /// Channels of the backbone output.
    pub fn feature_channels(&self) -> usize {
        self.stage_filters
            .iter()
            .take(self.stage_count())
            .last()
            .map(|filters| filters * self.expansion)
            .unwrap_or(self.stem_filters)
    }

    fn stage_count(&self) -> usize {
        self.stage_blocks.len().min(self.stage_filters.len())
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> VortexResNet<B> {
        VortexResNet::new(self.clone(), device)
    }
}

/// Bottleneck residual block: 1×1 → 3×3 → 1×1 with an optional projection
/// shortcut.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    shortcut: Option<Conv2d<B>>,
    shortcut_bn: Option<FrozenBatchNorm<B>>,
    conv1: Conv2d<B>,
    bn1: FrozenBatchNorm<B>,
    conv2: Conv2d<B>,
    bn2: FrozenBatchNorm<B>,
    conv3: Conv2d<B>,
    bn3: FrozenBatchNorm<B>,
}

impl<B: Backend> Bottleneck<B> {
    /// Create a new block.
    pub fn new(
        in_channels: usize,
        filters: usize,
        expansion: usize,
        stride: usize,
        project: bool,
        device: &B::Device,
    ) -> Self {
        let out_channels = filters * expansion;
        let (shortcut, shortcut_bn) = if project {
            (
                Some(conv_valid(in_channels, out_channels, 1, stride, device)),
                Some(FrozenBatchNorm::new(out_channels, device)),
            )
        } else {
            (None, None)
        };

        Self {
            shortcut,
            shortcut_bn,
            conv1: conv_valid(in_channels, filters, 1, stride, device),
            bn1: FrozenBatchNorm::new(filters, device),
            conv2: conv_same(filters, filters, 3, device),
            bn2: FrozenBatchNorm::new(filters, device),
            conv3: conv_valid(filters, out_channels, 1, 1, device),
            bn3: FrozenBatchNorm::new(out_channels, device),
        }
    }

    fn has_projection(&self) -> bool {
        self.shortcut.is_some()
    }

    fn layers(&self, prefix: &str, layers: &mut Vec<LayerInfo>) {
        if self.has_projection() {
            layers.push(LayerInfo::conv(format!("{prefix}_0_conv")));
            layers.push(LayerInfo::new(format!("{prefix}_0_bn"), LayerKind::BatchNorm));
        }
        for i in 1..=3 {
            layers.push(LayerInfo::conv(format!("{prefix}_{i}_conv")));
            layers.push(LayerInfo::new(format!("{prefix}_{i}_bn"), LayerKind::BatchNorm));
            if i < 3 {
                layers.push(LayerInfo::new(
                    format!("{prefix}_{i}_relu"),
                    LayerKind::Activation,
                ));
            }
        }
        layers.push(LayerInfo::new(format!("{prefix}_add"), LayerKind::Add));
        layers.push(LayerInfo::new(format!("{prefix}_out"), LayerKind::Activation));
    }

    fn forward_tapped(
        &self,
        x: Tensor<B, 4>,
        prefix: &str,
        tap: &mut dyn LayerTap<B>,
    ) -> Tensor<B, 4> {
        let shortcut = match (&self.shortcut, &self.shortcut_bn) {
            (Some(conv), Some(bn)) => {
                let s = tap.visit(&format!("{prefix}_0_conv"), conv.forward(x.clone()));
                tap.visit(&format!("{prefix}_0_bn"), bn.forward(s))
            }
            _ => x.clone(),
        };

        let out = tap.visit(&format!("{prefix}_1_conv"), self.conv1.forward(x));
        let out = tap.visit(&format!("{prefix}_1_bn"), self.bn1.forward(out));
        let out = tap.visit(&format!("{prefix}_1_relu"), relu(out));

        let out = tap.visit(&format!("{prefix}_2_conv"), self.conv2.forward(out));
        let out = tap.visit(&format!("{prefix}_2_bn"), self.bn2.forward(out));
        let out = tap.visit(&format!("{prefix}_2_relu"), relu(out));

        let out = tap.visit(&format!("{prefix}_3_conv"), self.conv3.forward(out));
        let out = tap.visit(&format!("{prefix}_3_bn"), self.bn3.forward(out));

        let out = tap.visit(&format!("{prefix}_add"), out + shortcut);
        tap.visit(&format!("{prefix}_out"), relu(out))
    }
}

/// A run of bottleneck blocks at one resolution.
#[derive(Module, Debug)]
pub struct ResNetStage<B: Backend> {
    blocks: Vec<Bottleneck<B>>,
}

/// ResNet classifier with a single-channel input adapter.
#[derive(Module, Debug)]
pub struct VortexResNet<B: Backend> {
    adapter: Conv2d<B>,
    stem: Conv2d<B>,
    stem_bn: FrozenBatchNorm<B>,
    pool: MaxPool2d,
    stages: Vec<ResNetStage<B>>,
    head: Linear<B>,
    in_channels: usize,
    image_size: usize,
}

impl<B: Backend> VortexResNet<B> {
    /// Create a new model.
    pub fn new(config: ResNetConfig, device: &B::Device) -> Self {
        let adapter = conv_same(config.in_channels, config.adapter_channels, 3, device);
        let stem = Conv2dConfig::new([config.adapter_channels, config.stem_filters], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);
        let stem_bn = FrozenBatchNorm::new(config.stem_filters, device);
        let pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut stages = Vec::new();
        let mut in_channels = config.stem_filters;
        for (stage, (&n_blocks, &filters)) in config
            .stage_blocks
            .iter()
            .zip(&config.stage_filters)
            .enumerate()
        {
            let stride = if stage == 0 { 1 } else { 2 };
            let mut blocks = Vec::with_capacity(n_blocks);
            for block in 0..n_blocks {
                let first = block == 0;
                blocks.push(Bottleneck::new(
                    in_channels,
                    filters,
                    config.expansion,
                    if first { stride } else { 1 },
                    first,
                    device,
                ));
                in_channels = filters * config.expansion;
            }
            stages.push(ResNetStage { blocks });
        }

        let feature_size = config.feature_size();
        let head = LinearConfig::new(
            config.feature_channels() * feature_size * feature_size,
            config.n_classes,
        )
        .init(device);

        Self {
            adapter,
            stem,
            stem_bn,
            pool,
            stages,
            head,
            in_channels: config.in_channels,
            image_size: config.image_size,
        }
    }

    /// Number of bottleneck blocks.
    pub fn depth(&self) -> usize {
        self.stages.iter().map(|stage| stage.blocks.len()).sum()
    }
}

fn block_prefix(stage: usize, block: usize) -> String {
    // Keras numbers the stem `conv1`, so stages start at `conv2`.
    format!("conv{}_block{}", stage + 2, block + 1)
}

impl<B: Backend> VortexClassifier<B> for VortexResNet<B> {
    fn name(&self) -> &str {
        "resnet"
    }

    fn input_shape(&self) -> PatchShape {
        PatchShape::square(self.in_channels, self.image_size)
    }

    fn n_classes(&self) -> usize {
        let [_, n_classes] = self.head.weight.val().dims();
        n_classes
    }

    fn layers(&self) -> Vec<LayerInfo> {
        let mut layers = vec![
            LayerInfo::conv(ADAPTER_LAYER),
            LayerInfo::conv("conv1_conv"),
            LayerInfo::new("conv1_bn", LayerKind::BatchNorm),
            LayerInfo::new("conv1_relu", LayerKind::Activation),
            LayerInfo::new("pool1_pool", LayerKind::MaxPool),
        ];
        for (s, stage) in self.stages.iter().enumerate() {
            for (b, block) in stage.blocks.iter().enumerate() {
                block.layers(&block_prefix(s, b), &mut layers);
            }
        }
        layers.push(LayerInfo::new("flatten", LayerKind::Flatten));
        layers.push(LayerInfo::new("dense", LayerKind::Dense));
        layers
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        let x = tap.visit(ADAPTER_LAYER, self.adapter.forward(x));
        let x = tap.visit("conv1_conv", self.stem.forward(x));
        let x = tap.visit("conv1_bn", self.stem_bn.forward(x));
        let x = tap.visit("conv1_relu", relu(x));
        let mut x = tap.visit("pool1_pool", self.pool.forward(x));

        for (s, stage) in self.stages.iter().enumerate() {
            for (b, block) in stage.blocks.iter().enumerate() {
                x = block.forward_tapped(x, &block_prefix(s, b), tap);
            }
        }

        self.head.forward(x.flatten::<2>(1, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcam_core::backend::NdArray;

    fn small_config() -> ResNetConfig {
        ResNetConfig::new(1, 16, 3)
            .with_stem_filters(4)
            .with_stages(vec![1, 2], vec![2, 4])
    }

    struct Recorder(Vec<String>);

    impl LayerTap<NdArray> for Recorder {
        fn visit(&mut self, layer: &str, output: Tensor<NdArray, 4>) -> Tensor<NdArray, 4> {
            self.0.push(layer.to_string());
            output
        }
    }

    #[test]
    fn test_default_is_resnet101() {
        let config = ResNetConfig::default();
        let blocks: usize = config.stage_blocks.iter().sum();
        // 3 layers per block, plus stem and head
        assert_eq!(blocks * 3 + 2, 101);
        assert_eq!(config.feature_size(), 2);
        assert_eq!(config.feature_channels(), 2048);
        assert_eq!(config.resnet50().stage_blocks, vec![3, 4, 6, 3]);
    }

    #[test]
    fn test_small_forward() {
        let device = Default::default();
        let config = small_config();
        assert_eq!(config.feature_size(), 2);
        assert_eq!(config.feature_channels(), 16);

        let model = config.init::<NdArray>(&device);
        assert_eq!(model.depth(), 3);

        let x = Tensor::<NdArray, 4>::ones([1, 1, 16, 16], &device);
        assert_eq!(model.forward(x).dims(), [1, 3]);
    }

    #[test]
    fn test_tap_order_matches_layer_table() {
        let device = Default::default();
        let model = small_config().init::<NdArray>(&device);
        let mut recorder = Recorder(Vec::new());

        let x = Tensor::<NdArray, 4>::zeros([1, 1, 16, 16], &device);
        model.forward_tapped(x, &mut recorder);

        let spatial: Vec<String> = model
            .layers()
            .into_iter()
            .filter(|l| l.kind().keeps_spatial_layout())
            .map(|l| l.id().to_string())
            .collect();
        assert_eq!(recorder.0, spatial);
        assert_eq!(recorder.0[0], ADAPTER_LAYER);
        assert!(recorder.0.contains(&"conv3_block2_add".to_string()));
    }

    #[test]
    fn test_projection_only_on_first_block() {
        let device = Default::default();
        let model = small_config().init::<NdArray>(&device);
        let ids: Vec<String> = model.layers().iter().map(|l| l.id().to_string()).collect();

        assert!(ids.contains(&"conv3_block1_0_conv".to_string()));
        assert!(!ids.contains(&"conv3_block2_0_conv".to_string()));

        let last_conv = model.layers().into_iter().rev().find(|l| l.is_spatial());
        assert_eq!(
            last_conv.map(|l| l.id().to_string()).as_deref(),
            Some("conv3_block2_3_conv")
        );
    }
}
