//! Building blocks shared by the classifiers.

use burn::module::Param;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::PaddingConfig2d;
use burn::prelude::*;

/// Epsilon of the batch normalisation layers.
pub const BN_EPSILON: f64 = 1e-3;

/// Batch normalisation with frozen running statistics.
///
/// The classifiers are only ever evaluated, and explanations run on an
/// autodiff backend where burn's `BatchNorm` would switch to batch
/// statistics. This layer always normalises with the stored mean and
/// variance, so autodiff and inference passes agree.
#[derive(Module, Debug)]
pub struct FrozenBatchNorm<B: Backend> {
    gamma: Param<Tensor<B, 1>>,
    beta: Param<Tensor<B, 1>>,
    running_mean: Param<Tensor<B, 1>>,
    running_var: Param<Tensor<B, 1>>,
}

impl<B: Backend> FrozenBatchNorm<B> {
    /// Create an identity-initialised layer for `channels` channels.
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: Param::from_tensor(Tensor::zeros([channels], device)),
            running_var: Param::from_tensor(Tensor::ones([channels], device)),
        }
    }

    /// Forward pass over `(batch, channels, height, width)`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [channels] = self.gamma.val().dims();
        let shape = [1, channels, 1, 1];

        let mean = self.running_mean.val().reshape(shape);
        let std = (self.running_var.val() + BN_EPSILON).sqrt().reshape(shape);
        let gamma = self.gamma.val().reshape(shape);
        let beta = self.beta.val().reshape(shape);

        (x - mean) / std * gamma + beta
    }
}

/// Square convolution with "same" padding. `kernel_size` must be odd.
pub fn conv_same<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

/// Square convolution without padding.
pub fn conv_valid<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    device: &B::Device,
) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Valid)
        .init(device)
}

/// Pad the right and bottom edge by one pixel so a following 2×2 valid
/// convolution keeps the spatial size.
pub fn pad_even_kernel<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    x.pad((0, 1, 0, 1), 0.0)
}

/// Nearest-neighbour 2× up-sampling.
pub fn upsample2x<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [batch, channels, height, width] = x.dims();
    x.reshape([batch, channels, height, 1, width, 1])
        .repeat_dim(3, 2)
        .repeat_dim(5, 2)
        .reshape([batch, channels, height * 2, width * 2])
}

/// Output size of a strided window over `size` pixels.
pub const fn window_output(size: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (size + 2 * padding - kernel) / stride + 1
}
