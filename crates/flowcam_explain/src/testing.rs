//! Small hand-checkable classifiers for unit tests.

use std::marker::PhantomData;

use burn::prelude::*;
use burn::tensor::activation::relu;
use flowcam_core::{LayerInfo, LayerKind, LayerTap, PatchShape, VortexClassifier};

pub const TOY_LAYER: &str = "stem";
pub const TOY_SIZE: usize = 4;

/// `stem` maps `x` to the channels `[x, -x]`, `stem_relu` clips them, and
/// the logit of class `c` is the sum of channel `c`.
///
/// For a positive input the class-0 gradient at `stem` is one on channel 0
/// and zero on channel 1, so the heatmap is `x / max(x)`.
#[derive(Debug)]
pub struct ToyClassifier<B> {
    _backend: PhantomData<B>,
}

impl<B> Default for ToyClassifier<B> {
    fn default() -> Self {
        Self {
            _backend: PhantomData,
        }
    }
}

impl<B: Backend> VortexClassifier<B> for ToyClassifier<B> {
    fn name(&self) -> &str {
        "toy"
    }

    fn input_shape(&self) -> PatchShape {
        PatchShape::square(1, TOY_SIZE)
    }

    fn n_classes(&self) -> usize {
        2
    }

    fn layers(&self) -> Vec<LayerInfo> {
        vec![
            LayerInfo::conv(TOY_LAYER),
            LayerInfo::new("stem_relu", LayerKind::Activation),
            LayerInfo::new("flatten", LayerKind::Flatten),
            LayerInfo::new("dense", LayerKind::Dense),
        ]
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        let stem = tap.visit(TOY_LAYER, Tensor::cat(vec![x.clone(), x.neg()], 1));
        let out = tap.visit("stem_relu", relu(stem));
        let [batch, channels, _, _] = out.dims();
        out.sum_dim(3).sum_dim(2).reshape([batch, channels])
    }
}

/// A classifier made of dense layers only.
#[derive(Debug)]
pub struct FlatOnly;

impl<B: Backend> VortexClassifier<B> for FlatOnly {
    fn name(&self) -> &str {
        "flat"
    }

    fn input_shape(&self) -> PatchShape {
        PatchShape::square(1, TOY_SIZE)
    }

    fn n_classes(&self) -> usize {
        1
    }

    fn layers(&self) -> Vec<LayerInfo> {
        vec![
            LayerInfo::new("flatten", LayerKind::Flatten),
            LayerInfo::new("dense", LayerKind::Dense),
        ]
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, _tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        x.flatten::<2>(1, 3).sum_dim(1)
    }
}

/// Lists `ghost` without ever visiting it, and visits `dead` but builds
/// the logits from the raw input instead of its output.
#[derive(Debug)]
pub struct DetachedLayers;

impl<B: Backend> VortexClassifier<B> for DetachedLayers {
    fn name(&self) -> &str {
        "detached"
    }

    fn input_shape(&self) -> PatchShape {
        PatchShape::square(1, TOY_SIZE)
    }

    fn n_classes(&self) -> usize {
        2
    }

    fn layers(&self) -> Vec<LayerInfo> {
        vec![
            LayerInfo::conv("ghost"),
            LayerInfo::conv("dead"),
            LayerInfo::new("flatten", LayerKind::Flatten),
            LayerInfo::new("dense", LayerKind::Dense),
        ]
    }

    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2> {
        let _unused = tap.visit("dead", x.clone().mul_scalar(2.0));
        let total = x.flatten::<2>(1, 3).sum_dim(1);
        Tensor::cat(vec![total.clone(), total.neg()], 1)
    }
}
