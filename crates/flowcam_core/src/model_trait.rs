//! Classifier capability traits.
//!
//! Explainability code only talks to classifiers through these traits, so any
//! network that can list its layers and expose a layer's output during a
//! forward pass can be explained.

use burn::prelude::*;

use crate::layer::LayerInfo;
use crate::shape::PatchShape;

/// Hook invoked with the output of every spatial layer during a forward pass.
///
/// The returned tensor is what flows on through the network, so a tap can
/// observe a layer (return the input unchanged) or substitute it, e.g. with a
/// detached leaf that tracks its own gradient.
pub trait LayerTap<B: Backend> {
    /// Visit the output of `layer`.
    fn visit(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// A tap that leaves every layer untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<B: Backend> LayerTap<B> for Passthrough {
    fn visit(&mut self, _layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        output
    }
}

/// Trait for flow-patch classifiers.
///
/// Layers are reported in construction order, which for these feed-forward
/// graphs is also execution order. Every layer whose kind keeps the spatial
/// layout must be passed to the tap under its reported id.
pub trait VortexClassifier<B: Backend> {
    /// Architecture name.
    fn name(&self) -> &str;

    /// Expected shape of a single input patch.
    fn input_shape(&self) -> PatchShape;

    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// Ordered layer table.
    fn layers(&self) -> Vec<LayerInfo>;

    /// Forward pass with a layer tap.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape (batch, channels, height, width)
    /// * `tap` - Hook receiving every spatial layer output
    ///
    /// # Returns
    ///
    /// Logits tensor of shape (batch, n_classes)
    fn forward_tapped(&self, x: Tensor<B, 4>, tap: &mut dyn LayerTap<B>) -> Tensor<B, 2>;

    /// Forward pass returning logits.
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_tapped(x, &mut Passthrough)
    }

    /// Forward pass returning probabilities.
    fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    /// Look up a layer by id.
    fn layer(&self, id: &str) -> Option<LayerInfo> {
        self.layers().into_iter().find(|layer| layer.id() == id)
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;
    use crate::layer::LayerKind;

    /// Two-layer toy network: scale by 2 ("conv"), then sum per sample.
    struct Toy;

    impl VortexClassifier<NdArray> for Toy {
        fn name(&self) -> &str {
            "toy"
        }

        fn input_shape(&self) -> PatchShape {
            PatchShape::square(1, 2)
        }

        fn n_classes(&self) -> usize {
            1
        }

        fn layers(&self) -> Vec<LayerInfo> {
            vec![LayerInfo::conv("scale"), LayerInfo::new("sum", LayerKind::Dense)]
        }

        fn forward_tapped(
            &self,
            x: Tensor<NdArray, 4>,
            tap: &mut dyn LayerTap<NdArray>,
        ) -> Tensor<NdArray, 2> {
            let x = tap.visit("scale", x * 2.0);
            x.flatten::<2>(1, 3).sum_dim(1)
        }
    }

    struct Zeroing;

    impl LayerTap<NdArray> for Zeroing {
        fn visit(&mut self, _layer: &str, output: Tensor<NdArray, 4>) -> Tensor<NdArray, 4> {
            output.zeros_like()
        }
    }

    #[test]
    fn test_passthrough_forward() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::ones([1, 1, 2, 2], &device);
        let out: f32 = Toy.forward(x).into_scalar().elem();
        assert!((out - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_tap_substitutes_output() {
        let device = Default::default();
        let x = Tensor::<NdArray, 4>::ones([1, 1, 2, 2], &device);
        let out: f32 = Toy.forward_tapped(x, &mut Zeroing).into_scalar().elem();
        assert!(out.abs() < 1e-6);
    }

    #[test]
    fn test_layer_lookup() {
        assert!(Toy.layer("scale").unwrap().is_spatial());
        assert!(Toy.layer("missing").is_none());
    }
}
