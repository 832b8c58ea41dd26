//! Reduction of an activation and its gradient into a heatmap.

use burn::prelude::*;
use ndarray::Array2;

use crate::error::{ExplainError, Result};
use crate::heatmap::Heatmap;

/// Per-channel importance: the gradient averaged over both spatial axes.
///
/// # Arguments
///
/// * `gradient` - Gradient w.r.t. the activation, `(channels, height, width)`
///
/// # Returns
///
/// Weights of shape `(channels,)`.
pub fn pooled_weights<B: Backend>(gradient: Tensor<B, 3>) -> Tensor<B, 1> {
    let [channels, _, _] = gradient.dims();
    gradient.mean_dim(2).mean_dim(1).reshape([channels])
}

/// Reduce an activation and its gradient to a normalised Grad-CAM heatmap.
///
/// Channels are weighted by [`pooled_weights`], summed, clipped at zero and
/// divided by the maximum.
///
/// # Arguments
///
/// * `activation` - Layer output, `(channels, height, width)`
/// * `gradient` - Gradient of the target score w.r.t. `activation`
///
/// # Returns
///
/// A `(height, width)` heatmap in `[0, 1]`; all zeros when no location has
/// positive importance.
pub fn reduce<B: Backend>(activation: Tensor<B, 3>, gradient: Tensor<B, 3>) -> Result<Heatmap> {
    let dims = activation.dims();
    if dims != gradient.dims() {
        return Err(ExplainError::ShapeMismatch {
            activation: dims,
            gradient: gradient.dims(),
        });
    }
    let [channels, height, width] = dims;

    let weights = pooled_weights(gradient).reshape([channels, 1, 1]);
    let cam = (activation * weights).sum_dim(0).clamp_min(0.0);

    let values = cam
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::Tensor(format!("{e:?}")))?;
    let raw = Array2::from_shape_vec((height, width), values)
        .map_err(|e| ExplainError::Tensor(e.to_string()))?;

    let heatmap = Heatmap::normalize(raw);
    if heatmap.is_degenerate() {
        tracing::debug!(channels, height, width, "no positive class evidence, heatmap is zero");
    }
    Ok(heatmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcam_core::backend::NdArray;
    use ndarray::Array3;
    use proptest::prelude::*;

    type TestBackend = NdArray;

    fn tensor(values: &Array3<f32>) -> Tensor<TestBackend, 3> {
        let (c, h, w) = values.dim();
        let data = TensorData::new(values.iter().copied().collect::<Vec<_>>(), [c, h, w]);
        Tensor::from_data(data, &Default::default())
    }

    #[test]
    fn test_pooled_weights() {
        let gradient = Array3::from_shape_fn((2, 2, 2), |(c, h, w)| {
            if c == 0 {
                (h * 2 + w) as f32
            } else {
                -1.0
            }
        });
        let weights: Vec<f32> = pooled_weights(tensor(&gradient))
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(weights, vec![1.5, -1.0]);
    }

    /// 4×4×8 activation, channel 3 switched off by a zero-mean gradient.
    #[test]
    fn test_hand_computed_4x4x8() {
        // channel k holds (k + 1) * (row + col)
        let activation = Array3::from_shape_fn((8, 4, 4), |(k, r, c)| ((k + 1) * (r + c)) as f32);
        // unit weight everywhere except channel 3, whose gradient averages to zero
        let gradient = Array3::from_shape_fn((8, 4, 4), |(k, r, _)| {
            if k == 3 {
                if r < 2 {
                    1.0
                } else {
                    -1.0
                }
            } else {
                1.0
            }
        });

        let heatmap = reduce(tensor(&activation), tensor(&gradient)).unwrap();

        // sum of (k + 1) for k != 3 is 36 - 4 = 32, so raw = 32 * (r + c),
        // peaking at 192 in the bottom-right corner
        let expected = Array2::from_shape_fn((4, 4), |(r, c)| (r + c) as f32 / 6.0);
        assert_eq!(heatmap.dim(), (4, 4));
        for (got, want) in heatmap.values().iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
        assert_eq!(heatmap.values()[[3, 3]], 1.0);
        assert_eq!(heatmap.values()[[0, 0]], 0.0);
    }

    #[test]
    fn test_negative_weights_give_zero_map() {
        let activation = Array3::from_elem((3, 2, 2), 1.0);
        let gradient = Array3::from_elem((3, 2, 2), -0.5);

        let heatmap = reduce(tensor(&activation), tensor(&gradient)).unwrap();
        assert!(heatmap.is_degenerate());
        assert_eq!(heatmap.dim(), (2, 2));
    }

    #[test]
    fn test_zero_gradient_gives_zero_map() {
        let activation = Array3::from_elem((2, 3, 5), 4.0);
        let gradient = Array3::zeros((2, 3, 5));

        let heatmap = reduce(tensor(&activation), tensor(&gradient)).unwrap();
        assert!(heatmap.values().iter().all(|v| !v.is_nan() && *v == 0.0));
        assert_eq!(heatmap.dim(), (3, 5));
    }

    #[test]
    fn test_shape_mismatch() {
        let activation = Array3::zeros((2, 4, 4));
        let gradient = Array3::zeros((3, 4, 4));

        let err = reduce(tensor(&activation), tensor(&gradient)).unwrap_err();
        assert!(matches!(err, ExplainError::ShapeMismatch { .. }));
    }

    fn maps(len: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-10.0f32..10.0, len)
    }

    proptest! {
        #[test]
        fn prop_heatmap_in_unit_range(activation in maps(3 * 4 * 4), gradient in maps(3 * 4 * 4)) {
            let a = Array3::from_shape_vec((3, 4, 4), activation).unwrap();
            let g = Array3::from_shape_vec((3, 4, 4), gradient).unwrap();

            let heatmap = reduce(tensor(&a), tensor(&g)).unwrap();
            prop_assert!(heatmap.values().iter().all(|v| (0.0..=1.0).contains(v)));

            let max = heatmap.max();
            prop_assert!(max == 1.0 || heatmap.is_degenerate());
        }

        #[test]
        fn prop_renormalizing_is_identity(activation in maps(2 * 3 * 3), gradient in maps(2 * 3 * 3)) {
            let a = Array3::from_shape_vec((2, 3, 3), activation).unwrap();
            let g = Array3::from_shape_vec((2, 3, 3), gradient).unwrap();

            let heatmap = reduce(tensor(&a), tensor(&g)).unwrap();
            prop_assert_eq!(Heatmap::normalize(heatmap.values().clone()), heatmap);
        }
    }
}
