//! Activation and gradient extraction.
//!
//! One forward pass on an autodiff backend captures the chosen layer's
//! output as a fresh leaf together with the logits; one backward pass from
//! the target logit yields the gradient at that leaf.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use flowcam_core::{argmax, PatchTensor, VortexClassifier};

use crate::capture::GradientTap;
use crate::error::{ExplainError, Result};
use crate::locator::resolve_layer;

/// Activation, gradient and prediction for one patch.
#[derive(Debug, Clone)]
pub struct LayerGradients<B: Backend> {
    /// Layer output, `(channels, height, width)`.
    pub activation: Tensor<B, 3>,
    /// Gradient of the target logit w.r.t. `activation`.
    pub gradient: Tensor<B, 3>,
    /// Full logit vector.
    pub logits: Vec<f32>,
    /// Class whose logit was differentiated.
    pub target_class: usize,
}

/// Compute the gradient of a class score with respect to a layer's output.
///
/// # Arguments
///
/// * `model` - Classifier on an autodiff backend
/// * `layer` - Id of the layer to explain
/// * `input` - Patch matching `model.input_shape()`
/// * `target_class` - Class to differentiate, or `None` for the predicted one
///
/// # Errors
///
/// - [`ExplainError::LayerNotFound`] / [`ExplainError::LayerNotSpatial`] for
///   a bad `layer`
/// - [`ExplainError::InputShape`] if the patch doesn't fit the classifier
/// - [`ExplainError::InvalidTargetClass`] if `target_class` is out of range
/// - [`ExplainError::GradientComputation`] if the layer never reached the
///   tap or received no gradient
pub fn compute_gradient<B, M>(
    model: &M,
    layer: &str,
    input: &PatchTensor<B>,
    target_class: Option<usize>,
) -> Result<LayerGradients<B::InnerBackend>>
where
    B: AutodiffBackend,
    M: VortexClassifier<B> + ?Sized,
{
    resolve_layer::<B, M>(model, layer)?;

    let expected = model.input_shape();
    if expected.check(&input.shape()).is_err() {
        return Err(ExplainError::InputShape {
            expected: expected.to_string(),
            got: input.shape().to_string(),
        });
    }

    let n_classes = model.n_classes();
    if let Some(index) = target_class {
        if index >= n_classes {
            return Err(ExplainError::InvalidTargetClass { index, n_classes });
        }
    }

    let mut tap = GradientTap::new(layer);
    let logits = model.forward_tapped(input.batched(), &mut tap);
    let captured = tap.into_captured().ok_or_else(|| {
        ExplainError::GradientComputation(format!(
            "layer '{layer}' was not visited during the forward pass"
        ))
    })?;

    let scores = logits
        .clone()
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| ExplainError::Tensor(format!("{e:?}")))?;
    let target_class = match target_class {
        Some(index) => index,
        None => argmax(&scores).ok_or_else(|| {
            ExplainError::GradientComputation("prediction has no finite score".to_string())
        })?,
    };
    tracing::debug!(
        model = model.name(),
        layer,
        target_class,
        ?scores,
        "differentiating class score"
    );

    let score = logits
        .slice([0..1, target_class..target_class + 1])
        .sum();
    let grads = score.backward();
    let gradient = captured.grad(&grads).ok_or_else(|| {
        ExplainError::GradientComputation(format!("no gradient reached layer '{layer}'"))
    })?;
    let activation = captured.inner();

    Ok(LayerGradients {
        activation: activation.squeeze::<3>(0),
        gradient: gradient.squeeze::<3>(0),
        logits: scores,
        target_class,
    })
}
