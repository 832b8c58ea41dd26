//! Grad-CAM orchestration.

use burn::tensor::backend::AutodiffBackend;
use flowcam_core::{PatchTensor, VortexClass, VortexClassifier};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extractor::compute_gradient;
use crate::heatmap::Heatmap;
use crate::locator::find_last_spatial_layer;
use crate::reducer::reduce;

/// Grad-CAM settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradCamConfig {
    /// Layer to explain. Defaults to the last convolution.
    pub layer: Option<String>,
    /// Class to explain. Defaults to the predicted class.
    pub target_class: Option<usize>,
}

impl GradCamConfig {
    /// Explain `layer` instead of the last convolution.
    #[must_use]
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Explain `class` instead of the predicted class.
    #[must_use]
    pub fn with_target_class(mut self, class: usize) -> Self {
        self.target_class = Some(class);
        self
    }
}

/// A heatmap together with the prediction it explains.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Explained layer.
    pub layer: String,
    /// Explained class.
    pub target_class: usize,
    /// Logits of the classifier for the patch.
    pub logits: Vec<f32>,
    /// Normalised heatmap at the layer's resolution.
    pub heatmap: Heatmap,
}

impl Explanation {
    /// Vortex label of the explained class, if it is one of the three.
    pub fn label(&self) -> Option<VortexClass> {
        VortexClass::from_index(self.target_class).ok()
    }

    /// Softmax of the logits.
    pub fn probabilities(&self) -> Vec<f32> {
        let max = self.logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = self.logits.iter().map(|&l| (l - max).exp()).collect();
        let total: f32 = exp.iter().sum();
        exp.into_iter().map(|e| e / total).collect()
    }

    /// Probability of the explained class.
    pub fn confidence(&self) -> f32 {
        self.probabilities()
            .get(self.target_class)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Grad-CAM explainer.
///
/// # Example
///
/// ```rust,ignore
/// use flowcam_explain::{GradCam, GradCamConfig};
///
/// let explainer = GradCam::new(GradCamConfig::default());
/// let explanation = explainer.explain(&model, &patch.to_tensor(&device))?;
/// println!("{:?}: {:?}", explanation.label(), explanation.heatmap.dim());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GradCam {
    config: GradCamConfig,
}

impl GradCam {
    /// Create an explainer.
    pub fn new(config: GradCamConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &GradCamConfig {
        &self.config
    }

    /// Layer this explainer would use for `model`.
    pub fn layer_for<B, M>(&self, model: &M) -> Result<String>
    where
        B: AutodiffBackend,
        M: VortexClassifier<B> + ?Sized,
    {
        match &self.config.layer {
            Some(layer) => Ok(layer.clone()),
            None => find_last_spatial_layer::<B, M>(model),
        }
    }

    /// Explain one patch.
    pub fn explain<B, M>(&self, model: &M, input: &PatchTensor<B>) -> Result<Explanation>
    where
        B: AutodiffBackend,
        M: VortexClassifier<B> + ?Sized,
    {
        let layer = self.layer_for::<B, M>(model)?;
        let grads = compute_gradient(model, &layer, input, self.config.target_class)?;
        let heatmap = reduce(grads.activation, grads.gradient)?;

        if heatmap.is_degenerate() {
            tracing::warn!(
                model = model.name(),
                layer = %layer,
                target_class = grads.target_class,
                "Grad-CAM heatmap is zero everywhere"
            );
        }

        Ok(Explanation {
            layer,
            target_class: grads.target_class,
            logits: grads.logits,
            heatmap,
        })
    }
}

/// Grad-CAM heatmap of `input` at the last convolution of `model`.
///
/// `target_class` defaults to the predicted class.
pub fn grad_cam<B, M>(
    model: &M,
    input: &PatchTensor<B>,
    target_class: Option<usize>,
) -> Result<Heatmap>
where
    B: AutodiffBackend,
    M: VortexClassifier<B> + ?Sized,
{
    let config = GradCamConfig {
        layer: None,
        target_class,
    };
    GradCam::new(config)
        .explain(model, input)
        .map(|explanation| explanation.heatmap)
}
