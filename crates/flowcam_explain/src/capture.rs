//! Layer taps that capture intermediate outputs.

use std::collections::HashMap;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use flowcam_core::LayerTap;

/// Captured layer outputs of one forward pass.
///
/// Records every layer it visits, or only the layers it was created for.
#[derive(Debug, Clone)]
pub struct ActivationCapture<B: Backend> {
    only: Option<Vec<String>>,
    order: Vec<String>,
    activations: HashMap<String, Tensor<B, 4>>,
}

impl<B: Backend> ActivationCapture<B> {
    /// Capture every layer.
    pub fn new() -> Self {
        Self {
            only: None,
            order: Vec::new(),
            activations: HashMap::new(),
        }
    }

    /// Capture only the given layers.
    pub fn only<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Some(layers.into_iter().map(Into::into).collect()),
            ..Self::new()
        }
    }

    /// Get an activation by layer id.
    pub fn get(&self, name: &str) -> Option<&Tensor<B, 4>> {
        self.activations.get(name)
    }

    /// Shape of a captured activation.
    pub fn dims(&self, name: &str) -> Option<[usize; 4]> {
        self.get(name).map(Tensor::dims)
    }

    /// Captured layer ids in visit order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Remove and return an activation.
    pub fn take(&mut self, name: &str) -> Option<Tensor<B, 4>> {
        self.order.retain(|n| n != name);
        self.activations.remove(name)
    }

    /// Clear all stored activations.
    pub fn clear(&mut self) {
        self.order.clear();
        self.activations.clear();
    }

    fn wants(&self, layer: &str) -> bool {
        self.only
            .as_ref()
            .map_or(true, |only| only.iter().any(|l| l == layer))
    }
}

impl<B: Backend> Default for ActivationCapture<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> LayerTap<B> for ActivationCapture<B> {
    fn visit(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.wants(layer)
            && self
                .activations
                .insert(layer.to_string(), output.clone())
                .is_none()
        {
            self.order.push(layer.to_string());
        }
        output
    }
}

/// Tap that turns one layer's output into a gradient-tracking leaf.
///
/// The substituted leaf flows on through the rest of the network, so after
/// `backward()` on any downstream score its gradient is available.
#[derive(Debug)]
pub struct GradientTap<B: AutodiffBackend> {
    layer: String,
    captured: Option<Tensor<B, 4>>,
}

impl<B: AutodiffBackend> GradientTap<B> {
    /// Create a tap for `layer`.
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            captured: None,
        }
    }

    /// Target layer id.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// The captured leaf, if the layer was visited.
    pub fn into_captured(self) -> Option<Tensor<B, 4>> {
        self.captured
    }
}

impl<B: AutodiffBackend> LayerTap<B> for GradientTap<B> {
    fn visit(&mut self, layer: &str, output: Tensor<B, 4>) -> Tensor<B, 4> {
        if layer != self.layer {
            return output;
        }
        let leaf = output.detach().require_grad();
        self.captured = Some(leaf.clone());
        leaf
    }
}
