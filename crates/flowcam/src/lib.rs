//! # flowcam
//!
//! Grad-CAM explanations for flow-field vortex classifiers.
//!
//! flowcam answers "where in this flow patch did the classifier look?" for
//! CNN, ResNet-101 and U-Net classifiers of 64×64 velocity-magnitude patches
//! labelled CCW, CW or SADDLE:
//!
//! - **Data**: `.npy` flow patches, magnitude images, directory sources
//! - **Models**: burn classifiers with named layer tables and checkpoints
//! - **Explain**: layer location, gradient capture, heatmap reduction
//! - **Viz**: colour maps, overlays, comparison panels, PNG and JSON sinks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowcam::prelude::*;
//!
//! let device = Default::default();
//! let model = load_checkpoint::<AutodiffNdArray>("weights/cnn.mpk", None, &device)?;
//! let source = PatchSource::from_dir("flow_patches/centered_CW")?;
//!
//! let explainer = GradCam::new(GradCamConfig::default());
//! let mut sink = PngSink::new("gradcam_out", PanelConfig::default());
//! for patch in source.iter().take(40) {
//!     let patch = patch?;
//!     let explanation = explainer.explain(&model, &patch.to_tensor(&device))?;
//!     let results = vec![ModelResult { model: "cnn".into(), explanation }];
//!     sink.write(&ExplainedPatch { patch, results })?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub use flowcam_core as core;
pub use flowcam_data as data;
pub use flowcam_explain as explain;
pub use flowcam_models as models;
pub use flowcam_viz as viz;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use flowcam::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use flowcam_core::{
        LayerInfo, LayerKind, LayerTap, PatchShape, PatchTensor, Seed, VortexClass,
        VortexClassifier,
    };

    #[cfg(feature = "backend-ndarray")]
    pub use flowcam_core::backend::{AutodiffNdArray, NdArray};

    // Data
    pub use flowcam_data::{read_flow_npy, FlowField, FlowPatch, PatchSource};

    // Models
    pub use flowcam_models::{
        load_checkpoint, save_checkpoint, Architecture, CnnConfig, ModelConfig, ResNetConfig,
        UNetConfig, VortexModel,
    };

    // Explain
    pub use flowcam_explain::{
        find_last_spatial_layer, grad_cam, Explanation, GradCam, GradCamConfig, Heatmap,
    };

    // Viz
    pub use flowcam_viz::{
        overlay, render_panel, ColorMap, ExplainedPatch, JsonSink, ModelResult, OverlayConfig,
        PanelConfig, PngSink, VisualizationSink,
    };
}
