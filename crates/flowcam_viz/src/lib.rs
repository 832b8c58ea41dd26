//! # flowcam_viz
//!
//! Rendering of Grad-CAM explanations for flow patches.
//!
//! This crate provides:
//! - [`ColorMap`] (jet, coolwarm, grey) and [`ShiftedColorMap`]
//! - [`MidpointNormalize`] for diverging maps centred on zero
//! - [`overlay`], blending a resampled heatmap over the classifier input
//! - [`render_panel`], one titled tile per model plus the velocity field
//! - [`streamline_image`], streamlines traced through the velocity field
//! - [`PngSink`] and [`JsonSink`] behind the [`VisualizationSink`] trait
//!
//! ## Example
//!
//! ```rust,ignore
//! use flowcam_viz::{PanelConfig, PngSink, VisualizationSink};
//!
//! let mut sink = PngSink::new("gradcam_out", PanelConfig::default());
//! let path = sink.write(&explained)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod colormap;
mod error;
mod normalize;
mod overlay;
mod panel;
mod plot;
mod sink;

pub use colormap::{ColorMap, Colorize, ShiftedColorMap, LUT_SIZE};
pub use error::{Result, VizError};
pub use normalize::{finite_range, min_max, MidpointNormalize};
pub use overlay::{
    colorize, grayscale_image, heatmap_image, overlay, resize_heatmap, Interpolation,
    OverlayConfig,
};
pub use panel::{
    diverging_image, model_title, panel_tiles, render_panel, side_by_side, FieldStyle,
    PanelConfig, BACKGROUND,
};
pub use plot::{draw_title, streamline_image, trace_streamlines, STREAM_BACKGROUND};
pub use sink::{ExplainedPatch, JsonSink, ModelResult, PngSink, VisualizationSink};
