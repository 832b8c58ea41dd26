//! Multi-model comparison panels.
//!
//! A panel is one row of tiles: a heatmap overlay per model, titled with
//! the model's prediction, followed by the velocity magnitude, the two
//! velocity components and a streamline plot. All tiles share the
//! orientation of the classifier input.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::colormap::{ColorMap, ShiftedColorMap};
use crate::error::{Result, VizError};
use crate::normalize::{finite_range, min_max, MidpointNormalize};
use crate::overlay::{colorize, overlay, OverlayConfig};
use crate::plot::{draw_title, streamline_image};
use crate::sink::{ExplainedPatch, ModelResult};

/// Background colour between tiles.
pub const BACKGROUND: Rgb<u8> = Rgb([20, 20, 20]);

/// How signed field tiles put zero on the diverging map's centre colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStyle {
    /// Piecewise-linear normalisation around zero.
    #[default]
    Midpoint,
    /// Min-max normalisation through a colour map shifted to zero.
    Shifted,
}

/// Panel layout settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Integer upscaling of every tile.
    pub scale: u32,
    /// Pixels between tiles.
    pub gap: u32,
    /// Include the magnitude, U, V and streamline tiles.
    pub show_field: bool,
    /// Grid cells between streamline seeds.
    pub streamline_spacing: usize,
    /// Write the model and predicted class over each overlay.
    pub titles: bool,
    /// Colouring of the field tiles.
    pub field_style: FieldStyle,
    /// Heatmap overlay settings.
    pub overlay: OverlayConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            scale: 4,
            gap: 4,
            show_field: true,
            streamline_spacing: 4,
            titles: true,
            field_style: FieldStyle::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl PanelConfig {
    /// Set the tile upscaling.
    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the gap between tiles.
    #[must_use]
    pub fn with_gap(mut self, gap: u32) -> Self {
        self.gap = gap;
        self
    }

    /// Only draw the model overlays.
    #[must_use]
    pub fn without_field(mut self) -> Self {
        self.show_field = false;
        self
    }

    /// Leave the overlays untitled.
    #[must_use]
    pub fn without_titles(mut self) -> Self {
        self.titles = false;
        self
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(VizError::InvalidConfig("panel scale must be at least 1".into()));
        }
        if self.streamline_spacing == 0 {
            return Err(VizError::InvalidConfig(
                "streamline spacing must be at least 1".into(),
            ));
        }
        self.overlay.validate()
    }
}

/// A signed field drawn with the coolwarm map, zero in its centre colour.
pub fn diverging_image(values: &Array2<f32>, style: FieldStyle) -> Result<RgbImage> {
    match style {
        FieldStyle::Midpoint => {
            let norm = MidpointNormalize::for_data(values, 0.0);
            let normalized = norm
                .apply_all(values)
                .mapv(|v| if v.is_nan() { 0.5 } else { v });
            colorize(&normalized, &ColorMap::Coolwarm)
        }
        FieldStyle::Shifted => {
            let (vmin, vmax) = finite_range(values).unwrap_or((0.0, 0.0));
            let map = ShiftedColorMap::centered_on_zero(ColorMap::Coolwarm, vmin, vmax);
            colorize(&min_max(values), &map)
        }
    }
}

/// Place `images` left to right, `gap` pixels apart, on [`BACKGROUND`].
pub fn side_by_side(images: &[RgbImage], gap: u32) -> Result<RgbImage> {
    if images.is_empty() {
        return Err(VizError::EmptyImage("panel has no tiles".into()));
    }
    let gaps = gap * (images.len() as u32 - 1);
    let width = images.iter().map(RgbImage::width).sum::<u32>() + gaps;
    let height = images.iter().map(RgbImage::height).max().unwrap_or(0);

    let mut combined = RgbImage::from_pixel(width, height, BACKGROUND);
    let mut x_offset = 0;
    for img in images {
        imageops::replace(&mut combined, img, i64::from(x_offset), 0);
        x_offset += img.width() + gap;
    }
    Ok(combined)
}

fn upscale(img: RgbImage, scale: u32) -> RgbImage {
    if scale == 1 {
        return img;
    }
    imageops::resize(
        &img,
        img.width() * scale,
        img.height() * scale,
        FilterType::Nearest,
    )
}

/// Overlay title, e.g. `cnn predicted class = CW`.
pub fn model_title(result: &ModelResult) -> String {
    let explanation = &result.explanation;
    match explanation.label() {
        Some(label) => format!("{} predicted class = {label}", result.model),
        None => format!(
            "{} predicted class = {}",
            result.model, explanation.target_class
        ),
    }
}

/// Tiles of a panel, in drawing order.
///
/// A title that cannot be drawn, e.g. for lack of a font, is logged and
/// the tile is kept untitled.
pub fn panel_tiles(explained: &ExplainedPatch, config: &PanelConfig) -> Result<Vec<RgbImage>> {
    config.validate()?;
    let background = explained.patch.input_image();

    let mut tiles = Vec::with_capacity(explained.results.len() + 4);
    for result in &explained.results {
        let mut tile = upscale(
            overlay(&background, &result.explanation.heatmap, &config.overlay)?,
            config.scale,
        );
        if config.titles {
            if let Err(err) = draw_title(&mut tile, &model_title(result)) {
                tracing::warn!(model = %result.model, error = %err, "overlay left untitled");
            }
        }
        tiles.push(tile);
    }

    if config.show_field {
        let field = explained.patch.field();
        let magnitude = field.magnitude().t().to_owned();
        let u = field.u().t().to_owned();
        let v = field.v().t().to_owned();
        for values in [magnitude, u, v] {
            tiles.push(upscale(
                diverging_image(&values, config.field_style)?,
                config.scale,
            ));
        }
        tiles.push(streamline_image(
            field.u(),
            field.v(),
            config.streamline_spacing,
            config.scale,
        )?);
    }

    Ok(tiles)
}

/// Render the full comparison panel for one patch.
pub fn render_panel(explained: &ExplainedPatch, config: &PanelConfig) -> Result<RgbImage> {
    let tiles = panel_tiles(explained, config)?;
    side_by_side(&tiles, config.gap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::Colorize;
    use flowcam_data::{FlowField, FlowPatch};
    use flowcam_explain::{Explanation, Heatmap};
    use ndarray::array;

    fn explained(models: usize) -> ExplainedPatch {
        let u = Array2::from_shape_fn((6, 6), |(r, _)| r as f32 - 2.5);
        let v = Array2::from_shape_fn((6, 6), |(_, c)| 2.5 - c as f32);
        let patch = FlowPatch::new("p007.npy", FlowField::new(u, v).unwrap());
        let results = (0..models)
            .map(|i| ModelResult {
                model: format!("model{i}"),
                explanation: Explanation {
                    layer: "conv3".into(),
                    target_class: 1,
                    logits: vec![0.1, 0.7, 0.2],
                    heatmap: Heatmap::normalize(array![[0.0, 1.0], [0.5, 0.25]]),
                },
            })
            .collect();
        ExplainedPatch { patch, results }
    }

    #[test]
    fn test_side_by_side_layout() {
        let a = RgbImage::from_pixel(2, 3, Rgb([255, 0, 0]));
        let b = RgbImage::from_pixel(3, 1, Rgb([0, 255, 0]));
        let combined = side_by_side(&[a, b], 2).unwrap();

        assert_eq!(combined.dimensions(), (7, 3));
        assert_eq!(*combined.get_pixel(1, 2), Rgb([255, 0, 0]));
        assert_eq!(*combined.get_pixel(3, 0), BACKGROUND);
        assert_eq!(*combined.get_pixel(4, 0), Rgb([0, 255, 0]));
        assert_eq!(*combined.get_pixel(4, 2), BACKGROUND);
    }

    #[test]
    fn test_side_by_side_needs_tiles() {
        assert!(matches!(
            side_by_side(&[], 4),
            Err(VizError::EmptyImage(_))
        ));
    }

    #[test]
    fn test_panel_has_tile_per_model_and_field() {
        let config = PanelConfig::default().with_scale(2).with_gap(3);
        let tiles = panel_tiles(&explained(3), &config).unwrap();
        assert_eq!(tiles.len(), 7);
        assert!(tiles.iter().all(|t| t.dimensions() == (12, 12)));

        let panel = render_panel(&explained(3), &config).unwrap();
        assert_eq!(panel.dimensions(), (7 * 12 + 6 * 3, 12));
    }

    #[test]
    fn test_panel_without_field() {
        let config = PanelConfig::default().with_scale(1).without_field();
        let panel = render_panel(&explained(2), &config).unwrap();
        assert_eq!(panel.dimensions(), (6 + 4 + 6, 6));
    }

    #[test]
    fn test_zero_is_centre_colour() {
        for style in [FieldStyle::Midpoint, FieldStyle::Shifted] {
            let img = diverging_image(&array![[-3.0, 0.0, 1.0]], style).unwrap();
            assert_eq!(*img.get_pixel(1, 0), ColorMap::Coolwarm.color(0.5));
            assert_eq!(*img.get_pixel(0, 0), ColorMap::Coolwarm.color(0.0));
            assert_eq!(*img.get_pixel(2, 0), ColorMap::Coolwarm.color(1.0));
        }
    }

    #[test]
    fn test_zero_scale_rejected() {
        let err = render_panel(&explained(1), &PanelConfig::default().with_scale(0)).unwrap_err();
        assert!(matches!(err, VizError::InvalidConfig(_)));
    }

    #[test]
    fn test_model_title() {
        let result = &explained(1).results[0];
        assert_eq!(model_title(result), "model0 predicted class = CW");

        let mut unlabelled = result.clone();
        unlabelled.explanation.target_class = 7;
        assert_eq!(model_title(&unlabelled), "model0 predicted class = 7");
    }

    #[test]
    fn test_streamline_tile_follows_field() {
        let config = PanelConfig::default().with_scale(2).without_titles();
        let tiles = panel_tiles(&explained(1), &config).unwrap();
        let streamlines = tiles.last().unwrap();
        assert_eq!(streamlines.dimensions(), (12, 12));
        assert!(streamlines.pixels().any(|p| *p != crate::plot::STREAM_BACKGROUND));
    }

    #[test]
    fn test_titles_only_touch_overlays() {
        let untitled = PanelConfig::default().with_scale(8).without_titles();
        let titled = PanelConfig::default().with_scale(8);
        let plain = panel_tiles(&explained(2), &untitled).unwrap();
        let marked = panel_tiles(&explained(2), &titled).unwrap();

        // overlays may differ (when a font is available), field tiles never do
        assert_eq!(plain.len(), marked.len());
        assert_eq!(plain[2..], marked[2..]);
    }

    #[test]
    fn test_zero_streamline_spacing_rejected() {
        let config = PanelConfig {
            streamline_spacing: 0,
            ..PanelConfig::default()
        };
        assert!(matches!(config.validate(), Err(VizError::InvalidConfig(_))));
    }
}
