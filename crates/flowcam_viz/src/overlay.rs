//! Heatmap colouring and overlay on the input patch.

use flowcam_explain::Heatmap;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::colormap::{ColorMap, Colorize};
use crate::error::{Result, VizError};
use crate::normalize::min_max;

/// Resampling used to bring a heatmap up to the patch resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Blocky, one heatmap cell per block.
    Nearest,
    /// Linear in both axes.
    Bilinear,
    /// Cubic in both axes.
    #[default]
    Bicubic,
}

impl From<Interpolation> for FilterType {
    fn from(interpolation: Interpolation) -> Self {
        match interpolation {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
        }
    }
}

/// Overlay settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Weight of the heatmap colour in the blend.
    pub alpha: f32,
    /// Resampling of the heatmap.
    pub interpolation: Interpolation,
    /// Colour map for the heatmap.
    pub colormap: ColorMap,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            interpolation: Interpolation::default(),
            colormap: ColorMap::Jet,
        }
    }
}

impl OverlayConfig {
    /// Set the heatmap weight.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the resampling.
    #[must_use]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(VizError::InvalidConfig(format!(
                "overlay alpha must be in [0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

fn dims(values: &Array2<f32>, what: &str) -> Result<(u32, u32)> {
    let (rows, cols) = values.dim();
    if rows == 0 || cols == 0 {
        return Err(VizError::EmptyImage(format!("{what} is {rows}x{cols}")));
    }
    let width = u32::try_from(cols).map_err(|_| VizError::EmptyImage(format!("{what} too wide")))?;
    let height =
        u32::try_from(rows).map_err(|_| VizError::EmptyImage(format!("{what} too tall")))?;
    Ok((width, height))
}

/// Colour every value of `values` (already in `[0, 1]`) with `map`.
pub fn colorize<C: Colorize + ?Sized>(values: &Array2<f32>, map: &C) -> Result<RgbImage> {
    let (width, height) = dims(values, "image")?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        map.color(values[[y as usize, x as usize]])
    }))
}

/// Min-max scaled grey rendering of `values`.
pub fn grayscale_image(values: &Array2<f32>) -> Result<RgbImage> {
    colorize(&min_max(values), &ColorMap::Gray)
}

/// Heatmap at its own resolution, coloured through the 256-entry lookup
/// table of `map`.
pub fn heatmap_image(heatmap: &Heatmap, map: ColorMap) -> Result<RgbImage> {
    let lut = map.lut();
    let levels = heatmap.to_u8();
    let (width, height) = dims(heatmap.values(), "heatmap")?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        lut[levels[[y as usize, x as usize]] as usize]
    }))
}

/// Resample a heatmap to `width × height`, keeping values in `[0, 1]`.
pub fn resize_heatmap(
    heatmap: &Heatmap,
    width: u32,
    height: u32,
    interpolation: Interpolation,
) -> Result<Heatmap> {
    let values = heatmap.values();
    let (w, h) = dims(values, "heatmap")?;
    let source: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(w, h, |x, y| Luma([values[[y as usize, x as usize]]]));
    let resized = imageops::resize(&source, width, height, interpolation.into());

    let upsampled = Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        resized.get_pixel(c as u32, r as u32).0[0].clamp(0.0, 1.0)
    });
    // Cubic kernels overshoot, so the peak can drift below 1 after clamping.
    Ok(Heatmap::normalize(upsampled))
}

/// Blend a coloured heatmap over a grey rendering of `background`.
///
/// The heatmap is resampled to the background's size, coloured with the
/// config's map and mixed as `(1 - alpha) * grey + alpha * heat`.
///
/// # Errors
///
/// [`VizError::EmptyImage`] for an empty background or heatmap and
/// [`VizError::InvalidConfig`] for an alpha outside `[0, 1]`.
pub fn overlay(
    background: &Array2<f32>,
    heatmap: &Heatmap,
    config: &OverlayConfig,
) -> Result<RgbImage> {
    config.validate()?;
    let base = grayscale_image(background)?;
    let (width, height) = base.dimensions();
    let resized = resize_heatmap(heatmap, width, height, config.interpolation)?;
    let heat = heatmap_image(&resized, config.colormap)?;

    let alpha = config.alpha;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let Rgb(grey) = *base.get_pixel(x, y);
        let Rgb(color) = *heat.get_pixel(x, y);
        let mix = |c: usize| {
            ((1.0 - alpha) * f32::from(grey[c]) + alpha * f32::from(color[c]))
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Rgb([mix(0), mix(1), mix(2)])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_heatmap_image_uses_lut() {
        let heatmap = Heatmap::normalize(array![[0.0, 1.0]]);
        let img = heatmap_image(&heatmap, ColorMap::Jet).unwrap();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(*img.get_pixel(0, 0), ColorMap::Jet.color(0.0));
        assert_eq!(*img.get_pixel(1, 0), ColorMap::Jet.color(1.0));
    }

    #[test]
    fn test_grayscale_orientation() {
        // row index is y, column index is x
        let img = grayscale_image(&array![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(*img.get_pixel(2, 1), Rgb([255, 255, 255]));
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_resize_keeps_unit_range() {
        let heatmap = Heatmap::normalize(array![[0.0, 1.0], [0.5, 0.0]]);
        for interpolation in [
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
        ] {
            let resized = resize_heatmap(&heatmap, 8, 8, interpolation).unwrap();
            assert_eq!(resized.dim(), (8, 8));
            assert!(resized.values().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_nearest_resize_repeats_cells() {
        let heatmap = Heatmap::normalize(array![[0.0, 1.0]]);
        let resized = resize_heatmap(&heatmap, 4, 2, Interpolation::Nearest).unwrap();
        assert_eq!(resized.values(), &array![[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_overlay_size_follows_background() {
        let background = Array2::from_shape_fn((8, 6), |(r, c)| (r + c) as f32);
        let heatmap = Heatmap::normalize(array![[1.0, 0.0], [0.0, 0.5]]);
        let img = overlay(&background, &heatmap, &OverlayConfig::default()).unwrap();
        assert_eq!(img.dimensions(), (6, 8));
    }

    #[test]
    fn test_alpha_extremes() {
        let background = array![[0.0, 1.0], [1.0, 0.0]];
        let heatmap = Heatmap::normalize(array![[1.0, 1.0], [1.0, 1.0]]);
        let nearest = OverlayConfig::default().with_interpolation(Interpolation::Nearest);

        let grey = overlay(&background, &heatmap, &nearest.with_alpha(0.0)).unwrap();
        assert_eq!(grey, grayscale_image(&background).unwrap());

        let heat = overlay(&background, &heatmap, &nearest.with_alpha(1.0)).unwrap();
        assert!(heat.pixels().all(|p| *p == ColorMap::Jet.color(1.0)));
    }

    #[test]
    fn test_invalid_alpha_and_empty_input() {
        let heatmap = Heatmap::zeros(2, 2);
        let err = overlay(
            &Array2::zeros((2, 2)),
            &heatmap,
            &OverlayConfig::default().with_alpha(1.5),
        )
        .unwrap_err();
        assert!(matches!(err, VizError::InvalidConfig(_)));

        let err = overlay(&Array2::zeros((0, 2)), &heatmap, &OverlayConfig::default())
            .unwrap_err();
        assert!(matches!(err, VizError::EmptyImage(_)));
    }
}
