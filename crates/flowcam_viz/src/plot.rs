//! Vector drawing on top of raster tiles: streamlines and titles.
//!
//! Both draw into an existing [`RgbImage`] through plotters'
//! [`BitMapBackend`], whose default pixel layout is the same packed RGB
//! buffer `image` uses.

use std::collections::HashSet;

use image::{Rgb, RgbImage};
use ndarray::Array2;
use plotters::prelude::*;

use crate::error::{Result, VizError};

/// Streamline tile background.
pub const STREAM_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

const STREAM_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Integration step in grid cells.
const STEP: f32 = 0.25;

/// Speeds below this end a streamline.
const MIN_SPEED: f32 = 1e-6;

fn plot_error<E: std::fmt::Display>(err: E) -> VizError {
    VizError::Plot(err.to_string())
}

/// Bilinear sample of `values` at column `x`, row `y`.
fn sample(values: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (rows, cols) = values.dim();
    let x0 = (x.floor() as usize).min(cols - 1);
    let y0 = (y.floor() as usize).min(rows - 1);
    let x1 = (x0 + 1).min(cols - 1);
    let y1 = (y0 + 1).min(rows - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = values[[y0, x0]] * (1.0 - fx) + values[[y0, x1]] * fx;
    let bottom = values[[y1, x0]] * (1.0 - fx) + values[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

struct Tracer<'a> {
    u: &'a Array2<f32>,
    v: &'a Array2<f32>,
    spacing: usize,
    occupied: HashSet<(usize, usize)>,
}

impl Tracer<'_> {
    fn inside(&self, x: f32, y: f32) -> bool {
        let (rows, cols) = self.u.dim();
        x >= 0.0 && y >= 0.0 && x <= (cols - 1) as f32 && y <= (rows - 1) as f32
    }

    fn cell(&self, x: f32, y: f32) -> (usize, usize) {
        (x as usize / self.spacing, y as usize / self.spacing)
    }

    /// Unit-speed direction of the flow, scaled by `sign`.
    fn direction(&self, x: f32, y: f32, sign: f32) -> Option<(f32, f32)> {
        let dx = sample(self.u, x, y);
        let dy = sample(self.v, x, y);
        let speed = dx.hypot(dy);
        if !speed.is_finite() || speed < MIN_SPEED {
            return None;
        }
        Some((sign * dx / speed, sign * dy / speed))
    }

    /// Midpoint-rule integration from `(x, y)` until the line leaves the
    /// grid, stalls, or runs into a cell owned by an earlier line.
    fn integrate(
        &self,
        x: f32,
        y: f32,
        sign: f32,
        owned: &mut HashSet<(usize, usize)>,
    ) -> Vec<(f32, f32)> {
        let (rows, cols) = self.u.dim();
        let max_steps = 4 * (rows + cols) * (1.0 / STEP) as usize;
        let (mut x, mut y) = (x, y);
        let mut points = Vec::new();

        for _ in 0..max_steps {
            let Some((dx, dy)) = self.direction(x, y, sign) else {
                break;
            };
            let (mx, my) = (x + 0.5 * STEP * dx, y + 0.5 * STEP * dy);
            if !self.inside(mx, my) {
                break;
            }
            let Some((dx, dy)) = self.direction(mx, my, sign) else {
                break;
            };
            let (nx, ny) = (x + STEP * dx, y + STEP * dy);
            if !self.inside(nx, ny) {
                break;
            }
            let cell = self.cell(nx, ny);
            if self.occupied.contains(&cell) {
                break;
            }
            owned.insert(cell);
            points.push((nx, ny));
            x = nx;
            y = ny;
        }
        points
    }

    fn trace(&mut self, x: f32, y: f32) -> Option<Vec<(f32, f32)>> {
        let start = self.cell(x, y);
        if self.occupied.contains(&start) {
            return None;
        }
        let mut owned = HashSet::from([start]);
        let mut backward = self.integrate(x, y, -1.0, &mut owned);
        let forward = self.integrate(x, y, 1.0, &mut owned);

        backward.reverse();
        backward.push((x, y));
        backward.extend(forward);
        if backward.len() < 2 {
            return None;
        }
        self.occupied.extend(owned);
        Some(backward)
    }
}

/// Streamlines of the velocity field `(u, v)`.
///
/// `u` is the column-wise and `v` the row-wise component. Lines are seeded
/// every `spacing` cells and traced both ways; a line stops when it enters
/// a `spacing`-sized cell already crossed by another line. Points are
/// `(column, row)` grid coordinates.
pub fn trace_streamlines(
    u: &Array2<f32>,
    v: &Array2<f32>,
    spacing: usize,
) -> Result<Vec<Vec<(f32, f32)>>> {
    if u.dim() != v.dim() {
        return Err(VizError::InvalidConfig(format!(
            "velocity components differ in shape: {:?} vs {:?}",
            u.dim(),
            v.dim()
        )));
    }
    if u.is_empty() {
        return Err(VizError::EmptyImage("velocity field has no cells".into()));
    }
    if spacing == 0 {
        return Err(VizError::InvalidConfig("streamline spacing must be at least 1".into()));
    }

    let (rows, cols) = u.dim();
    let mut tracer = Tracer {
        u,
        v,
        spacing,
        occupied: HashSet::new(),
    };
    let mut lines = Vec::new();
    for row in (spacing / 2..rows).step_by(spacing) {
        for col in (spacing / 2..cols).step_by(spacing) {
            if let Some(line) = tracer.trace(col as f32, row as f32) {
                lines.push(line);
            }
        }
    }
    tracing::debug!(n_lines = lines.len(), rows, cols, "traced streamlines");
    Ok(lines)
}

/// Streamline plot of `(u, v)` drawn `scale` pixels per cell.
///
/// Tiles are transposed like the classifier input: grid point `(row, col)`
/// lands at image column `row` and image row `col`.
pub fn streamline_image(
    u: &Array2<f32>,
    v: &Array2<f32>,
    spacing: usize,
    scale: u32,
) -> Result<RgbImage> {
    let lines = trace_streamlines(u, v, spacing)?;
    let (rows, cols) = u.dim();
    let (width, height) = (rows as u32 * scale, cols as u32 * scale);
    let to_pixel = |p: f32| (p * scale as f32 + scale as f32 / 2.0) as i32;

    let mut img = RgbImage::from_pixel(width, height, STREAM_BACKGROUND);
    {
        let root = BitMapBackend::with_buffer(&mut img, (width, height)).into_drawing_area();
        for line in &lines {
            let points: Vec<(i32, i32)> = line
                .iter()
                .map(|&(col, row)| (to_pixel(row), to_pixel(col)))
                .collect();
            root.draw(&PathElement::new(points, STREAM_COLOR.stroke_width(1)))
                .map_err(plot_error)?;
        }
        root.present().map_err(plot_error)?;
    }
    Ok(img)
}

/// Write `text` in white across the top-left corner of `tile`.
///
/// The font size follows the tile height. Fails with [`VizError::Plot`]
/// when no sans-serif font can be loaded.
pub fn draw_title(tile: &mut RgbImage, text: &str) -> Result<()> {
    let (width, height) = tile.dimensions();
    let size = (f64::from(height) / 18.0).max(8.0);
    let style = ("sans-serif", size).into_font().color(&WHITE);

    let root = BitMapBackend::with_buffer(tile, (width, height)).into_drawing_area();
    root.draw(&Text::new(text.to_string(), (2, 2), style))
        .map_err(plot_error)?;
    root.present().map_err(plot_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid-body rotation about the grid centre.
    fn rotation(n: usize) -> (Array2<f32>, Array2<f32>) {
        let c = (n as f32 - 1.0) / 2.0;
        let u = Array2::from_shape_fn((n, n), |(r, _)| -(r as f32 - c));
        let v = Array2::from_shape_fn((n, n), |(_, col)| col as f32 - c);
        (u, v)
    }

    #[test]
    fn test_sample_is_bilinear() {
        let values = ndarray::array![[0.0, 2.0], [4.0, 6.0]];
        assert_eq!(sample(&values, 0.0, 0.0), 0.0);
        assert_eq!(sample(&values, 1.0, 1.0), 6.0);
        assert!((sample(&values, 0.5, 0.5) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_flow_gives_straight_lines() {
        let u = Array2::from_elem((8, 8), 1.0);
        let v = Array2::zeros((8, 8));
        let lines = trace_streamlines(&u, &v, 4).unwrap();

        // one line per seed row, running the full width
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let y = line[0].1;
            assert!(line.iter().all(|&(_, row)| (row - y).abs() < 1e-5));
            assert!(line.first().unwrap().0 < 0.5);
            assert!(line.last().unwrap().0 > 6.5);
        }
    }

    #[test]
    fn test_rotation_keeps_radius() {
        let (u, v) = rotation(16);
        let c = 7.5;
        let lines = trace_streamlines(&u, &v, 4).unwrap();
        assert!(!lines.is_empty());

        for line in &lines {
            let r0 = (line[0].0 - c).hypot(line[0].1 - c);
            for &(x, y) in line {
                assert!(((x - c).hypot(y - c) - r0).abs() < 0.1);
            }
        }
    }

    #[test]
    fn test_still_field_has_no_lines() {
        let zeros = Array2::zeros((6, 6));
        assert!(trace_streamlines(&zeros, &zeros, 2).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_streamline_input() {
        let a = Array2::<f32>::zeros((4, 4));
        let b = Array2::<f32>::zeros((4, 5));
        assert!(matches!(
            trace_streamlines(&a, &b, 2),
            Err(VizError::InvalidConfig(_))
        ));
        assert!(matches!(
            trace_streamlines(&a, &a, 0),
            Err(VizError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_streamline_image_draws_lines() {
        let (u, v) = rotation(8);
        let img = streamline_image(&u, &v, 2, 4).unwrap();
        assert_eq!(img.dimensions(), (32, 32));
        assert!(img.pixels().any(|p| *p != STREAM_BACKGROUND));
    }

    #[test]
    fn test_streamline_image_is_transposed() {
        // flow along grid rows runs along image x after transposition
        let u = Array2::zeros((8, 4));
        let v = Array2::from_elem((8, 4), 1.0);
        let img = streamline_image(&u, &v, 2, 2).unwrap();
        assert_eq!(img.dimensions(), (16, 8));

        let drawn: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != STREAM_BACKGROUND)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!drawn.is_empty());
        let xs: HashSet<u32> = drawn.iter().map(|&(x, _)| x).collect();
        let ys: HashSet<u32> = drawn.iter().map(|&(_, y)| y).collect();
        assert!(xs.len() > ys.len());
    }

    #[test]
    fn test_title_marks_tile() {
        let mut tile = RgbImage::from_pixel(128, 128, Rgb([0, 0, 0]));
        // font lookup depends on the host; only check what was drawn
        if draw_title(&mut tile, "cnn predicted class = CW").is_ok() {
            assert!(tile.pixels().any(|p| p.0[0] > 0));
            assert_eq!(*tile.get_pixel(127, 127), Rgb([0, 0, 0]));
        }
    }
}
