//! Colour maps.

use image::Rgb;
use serde::{Deserialize, Serialize};

/// Number of entries in a colour lookup table.
pub const LUT_SIZE: usize = 256;

/// Something that maps a value in `[0, 1]` to a colour.
pub trait Colorize {
    /// Colour of `t`. Values outside `[0, 1]` are clamped; NaN is drawn
    /// as the lowest colour.
    fn color(&self, t: f32) -> Rgb<u8>;

    /// Sample the map at `LUT_SIZE` evenly spaced points.
    fn lut(&self) -> Vec<Rgb<u8>> {
        (0..LUT_SIZE)
            .map(|i| self.color(i as f32 / (LUT_SIZE - 1) as f32))
            .collect()
    }
}

/// Built-in colour maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMap {
    /// Blue → cyan → yellow → red, for heatmaps.
    #[default]
    Jet,
    /// Diverging blue → grey → red, for signed fields.
    Coolwarm,
    /// Black → white.
    Gray,
}

// (x, value) anchors per channel, piecewise linear in between.
type Segments = &'static [(f32, f32)];

const JET_RED: Segments = &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const JET_GREEN: Segments = &[
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const JET_BLUE: Segments = &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

const COOLWARM: [(f32, [f32; 3]); 3] = [
    (0.0, [59.0, 76.0, 192.0]),
    (0.5, [221.0, 221.0, 221.0]),
    (1.0, [180.0, 4.0, 38.0]),
];

fn interpolate(segments: Segments, t: f32) -> f32 {
    let mut prev = segments[0];
    for &(x, y) in &segments[1..] {
        if t <= x {
            let span = x - prev.0;
            if span <= 0.0 {
                return y;
            }
            return prev.1 + (y - prev.1) * (t - prev.0) / span;
        }
        prev = (x, y);
    }
    prev.1
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn unit(t: f32) -> f32 {
    if t.is_nan() {
        0.0
    } else {
        t.clamp(0.0, 1.0)
    }
}

impl Colorize for ColorMap {
    fn color(&self, t: f32) -> Rgb<u8> {
        let t = unit(t);
        match self {
            ColorMap::Jet => Rgb([
                to_u8(interpolate(JET_RED, t)),
                to_u8(interpolate(JET_GREEN, t)),
                to_u8(interpolate(JET_BLUE, t)),
            ]),
            ColorMap::Coolwarm => {
                let (lo, hi) = if t <= COOLWARM[1].0 {
                    (COOLWARM[0], COOLWARM[1])
                } else {
                    (COOLWARM[1], COOLWARM[2])
                };
                let f = (t - lo.0) / (hi.0 - lo.0);
                let channel = |c: usize| (lo.1[c] + (hi.1[c] - lo.1[c]) * f).round() as u8;
                Rgb([channel(0), channel(1), channel(2)])
            }
            ColorMap::Gray => {
                let v = to_u8(t);
                Rgb([v, v, v])
            }
        }
    }
}

/// A colour map whose centre is moved to `midpoint`, optionally using only
/// the `[start, stop]` part of the base map.
///
/// Useful for data with unequal negative and positive ranges: with
/// `midpoint = 1 - vmax / (vmax + |vmin|)` zero lands on the base map's
/// centre colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftedColorMap {
    /// Map being shifted.
    pub base: ColorMap,
    /// Lower bound of the base map range used.
    pub start: f32,
    /// New centre, in `[0, 1]`.
    pub midpoint: f32,
    /// Upper bound of the base map range used.
    pub stop: f32,
}

// The shifted map is tabulated at 257 points, 128 below the midpoint and
// 129 from the midpoint up.
const SHIFT_STEPS: f32 = 256.0;
const SHIFT_HALF: f32 = 128.0;

impl ShiftedColorMap {
    /// Shift `base` so its centre sits at `midpoint`.
    pub fn new(base: ColorMap, midpoint: f32) -> Self {
        Self {
            base,
            start: 0.0,
            midpoint: midpoint.clamp(0.0, 1.0),
            stop: 1.0,
        }
    }

    /// Use only `[start, stop]` of the base map.
    #[must_use]
    pub fn with_range(mut self, start: f32, stop: f32) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    /// Shift that puts zero at the centre for data in `[vmin, vmax]`.
    pub fn centered_on_zero(base: ColorMap, vmin: f32, vmax: f32) -> Self {
        let range = vmax + vmin.abs();
        let midpoint = if range > 0.0 { 1.0 - vmax / range } else { 0.5 };
        Self::new(base, midpoint)
    }

    fn base_position(&self, t: f32) -> f32 {
        let index = if t < self.midpoint {
            t / self.midpoint * SHIFT_HALF
        } else if self.midpoint < 1.0 {
            SHIFT_HALF + (t - self.midpoint) / (1.0 - self.midpoint) * SHIFT_HALF
        } else {
            SHIFT_STEPS
        };
        self.start + index / SHIFT_STEPS * (self.stop - self.start)
    }
}

impl Colorize for ShiftedColorMap {
    fn color(&self, t: f32) -> Rgb<u8> {
        self.base.color(self.base_position(unit(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(ColorMap::Jet.color(0.0), Rgb([0, 0, 128]));
        assert_eq!(ColorMap::Jet.color(1.0), Rgb([128, 0, 0]));
        // green plateau
        assert_eq!(ColorMap::Jet.color(0.5).0[1], 255);
    }

    #[test]
    fn test_lut_size_and_clamping() {
        let lut = ColorMap::Jet.lut();
        assert_eq!(lut.len(), LUT_SIZE);
        assert_eq!(lut[0], ColorMap::Jet.color(-3.0));
        assert_eq!(lut[255], ColorMap::Jet.color(7.0));
        assert_eq!(ColorMap::Jet.color(f32::NAN), lut[0]);
    }

    #[test]
    fn test_coolwarm_anchors() {
        assert_eq!(ColorMap::Coolwarm.color(0.0), Rgb([59, 76, 192]));
        assert_eq!(ColorMap::Coolwarm.color(0.5), Rgb([221, 221, 221]));
        assert_eq!(ColorMap::Coolwarm.color(1.0), Rgb([180, 4, 38]));
    }

    #[test]
    fn test_gray() {
        assert_eq!(ColorMap::Gray.color(1.0), Rgb([255, 255, 255]));
        assert_eq!(ColorMap::Gray.color(0.0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_unshifted_map_is_identity() {
        let shifted = ShiftedColorMap::new(ColorMap::Coolwarm, 0.5);
        for t in [0.0, 0.2, 0.5, 0.8, 1.0] {
            assert_eq!(shifted.color(t), ColorMap::Coolwarm.color(t));
        }
    }

    #[test]
    fn test_shifted_midpoint_gets_centre_colour() {
        // data from -15 to 5: zero sits at 0.75
        let shifted = ShiftedColorMap::centered_on_zero(ColorMap::Coolwarm, -15.0, 5.0);
        assert!((shifted.midpoint - 0.75).abs() < 1e-6);
        assert_eq!(shifted.color(0.75), ColorMap::Coolwarm.color(0.5));
        assert_eq!(shifted.color(1.0), ColorMap::Coolwarm.color(1.0));
    }

    #[test]
    fn test_shifted_range() {
        let shifted = ShiftedColorMap::new(ColorMap::Gray, 0.5).with_range(0.2, 0.8);
        assert_eq!(shifted.color(0.0), ColorMap::Gray.color(0.2));
        assert_eq!(shifted.color(1.0), ColorMap::Gray.color(0.8));
    }
}
