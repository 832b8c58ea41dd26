//! Mapping data values to the `[0, 1]` range a colour map expects.

use ndarray::Array2;

/// Piecewise-linear normalisation that sends `midpoint` to `0.5`.
///
/// `vmin` maps to `0.0` and `vmax` to `1.0`, so a diverging colour map puts
/// its centre colour exactly at `midpoint` even when the data is lopsided.
/// Values outside `[vmin, vmax]` are clamped and NaN stays NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidpointNormalize {
    /// Value drawn as the lowest colour.
    pub vmin: f32,
    /// Value drawn as the centre colour.
    pub midpoint: f32,
    /// Value drawn as the highest colour.
    pub vmax: f32,
}

impl MidpointNormalize {
    /// Create a normalisation.
    pub fn new(vmin: f32, midpoint: f32, vmax: f32) -> Self {
        Self {
            vmin,
            midpoint,
            vmax,
        }
    }

    /// Normalisation spanning the finite range of `values`.
    pub fn for_data(values: &Array2<f32>, midpoint: f32) -> Self {
        let (vmin, vmax) = finite_range(values).unwrap_or((midpoint, midpoint));
        Self::new(vmin, midpoint, vmax)
    }

    /// Normalise one value.
    pub fn apply(&self, value: f32) -> f32 {
        if value.is_nan() {
            return f32::NAN;
        }
        if value <= self.midpoint {
            let span = self.midpoint - self.vmin;
            if span <= 0.0 {
                return 0.5;
            }
            (0.5 * (value - self.vmin) / span).max(0.0)
        } else {
            let span = self.vmax - self.midpoint;
            if span <= 0.0 {
                return 0.5;
            }
            (0.5 + 0.5 * (value - self.midpoint) / span).min(1.0)
        }
    }

    /// Normalise a whole array.
    pub fn apply_all(&self, values: &Array2<f32>) -> Array2<f32> {
        values.mapv(|v| self.apply(v))
    }
}

/// Smallest and largest finite values, or `None` if there are none.
pub fn finite_range(values: &Array2<f32>) -> Option<(f32, f32)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Linear rescale of `values` to `[0, 1]`.
///
/// A constant array maps to zeros. Non-finite entries map to `0.0`.
pub fn min_max(values: &Array2<f32>) -> Array2<f32> {
    match finite_range(values) {
        Some((lo, hi)) if hi > lo => values.mapv(|v| {
            if v.is_finite() {
                (v - lo) / (hi - lo)
            } else {
                0.0
            }
        }),
        _ => Array2::zeros(values.dim()),
    }
}
