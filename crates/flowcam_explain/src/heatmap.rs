//! Normalised Grad-CAM heatmaps.

use ndarray::Array2;

/// A Grad-CAM heatmap at the explained layer's resolution.
///
/// Values lie in `[0, 1]`. The maximum is exactly `1.0` unless the map was
/// non-positive everywhere, in which case every value is `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    values: Array2<f32>,
}

impl Heatmap {
    /// Clip negatives to zero and divide by the maximum.
    ///
    /// A map with no positive entry becomes all zeros. NaN entries are
    /// treated as zero.
    pub fn normalize(raw: Array2<f32>) -> Self {
        let clipped = raw.mapv(|v| v.max(0.0));
        let max = clipped.iter().copied().fold(0.0f32, f32::max);

        let values = if max > 0.0 && max.is_finite() {
            clipped.mapv(|v| v / max)
        } else {
            if max.is_infinite() {
                tracing::warn!("heatmap has an infinite peak, returning zeros");
            }
            Array2::zeros(clipped.dim())
        };
        Self { values }
    }

    /// An all-zero heatmap.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            values: Array2::zeros((height, width)),
        }
    }

    /// Heatmap values, indexed `[row, col]`.
    #[must_use]
    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    /// Consume the heatmap, returning its values.
    pub fn into_inner(self) -> Array2<f32> {
        self.values
    }

    /// Size as `(height, width)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Largest value: `1.0`, or `0.0` for a degenerate map.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    /// Check if no location received positive importance.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// Rescale to `0..=255`, truncating like a `uint8` cast.
    #[must_use]
    pub fn to_u8(&self) -> Array2<u8> {
        self.values.mapv(|v| (v * 255.0) as u8)
    }

    /// Rows as nested vectors, for serialisation.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.values.rows().into_iter().map(|row| row.to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_max_is_one() {
        let heatmap = Heatmap::normalize(array![[1.0, -2.0], [4.0, 2.0]]);
        assert_eq!(heatmap.values(), &array![[0.25, 0.0], [1.0, 0.5]]);
        assert_eq!(heatmap.max(), 1.0);
        assert!(!heatmap.is_degenerate());
    }

    #[test]
    fn test_non_positive_map_is_zero() {
        let heatmap = Heatmap::normalize(array![[-1.0, 0.0], [-3.0, -0.5]]);
        assert!(heatmap.is_degenerate());
        assert_eq!(heatmap, Heatmap::zeros(2, 2));
    }

    #[test]
    fn test_nan_is_clipped() {
        let heatmap = Heatmap::normalize(array![[f32::NAN, 2.0]]);
        assert_eq!(heatmap.values(), &array![[0.0, 1.0]]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = Heatmap::normalize(array![[0.3, 1.7, -0.2], [0.9, 0.0, 1.1]]);
        let twice = Heatmap::normalize(once.values().clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_to_u8_truncates() {
        let heatmap = Heatmap::normalize(array![[1.0, 0.5, 0.999]]);
        assert_eq!(heatmap.to_u8(), array![[255u8, 127, 254]]);
        assert_eq!(heatmap.to_rows(), vec![vec![1.0, 0.5, 0.999]]);
    }
}
