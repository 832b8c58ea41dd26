//! Flow fields and classifier-ready patches.

use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use flowcam_core::{CoreError, PatchTensor};
use ndarray::Array2;

use crate::error::Result;

/// A 2-D velocity field sampled on a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    u: Array2<f32>,
    v: Array2<f32>,
}

impl FlowField {
    /// Create a flow field from its two velocity components.
    ///
    /// # Errors
    ///
    /// Returns an error if the components have different grids.
    pub fn new(u: Array2<f32>, v: Array2<f32>) -> Result<Self> {
        if u.dim() != v.dim() {
            return Err(CoreError::InvalidShape {
                expected: format!("V grid {:?}", u.dim()),
                got: format!("{:?}", v.dim()),
            }
            .into());
        }
        Ok(Self { u, v })
    }

    /// Horizontal velocity component.
    #[must_use]
    pub fn u(&self) -> &Array2<f32> {
        &self.u
    }

    /// Vertical velocity component.
    #[must_use]
    pub fn v(&self) -> &Array2<f32> {
        &self.v
    }

    /// Grid size as `(rows, cols)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        self.u.dim()
    }

    /// Velocity magnitude `sqrt(u² + v²)`.
    #[must_use]
    pub fn magnitude(&self) -> Array2<f32> {
        ndarray::Zip::from(&self.u)
            .and(&self.v)
            .map_collect(|&u, &v| (u * u + v * v).sqrt())
    }
}

/// A flow field together with the file it came from.
#[derive(Debug, Clone)]
pub struct FlowPatch {
    path: PathBuf,
    field: FlowField,
}

impl FlowPatch {
    /// Create a patch.
    pub fn new(path: impl Into<PathBuf>, field: FlowField) -> Self {
        Self {
            path: path.into(),
            field,
        }
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem used to name rendered outputs.
    #[must_use]
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "patch".to_string())
    }

    /// The underlying flow field.
    #[must_use]
    pub fn field(&self) -> &FlowField {
        &self.field
    }

    /// The image the classifiers see.
    ///
    /// The classifiers were trained on the magnitude with its two grid axes
    /// swapped, so this is `magnitude().t()`. Overlays are drawn on this
    /// image so the heatmap and the background share orientation.
    #[must_use]
    pub fn input_image(&self) -> Array2<f32> {
        self.field.magnitude().t().to_owned()
    }

    /// Classifier input as a `(1, H, W)` tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> PatchTensor<B> {
        PatchTensor::from_image(&self.input_image(), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> FlowField {
        let u = Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f32);
        let v = Array2::from_elem((2, 3), 0.0);
        FlowField::new(u, v).unwrap()
    }

    #[test]
    fn test_magnitude() {
        let u = Array2::from_elem((2, 2), 3.0f32);
        let v = Array2::from_elem((2, 2), -4.0f32);
        let mag = FlowField::new(u, v).unwrap().magnitude();
        assert!(mag.iter().all(|&m| (m - 5.0).abs() < 1e-6));
    }

    #[test]
    fn test_mismatched_components() {
        let u = Array2::<f32>::zeros((2, 2));
        let v = Array2::<f32>::zeros((2, 3));
        assert!(FlowField::new(u, v).is_err());
    }

    #[test]
    fn test_input_image_is_transposed() {
        let patch = FlowPatch::new("data/centered_CW/p001.npy", field());
        let image = patch.input_image();
        assert_eq!(image.dim(), (3, 2));
        assert_eq!(image[[2, 1]], patch.field().magnitude()[[1, 2]]);
        assert_eq!(patch.stem(), "p001");
    }
}
