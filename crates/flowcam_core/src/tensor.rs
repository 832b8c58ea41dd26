//! Patch tensor wrapper.

use burn::prelude::*;
use ndarray::Array2;

use crate::error::{CoreError, Result};
use crate::shape::PatchShape;

/// A single input patch with shape metadata.
///
/// Wraps a `(C, H, W)` burn tensor. Classifiers take batched `(1, C, H, W)`
/// input, see [`PatchTensor::batched`].
///
/// # Example
///
/// ```rust,ignore
/// use flowcam_core::PatchTensor;
///
/// let image = ndarray::Array2::<f32>::zeros((64, 64));
/// let patch = PatchTensor::<NdArray>::from_image(&image, &device);
/// assert_eq!(patch.shape().as_array(), [1, 64, 64]);
/// ```
#[derive(Debug, Clone)]
pub struct PatchTensor<B: Backend> {
    inner: Tensor<B, 3>,
    shape: PatchShape,
}

impl<B: Backend> PatchTensor<B> {
    /// Wrap a `(C, H, W)` tensor.
    pub fn new(tensor: Tensor<B, 3>) -> Self {
        let shape = PatchShape::from(tensor.dims());
        Self {
            inner: tensor,
            shape,
        }
    }

    /// Build a single-channel patch from a 2-D image.
    pub fn from_image(image: &Array2<f32>, device: &B::Device) -> Self {
        let (height, width) = image.dim();
        let values: Vec<f32> = image.iter().copied().collect();
        let data = TensorData::new(values, [1, height, width]);
        Self::new(Tensor::from_data(data, device))
    }

    /// Build a patch from raw values in `(C, H, W)` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of values doesn't match the shape.
    pub fn from_values(values: Vec<f32>, shape: PatchShape, device: &B::Device) -> Result<Self> {
        if values.len() != shape.numel() {
            return Err(CoreError::InvalidShape {
                expected: format!("{} values for {}", shape.numel(), shape),
                got: format!("{} values", values.len()),
            });
        }
        let data = TensorData::new(values, shape.as_array());
        Ok(Self::new(Tensor::from_data(data, device)))
    }

    /// Shape metadata.
    #[must_use]
    pub const fn shape(&self) -> PatchShape {
        self.shape
    }

    /// Reference to the underlying tensor.
    #[must_use]
    pub const fn inner(&self) -> &Tensor<B, 3> {
        &self.inner
    }

    /// Consume self and return the underlying tensor.
    #[must_use]
    pub fn into_inner(self) -> Tensor<B, 3> {
        self.inner
    }

    /// Add the batch axis: `(C, H, W)` -> `(1, C, H, W)`.
    pub fn batched(&self) -> Tensor<B, 4> {
        self.inner.clone().unsqueeze::<4>()
    }

    /// Device the tensor lives on.
    pub fn device(&self) -> B::Device {
        self.inner.device()
    }

    /// Move the patch to another device or backend-compatible device.
    pub fn to_device(&self, device: &B::Device) -> Self {
        Self {
            inner: self.inner.clone().to_device(device),
            shape: self.shape,
        }
    }

    /// Copy the values out in `(C, H, W)` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend data cannot be read as `f32`.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.inner
            .clone()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| CoreError::TensorData(format!("{:?}", e)))
    }
}

#[cfg(all(test, feature = "backend-ndarray"))]
mod tests {
    use super::*;
    use crate::backend::NdArray;

    #[test]
    fn test_from_image() {
        let device = Default::default();
        let image = Array2::from_shape_fn((4, 3), |(r, c)| (r * 3 + c) as f32);
        let patch = PatchTensor::<NdArray>::from_image(&image, &device);

        assert_eq!(patch.shape(), PatchShape::new(1, 4, 3));
        assert_eq!(patch.batched().dims(), [1, 1, 4, 3]);
        let values = patch.to_vec().unwrap();
        assert_eq!(values[5], 5.0);
    }

    #[test]
    fn test_from_values_checks_length() {
        let device = Default::default();
        let shape = PatchShape::square(1, 2);
        assert!(PatchTensor::<NdArray>::from_values(vec![0.0; 4], shape, &device).is_ok());
        assert!(PatchTensor::<NdArray>::from_values(vec![0.0; 3], shape, &device).is_err());
    }
}
