//! Patch shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape of a single classifier input patch.
///
/// Follows burn's channel-first convention `(C, H, W)`. Flow patches are
/// single-channel magnitude images, so the common case is `(1, 64, 64)`.
///
/// # Example
///
/// ```rust
/// use flowcam_core::PatchShape;
///
/// let shape = PatchShape::square(1, 64);
/// assert_eq!(shape.as_array(), [1, 64, 64]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchShape {
    channels: usize,
    height: usize,
    width: usize,
}

impl PatchShape {
    /// Create a new shape.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Create a shape with equal height and width.
    #[must_use]
    pub const fn square(channels: usize, size: usize) -> Self {
        Self::new(channels, size, size)
    }

    /// Create a shape from a `[C, H, W]` slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 3 elements.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match dims {
            [c, h, w] => Ok(Self::new(*c, *h, *w)),
            _ => Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            }),
        }
    }

    /// Number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Convert to a `[C, H, W]` array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Convert to a batched `[1, C, H, W]` array.
    #[must_use]
    pub const fn batched(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }

    /// Ensure another shape matches this one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidShape`] when the shapes differ.
    pub fn check(&self, other: &Self) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(CoreError::InvalidShape {
                expected: self.to_string(),
                got: other.to_string(),
            })
        }
    }
}

impl std::fmt::Display for PatchShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(C={}, H={}, W={})", self.channels, self.height, self.width)
    }
}

impl From<[usize; 3]> for PatchShape {
    fn from([channels, height, width]: [usize; 3]) -> Self {
        Self::new(channels, height, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_from_dims() {
        let shape = PatchShape::from_dims(&[1, 64, 32]).unwrap();
        assert_eq!(shape.as_array(), [1, 64, 32]);
        assert_eq!(shape.batched(), [1, 1, 64, 32]);

        assert!(PatchShape::from_dims(&[64, 64]).is_err());
        assert!(PatchShape::from_dims(&[1, 1, 64, 64]).is_err());
    }

    #[test]
    fn test_shape_numel_and_empty() {
        assert_eq!(PatchShape::square(1, 64).numel(), 4096);
        assert!(PatchShape::new(1, 0, 64).is_empty());
        assert!(!PatchShape::square(3, 8).is_empty());
    }

    #[test]
    fn test_shape_check() {
        let expected = PatchShape::square(1, 64);
        assert!(expected.check(&PatchShape::square(1, 64)).is_ok());

        let err = expected.check(&PatchShape::square(1, 32)).unwrap_err();
        assert!(err.to_string().contains("H=32"));
    }

    #[test]
    fn test_shape_serialization() {
        let shape = PatchShape::square(1, 64);
        let json = serde_json::to_string(&shape).unwrap();
        let restored: PatchShape = serde_json::from_str(&json).unwrap();
        assert_eq!(shape, restored);
    }
}
