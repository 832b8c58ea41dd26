//! Grad-CAM layer selection.

use burn::prelude::*;
use flowcam_core::{LayerInfo, VortexClassifier};

use crate::error::{ExplainError, Result};

/// Id of the last spatial feature layer (convolution) of `model`.
///
/// Layers are scanned in reverse construction order; dense, pooling,
/// normalisation, activation, concatenation and flatten layers are skipped.
///
/// # Errors
///
/// Returns [`ExplainError::NoSpatialLayerFound`] if the classifier has no
/// convolution.
pub fn find_last_spatial_layer<B, M>(model: &M) -> Result<String>
where
    B: Backend,
    M: VortexClassifier<B> + ?Sized,
{
    let layer = model
        .layers()
        .into_iter()
        .rev()
        .find(LayerInfo::is_spatial)
        .ok_or_else(|| ExplainError::NoSpatialLayerFound {
            model: model.name().to_string(),
        })?;

    tracing::debug!(model = model.name(), layer = layer.id(), "located Grad-CAM layer");
    Ok(layer.id().to_string())
}

/// Look up `layer` and check that its output is a spatial map.
///
/// Any layer that keeps the spatial layout qualifies, so a pooling or
/// normalisation layer can be explained when asked for by name.
pub fn resolve_layer<B, M>(model: &M, layer: &str) -> Result<LayerInfo>
where
    B: Backend,
    M: VortexClassifier<B> + ?Sized,
{
    let info = model
        .layer(layer)
        .ok_or_else(|| ExplainError::LayerNotFound {
            layer: layer.to_string(),
            model: model.name().to_string(),
        })?;

    if !info.kind().keeps_spatial_layout() {
        return Err(ExplainError::LayerNotSpatial {
            layer: layer.to_string(),
            kind: info.kind().to_string(),
        });
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlatOnly, ToyClassifier, TOY_LAYER};
    use flowcam_core::backend::NdArray;

    #[test]
    fn test_picks_last_conv_not_last_layer() {
        let model = ToyClassifier::<NdArray>::default();
        assert_eq!(find_last_spatial_layer::<NdArray, _>(&model).unwrap(), TOY_LAYER);
    }

    #[test]
    fn test_no_spatial_layer() {
        let err = find_last_spatial_layer::<NdArray, _>(&FlatOnly).unwrap_err();
        assert!(matches!(err, ExplainError::NoSpatialLayerFound { .. }));
    }

    #[test]
    fn test_resolve_layer() {
        let model = ToyClassifier::<NdArray>::default();
        assert!(resolve_layer::<NdArray, _>(&model, "stem").is_ok());
        assert!(resolve_layer::<NdArray, _>(&model, "stem_relu").is_ok());

        let err = resolve_layer::<NdArray, _>(&model, "missing").unwrap_err();
        assert!(matches!(err, ExplainError::LayerNotFound { .. }));

        let err = resolve_layer::<NdArray, _>(&model, "flatten").unwrap_err();
        assert!(matches!(err, ExplainError::LayerNotSpatial { .. }));
    }
}
