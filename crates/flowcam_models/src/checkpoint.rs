//! Checkpoint save and load.
//!
//! Weights are stored with burn's named MessagePack recorder at full
//! precision (`*.mpk`). A JSON metadata file with the same stem records the
//! architecture and config, so a checkpoint can be reopened without knowing
//! how it was built.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowcam_models::{checkpoint, Architecture, ModelConfig};
//! use flowcam_core::Seed;
//!
//! let config = ModelConfig::default_for(Architecture::Cnn);
//! let model = config.init_seeded::<NdArray>(Seed::default(), &device);
//! checkpoint::save_checkpoint(&model, &config, "weights/cnn.mpk", Some(Seed::default()))?;
//!
//! let loaded = checkpoint::load_checkpoint::<NdArray>("weights/cnn.mpk", None, &device)?;
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use flowcam_core::Seed;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::registry::{Architecture, ModelConfig, VortexModel};

/// File extension the recorder gives weight files.
pub const WEIGHTS_EXTENSION: &str = "mpk";

type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Path of the metadata file that accompanies `weights`.
pub fn metadata_path(weights: impl AsRef<Path>) -> PathBuf {
    weights.as_ref().with_extension("json")
}

/// Path the recorder actually writes for `weights`.
pub fn weights_path(weights: impl AsRef<Path>) -> PathBuf {
    weights.as_ref().with_extension(WEIGHTS_EXTENSION)
}

/// Save a module's weights.
pub fn save_module<B, M>(module: &M, path: impl AsRef<Path>) -> Result<PathBuf>
where
    B: Backend,
    M: Module<B>,
{
    let path = weights_path(path);
    module
        .clone()
        .save_file(path.clone(), &CheckpointRecorder::new())
        .map_err(|e| ModelError::Save(format!("{}: {e}", path.display())))?;
    Ok(path)
}

/// Load weights into an already built module of the same shape.
pub fn load_module<B, M>(module: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let path = weights_path(path);
    module
        .load_file(path.clone(), &CheckpointRecorder::new(), device)
        .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))
}

/// Checkpoint metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Architecture and config the weights belong to.
    pub model: ModelConfig,
    /// Seed used for initialisation, if the weights are untrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Additional metadata.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl CheckpointMetadata {
    /// Create new metadata for a config.
    pub fn new(model: ModelConfig) -> Self {
        Self {
            model,
            seed: None,
            extra: BTreeMap::new(),
        }
    }

    /// Record the initialisation seed.
    #[must_use]
    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed.value());
        self
    }

    /// Add extra metadata.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Architecture of the checkpoint.
    pub fn architecture(&self) -> Architecture {
        self.model.architecture()
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ModelError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ModelError::Save(e.to_string()))
    }

    /// Load metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| ModelError::Load(e.to_string()))
    }
}

/// Save a classifier and its metadata.
///
/// Returns the path of the weight file.
pub fn save_checkpoint<B: Backend>(
    model: &VortexModel<B>,
    config: &ModelConfig,
    path: impl AsRef<Path>,
    seed: Option<Seed>,
) -> Result<PathBuf> {
    if model.architecture() != config.architecture() {
        return Err(ModelError::ArchitectureMismatch {
            expected: model.architecture().to_string(),
            found: config.architecture().to_string(),
        });
    }

    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ModelError::Save(e.to_string()))?;
    }

    let weights = match model {
        VortexModel::Cnn(m) => save_module(m, path)?,
        VortexModel::ResNet(m) => save_module(m, path)?,
        VortexModel::UNet(m) => save_module(m, path)?,
    };

    let mut metadata = CheckpointMetadata::new(config.clone());
    if let Some(seed) = seed {
        metadata = metadata.with_seed(seed);
    }
    metadata.save(metadata_path(path))?;

    tracing::debug!(arch = %config.architecture(), path = %weights.display(), "saved checkpoint");
    Ok(weights)
}

/// Load a classifier from a checkpoint.
///
/// The config comes from the metadata file when one exists. Without
/// metadata, `arch` must be given and its default config is used.
///
/// # Errors
///
/// Returns [`ModelError::ArchitectureMismatch`] if `arch` disagrees with
/// the metadata, and [`ModelError::MissingMetadata`] if neither is
/// available.
pub fn load_checkpoint<B: Backend>(
    path: impl AsRef<Path>,
    arch: Option<Architecture>,
    device: &B::Device,
) -> Result<VortexModel<B>> {
    let path = path.as_ref();
    let meta_path = metadata_path(path);

    let config = if meta_path.is_file() {
        let metadata = CheckpointMetadata::load(&meta_path)?;
        if let Some(expected) = arch {
            if expected != metadata.architecture() {
                return Err(ModelError::ArchitectureMismatch {
                    expected: expected.to_string(),
                    found: metadata.architecture().to_string(),
                });
            }
        }
        metadata.model
    } else {
        let arch = arch.ok_or_else(|| ModelError::MissingMetadata(meta_path.clone()))?;
        tracing::warn!(
            path = %meta_path.display(),
            %arch,
            "no checkpoint metadata, assuming the default config"
        );
        ModelConfig::default_for(arch)
    };

    let model = match config.init::<B>(device) {
        VortexModel::Cnn(m) => VortexModel::Cnn(load_module(m, path, device)?),
        VortexModel::ResNet(m) => VortexModel::ResNet(load_module(m, path, device)?),
        VortexModel::UNet(m) => VortexModel::UNet(load_module(m, path, device)?),
    };
    tracing::debug!(arch = %model.architecture(), path = %path.display(), "loaded checkpoint");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcam_core::backend::NdArray;
    use flowcam_core::VortexClassifier;
    use serde_json::json;

    fn tiny_cnn() -> ModelConfig {
        ModelConfig::from_json(
            Architecture::Cnn,
            &json!({ "image_size": 8, "filters": [2, 2], "hidden": [4] }),
        )
        .unwrap()
    }

    #[test]
    fn test_checkpoint_metadata() {
        let meta = CheckpointMetadata::new(tiny_cnn())
            .with_seed(Seed::new(7))
            .with_extra("dataset", "centered_CW");

        assert_eq!(meta.architecture(), Architecture::Cnn);
        assert_eq!(meta.seed, Some(7));
        assert_eq!(meta.extra.get("dataset"), Some(&"centered_CW".to_string()));
    }

    #[test]
    fn test_paths() {
        assert_eq!(metadata_path("w/cnn.mpk"), PathBuf::from("w/cnn.json"));
        assert_eq!(weights_path("w/cnn"), PathBuf::from("w/cnn.mpk"));
    }

    #[test]
    fn test_save_then_load_same_logits() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = tiny_cnn();
        let model = config.init_seeded::<NdArray>(Seed::new(3), &device);

        let path = dir.path().join("nested").join("cnn.mpk");
        let written = save_checkpoint(&model, &config, &path, Some(Seed::new(3))).unwrap();
        assert!(written.is_file());
        assert!(metadata_path(&path).is_file());

        let loaded = load_checkpoint::<NdArray>(&path, None, &device).unwrap();
        let x = Tensor::<NdArray, 4>::ones([1, 1, 8, 8], &device);
        let a: Vec<f32> = model.forward(x.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(x).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_architecture_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = tiny_cnn();
        let model = config.init::<NdArray>(&device);
        let path = dir.path().join("cnn.mpk");
        save_checkpoint(&model, &config, &path, None).unwrap();

        let err = load_checkpoint::<NdArray>(&path, Some(Architecture::UNet), &device);
        assert!(matches!(err, Err(ModelError::ArchitectureMismatch { .. })));
    }

    #[test]
    fn test_missing_metadata_without_arch() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let err = load_checkpoint::<NdArray>(dir.path().join("none.mpk"), None, &device);
        assert!(matches!(err, Err(ModelError::MissingMetadata(_))));
    }
}
