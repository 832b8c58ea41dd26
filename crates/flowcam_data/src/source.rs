//! Directory-backed patch sources.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::{DataError, Result};
use crate::flow::FlowPatch;
use crate::io::read_flow_npy;

/// A sorted list of `.npy` flow patches.
///
/// # Example
///
/// ```rust,ignore
/// use flowcam_data::PatchSource;
///
/// let source = PatchSource::from_dir("flow_patches/centered_CW")?;
/// for patch in source.iter().take(40) {
///     match patch {
///         Ok(patch) => println!("{}", patch.path().display()),
///         Err(e) => eprintln!("skipping: {e}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PatchSource {
    paths: Vec<PathBuf>,
}

impl PatchSource {
    /// Collect every `*.npy` file directly inside `dir`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory can't be read or holds no patches.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_npy = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("npy"))
                .unwrap_or(false);
            if is_npy && path.is_file() {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(DataError::EmptySource(dir.to_path_buf()));
        }
        paths.sort();
        tracing::debug!(dir = %dir.display(), n_patches = paths.len(), "scanned patch directory");
        Ok(Self { paths })
    }

    /// Create a source from explicit paths, kept in the given order.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Patch paths.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Number of patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if the source holds no patches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Stream patches in order, reading each file lazily.
    ///
    /// A file that fails to load yields an `Err` item; iteration continues
    /// with the next file.
    pub fn iter(&self) -> impl Iterator<Item = Result<FlowPatch>> + '_ {
        self.paths.iter().map(|path| load_patch(path))
    }

    /// Stream patches forever, starting over after the last file.
    pub fn cycle(&self) -> impl Iterator<Item = Result<FlowPatch>> + '_ {
        self.paths.iter().cycle().map(|path| load_patch(path))
    }

    /// Read every patch in parallel.
    ///
    /// Results keep the source order.
    pub fn load_all(&self) -> Vec<Result<FlowPatch>> {
        self.paths.par_iter().map(|path| load_patch(path)).collect()
    }
}

fn load_patch(path: &Path) -> Result<FlowPatch> {
    let field = read_flow_npy(path)?;
    Ok(FlowPatch::new(path, field))
}
