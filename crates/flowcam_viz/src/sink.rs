//! Destinations for rendered explanations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flowcam_data::FlowPatch;
use flowcam_explain::Explanation;
use serde::Serialize;

use crate::error::Result;
use crate::panel::{render_panel, PanelConfig};

/// One model's explanation of a patch.
#[derive(Debug, Clone)]
pub struct ModelResult {
    /// Display name of the model.
    pub model: String,
    /// Its Grad-CAM explanation.
    pub explanation: Explanation,
}

/// A patch with the explanations of every model that looked at it.
#[derive(Debug, Clone)]
pub struct ExplainedPatch {
    /// The explained patch.
    pub patch: FlowPatch,
    /// One entry per model, in panel order.
    pub results: Vec<ModelResult>,
}

/// Something that persists explained patches.
pub trait VisualizationSink {
    /// Write one patch, returning the path written.
    fn write(&mut self, explained: &ExplainedPatch) -> Result<PathBuf>;

    /// Flush anything buffered.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Writes one comparison panel PNG per patch, `<stem>_gradcam.png`.
#[derive(Debug, Clone)]
pub struct PngSink {
    dir: PathBuf,
    config: PanelConfig,
}

impl PngSink {
    /// Sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>, config: PanelConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }

    /// Output path for `patch`.
    pub fn path_for(&self, patch: &FlowPatch) -> PathBuf {
        self.dir.join(format!("{}_gradcam.png", patch.stem()))
    }
}

impl VisualizationSink for PngSink {
    fn write(&mut self, explained: &ExplainedPatch) -> Result<PathBuf> {
        let panel = render_panel(explained, &self.config)?;
        ensure_dir(&self.dir)?;
        let path = self.path_for(&explained.patch);
        panel.save(&path)?;
        tracing::debug!(path = %path.display(), width = panel.width(), "wrote panel");
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
struct ModelReport<'a> {
    model: &'a str,
    layer: &'a str,
    target_class: usize,
    label: Option<String>,
    confidence: f32,
    logits: &'a [f32],
    probabilities: Vec<f32>,
    heatmap: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct PatchReport<'a> {
    source: String,
    models: Vec<ModelReport<'a>>,
}

impl<'a> PatchReport<'a> {
    fn new(explained: &'a ExplainedPatch) -> Self {
        let models = explained
            .results
            .iter()
            .map(|result| {
                let explanation = &result.explanation;
                ModelReport {
                    model: &result.model,
                    layer: &explanation.layer,
                    target_class: explanation.target_class,
                    label: explanation.label().map(|l| l.to_string()),
                    confidence: explanation.confidence(),
                    logits: &explanation.logits,
                    probabilities: explanation.probabilities(),
                    heatmap: explanation.heatmap.to_rows(),
                }
            })
            .collect();
        Self {
            source: explained.patch.path().display().to_string(),
            models,
        }
    }
}

/// Writes one JSON report per patch, `<stem>_gradcam.json`, holding each
/// model's prediction and raw heatmap.
#[derive(Debug, Clone)]
pub struct JsonSink {
    dir: PathBuf,
}

impl JsonSink {
    /// Sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output path for `patch`.
    pub fn path_for(&self, patch: &FlowPatch) -> PathBuf {
        self.dir.join(format!("{}_gradcam.json", patch.stem()))
    }
}

impl VisualizationSink for JsonSink {
    fn write(&mut self, explained: &ExplainedPatch) -> Result<PathBuf> {
        ensure_dir(&self.dir)?;
        let path = self.path_for(&explained.patch);
        let payload = serde_json::to_string_pretty(&PatchReport::new(explained))?;
        fs::write(&path, payload)?;
        tracing::debug!(path = %path.display(), "wrote report");
        Ok(path)
    }
}
