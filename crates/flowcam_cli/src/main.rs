//! flowcam CLI for inspecting vortex classifiers and rendering Grad-CAM
//! explanations of flow patches.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::tensor::backend::Backend;
use flowcam_core::backend::{AutodiffNdArray, NdArray};
use flowcam_core::{argmax, PatchTensor, Seed, VortexClass, VortexClassifier, DEFAULT_SEED};
use flowcam_data::PatchSource;
use flowcam_explain::{find_last_spatial_layer, ActivationCapture, GradCam, GradCamConfig};
use flowcam_models::{load_checkpoint, save_checkpoint, Architecture, ModelConfig, VortexModel};
use flowcam_viz::{
    ExplainedPatch, Interpolation, JsonSink, ModelResult, OverlayConfig, PanelConfig, PngSink,
    VisualizationSink,
};

/// Backend for Grad-CAM, which needs gradients.
type ExplainBackend = AutodiffNdArray;

/// Backend for plain inference.
type InferBackend = NdArray;

#[derive(Parser)]
#[command(name = "flowcam")]
#[command(author, version)]
#[command(about = "Grad-CAM explanations for flow-field vortex classifiers")]
#[command(long_about = "flowcam: Grad-CAM heatmaps for CNN, ResNet-101 and U-Net classifiers \
of 64x64 flow patches (CCW, CW, SADDLE).

EXAMPLES:
  # Show the layers of the CNN and the layer Grad-CAM uses
  flowcam layers --arch cnn

  # Write a seeded checkpoint
  flowcam init --arch unet --seed 1234 --output weights/unet.mpk

  # Classify every patch in a directory
  flowcam predict --weights weights/unet.mpk --patches flow_patches/centered_CW

  # Explain the first 40 patches with all three models
  flowcam explain --patches flow_patches/centered_CW --limit 40 \\
      --model cnn=weights/cnn.mpk --model resnet=weights/resnet.mpk \\
      --model unet=weights/unet.mpk --output gradcam_out

AVAILABLE MODELS:
  cnn              - three conv blocks and a dense head
  resnet           - ResNet-101 backbone behind a 1-to-3 channel adapter
  unet (u_net)     - U-Net encoder/decoder with a dense head")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a classifier's layers and the layer Grad-CAM explains
    Layers {
        /// Model architecture: cnn, resnet, unet
        #[arg(long, value_name = "MODEL")]
        arch: String,

        /// JSON config overrides, e.g. '{"image_size": 32}'
        #[arg(long, value_name = "JSON")]
        config: Option<String>,
    },
    /// Write a checkpoint with seeded initial weights
    Init {
        /// Model architecture: cnn, resnet, unet
        #[arg(long, value_name = "MODEL")]
        arch: String,

        /// JSON config overrides
        #[arg(long, value_name = "JSON")]
        config: Option<String>,

        /// Random seed for the weights
        #[arg(long, default_value_t = DEFAULT_SEED, value_name = "SEED")]
        seed: u64,

        /// Output weight file (.mpk)
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Classify every patch in a directory
    Predict {
        /// Model architecture, required when the checkpoint has no metadata
        #[arg(long, value_name = "MODEL")]
        arch: Option<String>,

        /// Weight file (.mpk)
        #[arg(long, value_name = "FILE")]
        weights: PathBuf,

        /// Directory of .npy flow patches
        #[arg(long, value_name = "DIR")]
        patches: PathBuf,

        /// Stop after N patches
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Render Grad-CAM explanations of every model on every patch
    Explain {
        /// Directory of .npy flow patches
        #[arg(long, value_name = "DIR")]
        patches: PathBuf,

        /// Model as ARCH=WEIGHTS, or ARCH for seeded weights; repeatable
        #[arg(long = "model", value_name = "ARCH[=FILE]", required = true)]
        models: Vec<String>,

        /// Output directory
        #[arg(long, default_value = "./gradcam_out", value_name = "DIR")]
        output: PathBuf,

        /// Stop after N patches
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Layer to explain instead of the last convolution
        #[arg(long, value_name = "ID")]
        layer: Option<String>,

        /// Class to explain instead of the predicted one
        #[arg(long, value_name = "INDEX")]
        target_class: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
        format: OutputFormat,

        /// Heatmap weight in the overlay
        #[arg(long, default_value_t = 0.4, value_name = "ALPHA")]
        alpha: f32,

        /// Heatmap resampling: nearest, bilinear, bicubic
        #[arg(long, default_value = "bicubic", value_name = "MODE")]
        interpolation: String,

        /// Integer upscaling of panel tiles
        #[arg(long, default_value_t = 4, value_name = "N")]
        scale: u32,

        /// Seed for models given without weights
        #[arg(long, default_value_t = DEFAULT_SEED, value_name = "SEED")]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One comparison panel PNG per patch
    Png,
    /// One JSON report per patch
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Layers { arch, config } => handle_layers(&arch, config.as_deref()),
        Commands::Init {
            arch,
            config,
            seed,
            output,
        } => handle_init(&arch, config.as_deref(), seed, &output),
        Commands::Predict {
            arch,
            weights,
            patches,
            limit,
        } => handle_predict(arch.as_deref(), &weights, &patches, limit),
        Commands::Explain {
            patches,
            models,
            output,
            limit,
            layer,
            target_class,
            format,
            alpha,
            interpolation,
            scale,
            seed,
        } => {
            let gradcam = GradCamConfig {
                layer,
                target_class,
            };
            let overlay = OverlayConfig::default()
                .with_alpha(alpha)
                .with_interpolation(parse_interpolation(&interpolation)?);
            let panel = PanelConfig {
                overlay,
                ..PanelConfig::default().with_scale(scale)
            };
            let sink: Box<dyn VisualizationSink> = match format {
                OutputFormat::Png => Box::new(PngSink::new(&output, panel)),
                OutputFormat::Json => Box::new(JsonSink::new(&output)),
            };
            handle_explain(&patches, &models, limit, gradcam, sink, Seed::new(seed))
        }
    }
}

fn parse_arch(name: &str) -> Result<Architecture> {
    name.parse::<Architecture>()
        .map_err(|e| anyhow!("{e}. Available architectures: cnn, resnet, unet"))
}

fn parse_interpolation(name: &str) -> Result<Interpolation> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase()))
        .with_context(|| format!("Unknown interpolation '{name}'"))
}

fn model_config(arch: Architecture, config: Option<&str>) -> Result<ModelConfig> {
    let overrides = match config {
        Some(json) => serde_json::from_str(json).context("Config overrides are not valid JSON")?,
        None => serde_json::Value::Null,
    };
    ModelConfig::from_json(arch, &overrides).context("Invalid model config")
}

fn handle_layers(arch: &str, config: Option<&str>) -> Result<()> {
    let arch = parse_arch(arch)?;
    let config = model_config(arch, config)?;
    let device = <InferBackend as Backend>::Device::default();
    let model = config.init::<InferBackend>(&device);

    let located = find_last_spatial_layer::<InferBackend, _>(&model)
        .context("Model has no layer Grad-CAM can explain")?;

    // one pass on a blank patch to record every spatial output shape
    let shape = model.input_shape();
    let blank = PatchTensor::<InferBackend>::from_values(vec![0.0; shape.numel()], shape, &device)
        .context("Failed to build a blank patch")?;
    let mut capture = ActivationCapture::<InferBackend>::new();
    model.forward_tapped(blank.batched(), &mut capture);

    let layers = model.layers();
    println!("Model: {} (input {})", model.name(), shape);
    println!("─────────────────────────────────────────");
    for (i, layer) in layers.iter().enumerate() {
        let output = capture
            .dims(layer.id())
            .map(|[_, c, h, w]| format!("{c}x{h}x{w}"))
            .unwrap_or_default();
        let marker = if layer.id() == located { "  <- Grad-CAM" } else { "" };
        println!(
            "{:>4}  {:<28} {:<12} {:<14}{}",
            i,
            layer.id(),
            layer.kind().to_string(),
            output,
            marker
        );
    }
    println!();
    println!("  Layers:          {}", layers.len());
    println!("  Grad-CAM layer:  {}", located);
    Ok(())
}

fn handle_init(arch: &str, config: Option<&str>, seed: u64, output: &Path) -> Result<()> {
    let arch = parse_arch(arch)?;
    let config = model_config(arch, config)?;
    let seed = Seed::new(seed);
    let device = <InferBackend as Backend>::Device::default();

    tracing::info!(%arch, seed = seed.value(), "initialising model");
    let model = config.init_seeded::<InferBackend>(seed, &device);
    let path = save_checkpoint(&model, &config, output, Some(seed))
        .with_context(|| format!("Failed to write checkpoint to {}", output.display()))?;

    println!("Wrote {} checkpoint to {}", arch, path.display());
    Ok(())
}

fn handle_predict(
    arch: Option<&str>,
    weights: &Path,
    patches: &Path,
    limit: Option<usize>,
) -> Result<()> {
    let arch = arch.map(parse_arch).transpose()?;
    let device = <InferBackend as Backend>::Device::default();
    let model: VortexModel<InferBackend> = load_checkpoint(weights, arch, &device)
        .with_context(|| format!("Failed to load checkpoint {}", weights.display()))?;
    let source = PatchSource::from_dir(patches)
        .with_context(|| format!("Failed to read patches from {}", patches.display()))?;

    let mut counts = [0usize; VortexClass::COUNT];
    let mut skipped = 0;
    for patch in source.iter().take(limit.unwrap_or(usize::MAX)) {
        let patch = match patch {
            Ok(patch) => patch,
            Err(e) => {
                tracing::warn!(error = %e, "skipping patch");
                skipped += 1;
                continue;
            }
        };
        let input = patch.to_tensor::<InferBackend>(&device);
        if model.input_shape() != input.shape() {
            tracing::warn!(
                patch = %patch.path().display(),
                expected = %model.input_shape(),
                got = %input.shape(),
                "skipping patch with wrong size"
            );
            skipped += 1;
            continue;
        }

        let probs: Vec<f32> = model
            .forward_probs(input.batched())
            .into_data()
            .to_vec()
            .map_err(|e| anyhow!("{e:?}"))?;
        let Some(index) = argmax(&probs) else {
            tracing::warn!(patch = %patch.path().display(), "no finite prediction");
            skipped += 1;
            continue;
        };
        let label = VortexClass::from_index(index)
            .map(|c| c.to_string())
            .unwrap_or_else(|_| format!("class {index}"));
        if let Some(count) = counts.get_mut(index) {
            *count += 1;
        }
        println!("{:<32} {:<7} {:.3}", patch.stem(), label, probs[index]);
    }

    println!();
    for class in VortexClass::ALL {
        println!("  {:<7} {}", class, counts[class.index()]);
    }
    if skipped > 0 {
        println!("  skipped {skipped}");
    }
    Ok(())
}

fn load_models(specs: &[String], seed: Seed) -> Result<Vec<(String, VortexModel<ExplainBackend>)>> {
    let device = <ExplainBackend as Backend>::Device::default();
    specs
        .iter()
        .map(|spec| {
            let (arch, weights) = match spec.split_once('=') {
                Some((arch, weights)) => (parse_arch(arch)?, Some(PathBuf::from(weights))),
                None => (parse_arch(spec)?, None),
            };
            let model = match weights {
                Some(path) => load_checkpoint::<ExplainBackend>(&path, Some(arch), &device)
                    .with_context(|| format!("Failed to load checkpoint {}", path.display()))?,
                None => {
                    tracing::warn!(%arch, seed = seed.value(), "no weights given, using seeded weights");
                    ModelConfig::default_for(arch)
                        .init_seeded::<ExplainBackend>(seed.derive(arch.name()), &device)
                }
            };
            Ok((arch.to_string(), model))
        })
        .collect()
}

fn handle_explain(
    patches: &Path,
    specs: &[String],
    limit: Option<usize>,
    gradcam: GradCamConfig,
    mut sink: Box<dyn VisualizationSink>,
    seed: Seed,
) -> Result<()> {
    if specs.is_empty() {
        bail!("At least one --model is required");
    }
    let models = load_models(specs, seed)?;
    let source = PatchSource::from_dir(patches)
        .with_context(|| format!("Failed to read patches from {}", patches.display()))?;
    let explainer = GradCam::new(gradcam);
    let device = <ExplainBackend as Backend>::Device::default();

    let mut written = 0;
    let mut skipped = 0;
    for patch in source.iter().take(limit.unwrap_or(usize::MAX)) {
        let patch = match patch {
            Ok(patch) => patch,
            Err(e) => {
                tracing::warn!(error = %e, "skipping patch");
                skipped += 1;
                continue;
            }
        };
        let input = patch.to_tensor::<ExplainBackend>(&device);

        let mut results = Vec::with_capacity(models.len());
        for (name, model) in &models {
            match explainer.explain(model, &input) {
                Ok(explanation) => {
                    tracing::info!(
                        patch = %patch.stem(),
                        model = %name,
                        layer = %explanation.layer,
                        label = ?explanation.label(),
                        confidence = explanation.confidence(),
                        "explained"
                    );
                    results.push(ModelResult {
                        model: name.clone(),
                        explanation,
                    });
                }
                Err(e) => {
                    tracing::warn!(patch = %patch.stem(), model = %name, error = %e, "explanation failed");
                }
            }
        }
        if results.is_empty() {
            skipped += 1;
            continue;
        }

        let path = sink.write(&ExplainedPatch { patch, results })?;
        tracing::debug!(path = %path.display(), "written");
        written += 1;
    }
    sink.finish()?;

    println!("Explained {written} patches ({skipped} skipped)");
    Ok(())
}
