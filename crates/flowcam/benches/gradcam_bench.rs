//! Benchmarks for the Grad-CAM pipeline.
//!
//! Run with: cargo bench --bench gradcam_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use burn::prelude::*;
use ndarray::Array2;

use flowcam::prelude::*;

type ExplainBackend = AutodiffNdArray;

const SIZE: usize = 32;

fn synthetic_patch() -> FlowPatch {
    let centre = (SIZE as f32 - 1.0) / 2.0;
    let u = Array2::from_shape_fn((SIZE, SIZE), |(r, _)| centre - r as f32);
    let v = Array2::from_shape_fn((SIZE, SIZE), |(_, c)| c as f32 - centre);
    FlowPatch::new("bench.npy", FlowField::new(u, v).expect("matching grids"))
}

fn bench_configs() -> Vec<(&'static str, ModelConfig)> {
    vec![
        (
            "cnn",
            ModelConfig::Cnn(
                CnnConfig::new(1, SIZE, 3)
                    .with_filters(vec![16, 8])
                    .with_hidden(vec![32]),
            ),
        ),
        (
            "resnet",
            ModelConfig::ResNet(
                ResNetConfig::new(1, SIZE, 3)
                    .with_stem_filters(8)
                    .with_stages(vec![2, 2], vec![8, 16]),
            ),
        ),
        (
            "unet",
            ModelConfig::UNet(UNetConfig::new(1, SIZE, 3).with_base_filters(4)),
        ),
    ]
}

fn bench_grad_cam(c: &mut Criterion) {
    let mut group = c.benchmark_group("grad_cam");
    let device = <ExplainBackend as Backend>::Device::default();
    let input = synthetic_patch().to_tensor::<ExplainBackend>(&device);

    for (name, config) in bench_configs() {
        let model = config.init::<ExplainBackend>(&device);
        group.bench_with_input(BenchmarkId::new("explain", name), &model, |b, model| {
            b.iter(|| grad_cam(black_box(model), black_box(&input), None).expect("heatmap"))
        });
    }

    group.finish();
}

fn bench_panel(c: &mut Criterion) {
    let mut group = c.benchmark_group("panel");
    let device = <ExplainBackend as Backend>::Device::default();
    let patch = synthetic_patch();
    let input = patch.to_tensor::<ExplainBackend>(&device);

    let results: Vec<ModelResult> = bench_configs()
        .into_iter()
        .map(|(name, config)| {
            let model = config.init::<ExplainBackend>(&device);
            ModelResult {
                model: name.to_string(),
                explanation: GradCam::default().explain(&model, &input).expect("explanation"),
            }
        })
        .collect();
    let explained = ExplainedPatch { patch, results };

    for scale in [1u32, 4] {
        let config = PanelConfig::default().with_scale(scale);
        group.bench_with_input(BenchmarkId::new("render", scale), &config, |b, config| {
            b.iter(|| render_panel(black_box(&explained), config).expect("panel"))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grad_cam, bench_panel);
criterion_main!(benches);
