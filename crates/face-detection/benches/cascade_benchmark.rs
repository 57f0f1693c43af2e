// Cascade benchmark - measure window sweep and clustering time
//
// Run with: cargo bench --bench cascade_benchmark

use cascade_faces_detection::classifier::{self, Detection};
use cascade_faces_detection::{
    cluster, CascadeModel, CascadeParameters, PixelBuffer, SplitNode, Stage, Tree,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Deterministic model shaped like a small production cascade:
/// `stages` stages of `trees` depth-6 trees each
fn synthetic_model(stages: usize, trees: usize) -> CascadeModel {
    let mut seed = 0x2545_f491u32;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        seed
    };

    let depth = 6;
    let stages = (0..stages)
        .map(|s| {
            let trees = (0..trees)
                .map(|_| {
                    let nodes = (0..(1 << depth) - 1)
                        .map(|_| {
                            let r = next().to_le_bytes();
                            SplitNode {
                                dx1: r[0] as i8,
                                dy1: r[1] as i8,
                                dx2: r[2] as i8,
                                dy2: r[3] as i8,
                                threshold: (next() % 64) as i32 - 32,
                            }
                        })
                        .collect();
                    let leaves = (0..1 << depth)
                        .map(|_| (next() % 2000) as f32 / 1000.0 - 0.9)
                        .collect();
                    Tree::new(depth, nodes, leaves).unwrap()
                })
                .collect();
            Stage::new(trees, s as f32 * 0.5).unwrap()
        })
        .collect();
    CascadeModel::new(stages).unwrap()
}

/// Test image (gradient pattern)
fn pattern(size: u32) -> PixelBuffer {
    let data = (0..size)
        .flat_map(|y| (0..size).map(move |x| ((x * 3 + y * 5) % 256) as u8))
        .collect();
    PixelBuffer::new(size, size, data).unwrap()
}

/// Benchmark the full sweep at different resolutions
fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_detect");
    group.sample_size(10);

    let model = synthetic_model(8, 16);
    let params = CascadeParameters::default();

    for size in [128u32, 320, 640] {
        let pixels = pattern(size);
        let name = format!("{size}x{size}");

        group.bench_with_input(BenchmarkId::new("parallel", &name), &pixels, |b, px| {
            b.iter(|| black_box(classifier::detect(black_box(px), &model, &params).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("sequential", &name), &pixels, |b, px| {
            b.iter(|| {
                black_box(classifier::detect_sequential(black_box(px), &model, &params).unwrap())
            });
        });
    }

    group.finish();
}

/// Benchmark a single window evaluation
fn bench_classify_window(c: &mut Criterion) {
    let model = synthetic_model(8, 16);
    let pixels = pattern(256);

    c.bench_function("classify_window_128", |b| {
        b.iter(|| black_box(classifier::classify_window(&model, &pixels, 128, 128, 128)));
    });
}

/// Benchmark clustering of dense raw detections
fn bench_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster");

    for count in [100usize, 1000, 5000] {
        let detections: Vec<Detection> = (0..count)
            .map(|i| Detection {
                row: 100 + (i % 37) as i32 * 3,
                col: 100 + (i % 53) as i32 * 2,
                scale: 40 + (i % 11) as i32 * 4,
                score: (i % 97) as f32 / 10.0,
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &detections, |b, d| {
            b.iter(|| black_box(cluster(black_box(d), 0.18)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detect, bench_classify_window, bench_cluster);
criterion_main!(benches);
