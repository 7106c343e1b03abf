//! Criterion benchmarks for pair sampling.
//!
//! Run with: cargo bench --bench sampling

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vox2vec::{
    sample_batch, sample_pair, AppearanceTransform, BoxSampler, IntensityAugment, PairSampler,
    Scan, Volume, Voxel, WindowConfig,
};

fn test_scan(n: usize, body: usize) -> Scan {
    let volume = Volume::new(Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        ((i * 31 + j * 17 + k) % 2000) as f32 - 1000.0
    }));
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let voxels: Vec<Voxel> = (0..body)
        .map(|_| {
            [
                rng.gen_range(0..n as i64),
                rng.gen_range(0..n as i64),
                rng.gen_range(0..n as i64),
            ]
        })
        .collect();
    Scan::new(volume, voxels).unwrap()
}

fn ct_augment() -> IntensityAugment {
    IntensityAugment::ct(WindowConfig::new(
        (-1350.0, 1000.0),
        (-1000.0, 300.0),
        (-1350.0, 1000.0),
    ))
}

/// Benchmark one pair for each augmentation chain
fn bench_sample_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_pair");
    let scan = test_scan(128, 200_000);
    let chains = [
        ("none", IntensityAugment::none()),
        ("ct", ct_augment()),
        ("mri", IntensityAugment::mri(AppearanceTransform::default())),
    ];

    for (name, augment) in &chains {
        group.bench_with_input(BenchmarkId::new("patch32", name), augment, |b, augment| {
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            b.iter(|| {
                let pair = sample_pair(
                    &scan.volume,
                    &scan.body_voxels,
                    [32, 32, 32],
                    1024,
                    &BoxSampler::new(),
                    augment,
                    &mut rng,
                )
                .unwrap();
                black_box(pair)
            })
        });
    }

    group.finish();
}

/// Benchmark batch assembly at several batch sizes
fn bench_sample_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_batch");
    let scan = test_scan(128, 200_000);
    let sampler = PairSampler::new([32, 32, 32], 1024, ct_augment());

    for &batch_size in &[1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &batch_size| {
                let mut rng = ChaCha8Rng::seed_from_u64(2);
                b.iter(|| black_box(sample_batch(&scan, &sampler, batch_size, &mut rng).unwrap()))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sample_pair, bench_sample_batch);
criterion_main!(benches);
