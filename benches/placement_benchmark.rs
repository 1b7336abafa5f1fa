use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use swne::matrix::{CoordTable, NamedMatrix};
use swne::placement::place_entities;

struct PlacementConfig {
    seed: u64,
    factor_counts: Vec<usize>,
    sample_counts: Vec<usize>,
    measurement_time: u64,
    sample_size: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            factor_counts: vec![10, 20, 40],
            sample_counts: vec![1_000, 10_000, 50_000],
            measurement_time: 10,
            sample_size: 10,
        }
    }
}

fn random_weights(k: usize, m: usize, seed: u64) -> NamedMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = Array2::from_shape_fn((k, m), |_| rng.random_range(0.0..5.0));
    NamedMatrix::new(
        values,
        (0..k).map(|i| format!("factor_{}", i)).collect(),
        (0..m).map(|i| format!("cell_{}", i)).collect(),
    )
    .unwrap()
}

fn random_anchors(k: usize, seed: u64) -> CoordTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let xy = Array2::from_shape_fn((k, 2), |_| rng.random_range(0.0..1.0));
    CoordTable::new(
        (0..k).map(|i| format!("factor_{}", i)).collect(),
        xy,
        None,
    )
    .unwrap()
}

fn bench_placement(c: &mut Criterion) {
    let config = PlacementConfig::default();
    let mut group = c.benchmark_group("barycentric_placement");
    group.measurement_time(Duration::from_secs(config.measurement_time));
    group.sample_size(config.sample_size);

    for &k in &config.factor_counts {
        for &m in &config.sample_counts {
            let weights = random_weights(k, m, config.seed);
            let anchors = random_anchors(k, config.seed);
            group.bench_with_input(
                BenchmarkId::new(format!("{}_factors", k), m),
                &m,
                |b, _| {
                    b.iter(|| place_entities(&weights, &anchors, 1.0, Some(k.min(10))).unwrap())
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_placement);
criterion_main!(benches);
