use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nnprobe::{
    AutoTuner, BruteForceIndex, Distance, DistanceMetric, LatencySource, LshIndex,
    NearestNeighborIndex, TunerConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_points(count: usize, dim: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let unit = Uniform::new(-1.0, 1.0);
    (0..count)
        .map(|_| (0..dim).map(|_| unit.sample(&mut rng)).collect())
        .collect()
}

fn euclidean() -> Arc<dyn Distance> {
    Arc::new(DistanceMetric::Euclidean)
}

fn lsh_index() -> LshIndex {
    LshIndex::builder()
        .num_tables(5)
        .hash_size(4)
        .w(1.0)
        .seed(42)
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Build cost
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for &dim in &[8, 64] {
        for &n in &[1_000usize, 10_000] {
            let data = generate_points(n, dim, 99);

            group.bench_with_input(BenchmarkId::new(format!("lsh/dim={dim}"), n), &n, |b, _| {
                b.iter(|| {
                    let mut index = lsh_index();
                    index.build(black_box(&data)).unwrap();
                });
            });

            group.bench_with_input(
                BenchmarkId::new(format!("brute_force/dim={dim}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        let mut index = BruteForceIndex::new(euclidean());
                        index.build(black_box(&data)).unwrap();
                    });
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Query latency: LSH vs brute force
// ---------------------------------------------------------------------------

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let dim = 16;
    let queries = generate_points(100, dim, 7);

    for &n in &[1_000usize, 10_000, 50_000] {
        let data = generate_points(n, dim, 42);

        let mut lsh = lsh_index();
        lsh.build(&data).unwrap();
        let mut exact = BruteForceIndex::new(euclidean());
        exact.build(&data).unwrap();

        group.bench_with_input(BenchmarkId::new("lsh", n), &n, |b, _| {
            let mut qi = 0;
            b.iter(|| {
                let q = &queries[qi % queries.len()];
                qi += 1;
                lsh.find_nearest(black_box(q)).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("brute_force", n), &n, |b, _| {
            let mut qi = 0;
            b.iter(|| {
                let q = &queries[qi % queries.len()];
                qi += 1;
                exact.find_nearest(black_box(q)).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("lsh_k10", n), &n, |b, _| {
            let mut qi = 0;
            b.iter(|| {
                let q = &queries[qi % queries.len()];
                qi += 1;
                lsh.find_k_nearest(black_box(q), 10).unwrap()
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Auto-tuning
// ---------------------------------------------------------------------------

fn bench_tune(c: &mut Criterion) {
    let mut group = c.benchmark_group("tune");
    group.sample_size(10);

    let points = generate_points(500, 8, 3);
    let queries = generate_points(50, 8, 4);
    let tuner = AutoTuner::with_config(
        euclidean(),
        TunerConfig::default().with_latency_source(LatencySource::CandidateCount),
    );

    group.bench_function("default_grid/500x8", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            tuner.tune(&points, &queries, &mut rng).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_query, bench_tune);
criterion_main!(benches);
