//! Basic usage of `nnprobe`.
//!
//! Builds an exact and an approximate index over the same random points,
//! compares their answers, inspects LSH stats and metrics, and auto-tunes.
//!
//! Run with:
//!   cargo run --example basic_usage

use nnprobe::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

const DIM: usize = 16;
const NUM_POINTS: usize = 10_000;

fn main() -> Result<()> {
    let metric: Arc<dyn Distance> = Arc::new(DistanceMetric::Euclidean);
    let mut rng = StdRng::seed_from_u64(123);

    // ---------------------------------------------------------------
    // 1. Generate uniform points in [-1, 1)^DIM.
    // ---------------------------------------------------------------
    println!("=== Step 1: Generate {NUM_POINTS} random points (dim={DIM}) ===");
    let generator = UniformGenerator::new(-1.0, 1.0)?;
    let points = generator.generate(NUM_POINTS, DIM, &mut rng);
    let queries = generator.generate(5, DIM, &mut rng);
    println!("Generated {} points and {} queries.\n", points.len(), queries.len());

    // ---------------------------------------------------------------
    // 2. Build both indices.
    // ---------------------------------------------------------------
    println!("=== Step 2: Build the indices ===");
    let mut exact = BruteForceIndex::new(Arc::clone(&metric));
    let exact_perf = exact.build(&points)?;

    let mut lsh = LshIndex::builder()
        .num_tables(8)
        .hash_size(4)
        .w(1.0)
        .probe_radius(5)
        .metric(Arc::clone(&metric))
        .seed(42)
        .enable_metrics()
        .build()?;
    let lsh_perf = lsh.build(&points)?;

    println!(
        "BruteForce: {:?}, ~{} bytes",
        exact_perf.preprocess_time, exact_perf.memory_usage
    );
    println!(
        "LSH:        {:?}, ~{} bytes\n",
        lsh_perf.preprocess_time, lsh_perf.memory_usage
    );

    // ---------------------------------------------------------------
    // 3. Compare top-5 answers for the first query.
    // ---------------------------------------------------------------
    println!("=== Step 3: Top-5 neighbors of query #0 ===");
    let truth = exact.find_k_nearest(&queries[0], 5)?;
    let approx = lsh.find_k_nearest(&queries[0], 5)?;
    for (rank, (t, a)) in truth.iter().zip(&approx).enumerate() {
        println!(
            "  rank={} exact=({:<5} {:.4})  lsh=({:<5} {:.4})",
            rank + 1,
            t.index,
            t.distance,
            a.index,
            a.distance
        );
    }
    println!();

    // ---------------------------------------------------------------
    // 4. Query outcome details.
    // ---------------------------------------------------------------
    println!("=== Step 4: Candidates examined per query ===");
    for (i, q) in queries.iter().enumerate() {
        let outcome = lsh.search(q, 1)?;
        println!(
            "  query #{i}: candidates={:<6} fell_back={}",
            outcome.candidates, outcome.fell_back
        );
    }
    println!();

    // ---------------------------------------------------------------
    // 5. Stats and metrics.
    // ---------------------------------------------------------------
    println!("=== Step 5: Index stats ===");
    println!("{}\n", lsh.stats());

    println!("=== Step 6: Runtime metrics ===");
    if let Some(m) = lsh.metrics() {
        println!("{m}\n");
    }

    // ---------------------------------------------------------------
    // 7. Auto-tune on a sample, then benchmark on everything.
    // ---------------------------------------------------------------
    println!("=== Step 7: Auto-tune on a 1,000-point sample ===");
    let tuner = AutoTuner::new(Arc::clone(&metric));
    let (mut tuned, report) = tuner.tune(&points[..1_000], &queries, &mut rng)?;
    println!(
        "Best: tables={} hash_size={} w={:.4} (x{} mean distance {:.4}), recall={:.2}, score={:.2}",
        report.best.params.num_tables,
        report.best.params.hash_size,
        report.best.params.w,
        report.best.params.w_multiplier,
        report.mean_distance,
        report.best.recall,
        report.best.score
    );

    let bench_queries = generator.generate(100, DIM, &mut rng);
    let truth = ground_truth(&points, &bench_queries, Arc::clone(&metric))?;
    let result = run_benchmark(&mut tuned, &points, &bench_queries, &truth, generator.name())?;
    println!("\n{result}");

    Ok(())
}
