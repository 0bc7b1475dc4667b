//! Benchmark comparison: brute force vs. a fixed LSH vs. an auto-tuned LSH.
//!
//! Every index goes through the same harness (one build, one timed
//! `find_nearest` per query, recall against brute-force ground truth) and the
//! results are printed and written as CSV.
//!
//! Run with:
//!   cargo run --example benchmark_comparison --release -- --size 50000 --dim 32

use clap::{Parser, ValueEnum};
use nnprobe::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dist {
    Uniform,
    Normal,
}

#[derive(Parser, Debug)]
#[command(version, about = "Compare exact and LSH nearest-neighbor search", long_about = None)]
struct Args {
    /// Number of dataset points.
    #[arg(short = 'n', long, default_value_t = 10_000)]
    size: usize,

    /// Number of query points.
    #[arg(short, long, default_value_t = 100)]
    queries: usize,

    /// Point dimension.
    #[arg(short, long, default_value_t = 16)]
    dim: usize,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = Dist::Uniform)]
    distribution: Dist,

    /// Points used for auto-tuning (taken from the front of the dataset).
    #[arg(long, default_value_t = 1_000)]
    tune_sample: usize,

    #[arg(short, long, default_value = "benchmark_results.csv")]
    output: PathBuf,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let generator: Box<dyn DataGenerator> = match args.distribution {
        Dist::Uniform => Box::new(UniformGenerator::new(-1.0, 1.0)?),
        Dist::Normal => Box::new(NormalGenerator::new(0.0, 1.0)?),
    };
    let metric: Arc<dyn Distance> = Arc::new(DistanceMetric::Euclidean);
    let mut rng = StdRng::seed_from_u64(args.seed);

    info!(
        size = args.size,
        queries = args.queries,
        dim = args.dim,
        distribution = generator.name(),
        "generating data"
    );
    let dataset = generator.generate(args.size, args.dim, &mut rng);
    let queries = generator.generate(args.queries, args.dim, &mut rng);
    let truth = ground_truth(&dataset, &queries, Arc::clone(&metric))?;

    // ---------------------------------------------------------------
    // Contenders
    // ---------------------------------------------------------------
    let fixed = LshIndex::builder()
        .num_tables(5)
        .hash_size(4)
        .w(1.0)
        .metric(Arc::clone(&metric))
        .seed(args.seed)
        .build()?;

    let sample_len = args.tune_sample.clamp(1, dataset.len().max(1));
    let tuner = AutoTuner::new(Arc::clone(&metric));
    let (tuned, report) = tuner.tune(&dataset[..sample_len], &queries, &mut rng)?;
    info!(
        num_tables = report.best.params.num_tables,
        hash_size = report.best.params.hash_size,
        w = report.best.params.w,
        sample_recall = report.best.recall,
        "auto-tuned parameters"
    );

    let mut contenders: Vec<Box<dyn NearestNeighborIndex>> = vec![
        Box::new(BruteForceIndex::new(Arc::clone(&metric))),
        Box::new(fixed),
        Box::new(tuned),
    ];

    // ---------------------------------------------------------------
    // Run
    // ---------------------------------------------------------------
    let mut results = Vec::with_capacity(contenders.len());
    for index in contenders.iter_mut() {
        let result = run_benchmark(
            index.as_mut(),
            &dataset,
            &queries,
            &truth,
            generator.name(),
        )?;
        println!("{result}\n");
        results.push(result);
    }

    // ---------------------------------------------------------------
    // Summary
    // ---------------------------------------------------------------
    println!("========================================");
    println!(
        "  {:<12} {:>14} {:>14} {:>8}",
        "Algorithm", "Build (us)", "Avg query (us)", "Recall"
    );
    println!("  {:-<12} {:-<14} {:-<14} {:-<8}", "", "", "", "");
    for r in &results {
        println!(
            "  {:<12} {:>14} {:>14} {:>8.3}",
            r.algorithm_name(),
            r.preprocess_time().as_micros(),
            r.avg_query_time().as_micros(),
            r.recall()
        );
    }
    println!("========================================");

    report::save_csv(&args.output, &results)?;
    info!(path = %args.output.display(), rows = results.len(), "wrote results");

    Ok(())
}
