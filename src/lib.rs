//! # nnprobe
//!
//! Exact and approximate nearest-neighbor search over fixed-dimension `f64`
//! point sets, with a grid-search auto-tuner for the approximate index and a
//! harness that measures build cost, memory, query latency and recall.
//!
//! - [`BruteForceIndex`]: exact linear scan, the ground-truth oracle.
//! - [`LshIndex`]: multi-table, multi-probe random-projection LSH.
//! - [`AutoTuner`]: grid search over LSH parameters against brute force.
//! - [`benchmark::run_benchmark`]: one build plus timed queries per report.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use nnprobe::{BruteForceIndex, DistanceMetric, LshIndex, NearestNeighborIndex};
//!
//! let data = vec![
//!     vec![0.0, 0.0, 0.0],
//!     vec![1.0, 0.0, 0.0],
//!     vec![0.0, 1.0, 0.0],
//!     vec![0.0, 0.0, 1.0],
//!     vec![1.0, 1.0, 1.0],
//! ];
//!
//! let mut exact = BruteForceIndex::new(Arc::new(DistanceMetric::Euclidean));
//! exact.build(&data).unwrap();
//! assert_eq!(exact.find_nearest(&[0.5, 0.5, 0.5]).unwrap().index, 4);
//!
//! let mut lsh = LshIndex::builder()
//!     .num_tables(4)
//!     .hash_size(2)
//!     .w(2.0)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//! lsh.build(&data).unwrap();
//! for r in lsh.find_k_nearest(&[0.5, 0.5, 0.5], 3).unwrap() {
//!     println!("index={} dist={:.4}", r.index, r.distance);
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Effect                                              |
//! |------------|-----------------------------------------------------|
//! | `parallel` | Parallel LSH hashing and tuner grid via rayon (default) |
//! | `serde`    | Serialize configs and results (serde + serde_json)  |
//! | `full`     | Enables `parallel` + `serde`                        |

pub mod benchmark;
pub mod brute_force;
pub mod datasets;
pub mod distance;
pub mod error;
pub mod hash;
pub mod index;
pub mod lsh;
pub mod metrics;
pub mod report;
pub mod tuning;

// Re-exports for convenience.
pub use benchmark::{ground_truth, run_benchmark, BenchmarkResult};
pub use brute_force::BruteForceIndex;
pub use datasets::{DataGenerator, NormalGenerator, UniformGenerator};
pub use distance::{Distance, DistanceMetric};
pub use error::{NnError, Result};
pub use index::{AlgorithmPerformance, NearestNeighborIndex, Neighbor};
pub use lsh::{EmptyProbePolicy, LshConfig, LshIndex, LshIndexBuilder, LshStats, SearchOutcome};
pub use metrics::{MetricsCollector, MetricsSnapshot, QueryRecord};
pub use tuning::{
    mean_pairwise_distance, AutoTuner, LatencySource, TrialResult, TunedParams, TunerConfig,
    TuningGrid, TuningReport,
};
