//! Build-and-query benchmarking of any [`NearestNeighborIndex`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::brute_force::BruteForceIndex;
use crate::distance::Distance;
use crate::error::Result;
use crate::index::{NearestNeighborIndex, Neighbor};

/// Performance and accuracy of one index on one (dataset, query set) pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BenchmarkResult {
    algorithm_name: String,
    metric_name: String,
    data_distribution: String,
    dataset_size: usize,
    dimensions: usize,
    preprocess_time: Duration,
    memory_usage: usize,
    avg_query_time: Duration,
    min_query_time: Duration,
    max_query_time: Duration,
    recall: f64,
}

impl BenchmarkResult {
    pub fn algorithm_name(&self) -> &str {
        &self.algorithm_name
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn data_distribution(&self) -> &str {
        &self.data_distribution
    }

    pub fn dataset_size(&self) -> usize {
        self.dataset_size
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn preprocess_time(&self) -> Duration {
        self.preprocess_time
    }

    /// Estimated index footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn avg_query_time(&self) -> Duration {
        self.avg_query_time
    }

    pub fn min_query_time(&self) -> Duration {
        self.min_query_time
    }

    pub fn max_query_time(&self) -> Duration {
        self.max_query_time
    }

    /// Fraction of queries whose answer matched the ground-truth index.
    pub fn recall(&self) -> f64 {
        self.recall
    }
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Algorithm:          {}", self.algorithm_name)?;
        writeln!(f, "Metric:             {}", self.metric_name)?;
        writeln!(f, "Distribution:       {}", self.data_distribution)?;
        writeln!(
            f,
            "Dataset:            {} points x {} dims",
            self.dataset_size, self.dimensions
        )?;
        writeln!(f, "Preprocess time:    {} us", self.preprocess_time.as_micros())?;
        writeln!(f, "Memory estimate:    {} bytes", self.memory_usage)?;
        writeln!(
            f,
            "Query time (us):    avg {} / min {} / max {}",
            self.avg_query_time.as_micros(),
            self.min_query_time.as_micros(),
            self.max_query_time.as_micros()
        )?;
        write!(f, "Recall:             {:.4}", self.recall)
    }
}

/// Exact nearest neighbor of every query, computed by brute force.
pub fn ground_truth(
    dataset: &[Vec<f64>],
    queries: &[Vec<f64>],
    metric: Arc<dyn Distance>,
) -> Result<Vec<Neighbor>> {
    let mut oracle = BruteForceIndex::new(metric);
    oracle.build(dataset)?;
    oracle.ground_truth(queries)
}

/// Build `index` over `dataset` once, then time one `find_nearest` per query.
///
/// Recall compares returned indices with `truth` by identity only. When
/// `truth` does not line up with `queries` recall is reported as 0.
pub fn run_benchmark(
    index: &mut dyn NearestNeighborIndex,
    dataset: &[Vec<f64>],
    queries: &[Vec<f64>],
    truth: &[Neighbor],
    distribution: &str,
) -> Result<BenchmarkResult> {
    let build = index.build(dataset)?;

    let mut query_times = Vec::with_capacity(queries.len());
    let mut found = Vec::with_capacity(queries.len());
    for query in queries {
        let start = Instant::now();
        let nearest = index.find_nearest(query)?;
        query_times.push(start.elapsed());
        found.push(nearest);
    }

    let (avg_query_time, min_query_time, max_query_time) = match (
        query_times.iter().min(),
        query_times.iter().max(),
    ) {
        (Some(&min), Some(&max)) => {
            let total: Duration = query_times.iter().sum();
            (total / query_times.len() as u32, min, max)
        }
        _ => (Duration::ZERO, Duration::ZERO, Duration::ZERO),
    };

    let recall = if truth.len() == found.len() && !truth.is_empty() {
        let correct = truth
            .iter()
            .zip(&found)
            .filter(|(t, f)| t.index == f.index)
            .count();
        correct as f64 / truth.len() as f64
    } else {
        if truth.len() != found.len() {
            warn!(
                truth = truth.len(),
                queries = found.len(),
                "ground truth does not match the query set; reporting recall 0"
            );
        }
        0.0
    };

    let result = BenchmarkResult {
        algorithm_name: index.name().to_string(),
        metric_name: index.metric().name().to_string(),
        data_distribution: distribution.to_string(),
        dataset_size: dataset.len(),
        dimensions: dataset.first().map_or(0, |p| p.len()),
        preprocess_time: build.preprocess_time,
        memory_usage: build.memory_usage,
        avg_query_time,
        min_query_time,
        max_query_time,
        recall,
    };

    debug!(
        algorithm = result.algorithm_name(),
        points = result.dataset_size(),
        queries = queries.len(),
        recall,
        "benchmark finished"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::error::NnError;
    use crate::lsh::LshIndex;

    fn unit_cube() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0],
        ]
    }

    fn metric() -> Arc<dyn Distance> {
        Arc::new(DistanceMetric::Euclidean)
    }

    #[test]
    fn test_brute_force_self_recall() {
        let data = unit_cube();
        let queries = vec![vec![0.5, 0.5, 0.5], vec![0.9, 0.1, 0.0], vec![0.0, 0.0, 0.2]];
        let truth = ground_truth(&data, &queries, metric()).unwrap();
        assert_eq!(truth[0].index, 4);

        let mut index = BruteForceIndex::new(metric());
        let result = run_benchmark(&mut index, &data, &queries, &truth, "Uniform").unwrap();
        assert_eq!(result.recall(), 1.0);
        assert_eq!(result.algorithm_name(), "BruteForce");
        assert_eq!(result.metric_name(), "Euclidean");
        assert_eq!(result.data_distribution(), "Uniform");
        assert_eq!(result.dataset_size(), 5);
        assert_eq!(result.dimensions(), 3);
        assert!(result.min_query_time() <= result.avg_query_time());
        assert!(result.avg_query_time() <= result.max_query_time());
    }

    #[test]
    fn test_recall_counts_index_identity() {
        let data = unit_cube();
        let queries = vec![vec![0.5, 0.5, 0.5], vec![0.0, 0.0, 0.0]];
        // Second entry deliberately wrong.
        let truth = vec![
            Neighbor {
                index: 4,
                distance: 0.75_f64.sqrt(),
            },
            Neighbor {
                index: 3,
                distance: 0.0,
            },
        ];
        let mut index = BruteForceIndex::new(metric());
        let result = run_benchmark(&mut index, &data, &queries, &truth, "Fixed").unwrap();
        assert!((result.recall() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_truth_length_mismatch_reports_zero() {
        let data = unit_cube();
        let queries = vec![vec![0.5, 0.5, 0.5]];
        let mut index = BruteForceIndex::new(metric());
        let result = run_benchmark(&mut index, &data, &queries, &[], "Fixed").unwrap();
        assert_eq!(result.recall(), 0.0);
    }

    #[test]
    fn test_empty_query_set() {
        let mut index = BruteForceIndex::new(metric());
        let result = run_benchmark(&mut index, &unit_cube(), &[], &[], "Fixed").unwrap();
        assert_eq!(result.avg_query_time(), Duration::ZERO);
        assert_eq!(result.recall(), 0.0);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let mut index = BruteForceIndex::new(metric());
        let err = run_benchmark(&mut index, &[], &[vec![1.0]], &[], "Fixed").unwrap_err();
        assert!(matches!(err, NnError::EmptyIndex));
    }

    #[test]
    fn test_lsh_through_harness() {
        let data = unit_cube();
        let queries = vec![vec![0.5, 0.5, 0.5]];
        let truth = ground_truth(&data, &queries, metric()).unwrap();
        let mut index = LshIndex::builder().w(1_000.0).seed(4).build().unwrap();
        let result = run_benchmark(&mut index, &data, &queries, &truth, "Fixed").unwrap();
        assert_eq!(result.algorithm_name(), "LSH");
        assert_eq!(result.recall(), 1.0);
        assert!(result.memory_usage() > 0);
    }

    #[test]
    fn test_display() {
        let mut index = BruteForceIndex::new(metric());
        let result = run_benchmark(&mut index, &unit_cube(), &[], &[], "Uniform").unwrap();
        let text = result.to_string();
        assert!(text.contains("BruteForce"));
        assert!(text.contains("Recall:"));
    }
}
