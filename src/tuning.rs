//! Grid-search auto-tuning of LSH hyperparameters.
//!
//! Every grid point builds a fresh [`LshIndex`] over a point sample and is
//! scored against brute-force ground truth on a query sample:
//!
//! ```text
//! score = 100 * recall - latency_weight * avg_latency_ms
//! ```
//!
//! Ground truth is computed once and shared by all grid points. Each grid
//! point gets its own generator seeded from a value drawn up front from the
//! caller's generator, so results do not depend on evaluation order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::brute_force::BruteForceIndex;
use crate::distance::Distance;
use crate::error::{NnError, Result};
use crate::index::{AlgorithmPerformance, NearestNeighborIndex, Neighbor};
use crate::lsh::{EmptyProbePolicy, LshConfig, LshIndex};

/// How query latency enters the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LatencySource {
    /// Measured wall-clock time per query.
    #[default]
    WallClock,
    /// Distance evaluations per query, charged at one microsecond each.
    /// Fully reproducible for a fixed seed.
    CandidateCount,
}

/// The discrete parameter space searched by the tuner.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TuningGrid {
    /// Bucket widths as multiples of the sample's mean pairwise distance.
    pub w_multipliers: Vec<f64>,
    pub num_tables: Vec<usize>,
    pub hash_sizes: Vec<usize>,
}

impl Default for TuningGrid {
    fn default() -> Self {
        Self {
            w_multipliers: vec![0.25, 0.5, 1.0, 2.0, 4.0],
            num_tables: vec![1, 3, 5, 7],
            hash_sizes: vec![2, 4, 6, 8],
        }
    }
}

impl TuningGrid {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.w_multipliers.len() * self.num_tables.len() * self.hash_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points in evaluation order: w-major, then tables, then hash size.
    pub fn points(&self, mean_distance: f64) -> Vec<TunedParams> {
        let mut out = Vec::with_capacity(self.len());
        for &w_multiplier in &self.w_multipliers {
            for &num_tables in &self.num_tables {
                for &hash_size in &self.hash_sizes {
                    out.push(TunedParams {
                        num_tables,
                        hash_size,
                        w: mean_distance * w_multiplier,
                        w_multiplier,
                    });
                }
            }
        }
        out
    }
}

/// Tuner settings.
#[derive(Debug, Clone)]
pub struct TunerConfig {
    pub grid: TuningGrid,
    /// Probe radius used by every candidate index.
    pub probe_radius: usize,
    pub empty_probe: EmptyProbePolicy,
    /// Weight of the latency penalty (per millisecond).
    pub latency_weight: f64,
    pub latency_source: LatencySource,
    /// Stop starting new grid points once this much time has passed.
    pub time_budget: Option<Duration>,
    /// Worker threads for grid evaluation (`parallel` feature). `None` uses
    /// the global rayon pool.
    pub workers: Option<usize>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        let lsh = LshConfig::default();
        Self {
            grid: TuningGrid::default(),
            probe_radius: lsh.probe_radius,
            empty_probe: lsh.empty_probe,
            latency_weight: 0.1,
            latency_source: LatencySource::WallClock,
            time_budget: None,
            workers: None,
        }
    }
}

impl TunerConfig {
    pub fn with_grid(mut self, grid: TuningGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_probe_radius(mut self, radius: usize) -> Self {
        self.probe_radius = radius;
        self
    }

    pub fn with_empty_probe(mut self, policy: EmptyProbePolicy) -> Self {
        self.empty_probe = policy;
        self
    }

    pub fn with_latency_weight(mut self, weight: f64) -> Self {
        self.latency_weight = weight;
        self
    }

    pub fn with_latency_source(mut self, source: LatencySource) -> Self {
        self.latency_source = source;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.grid.is_empty() {
            return Err(NnError::InvalidConfiguration(
                "tuning grid has an empty axis".into(),
            ));
        }
        if !self.latency_weight.is_finite() {
            return Err(NnError::InvalidConfiguration(format!(
                "latency_weight must be finite, got {}",
                self.latency_weight
            )));
        }
        if self.workers == Some(0) {
            return Err(NnError::InvalidConfiguration(
                "workers must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn lsh_config(&self, params: &TunedParams) -> LshConfig {
        LshConfig {
            num_tables: params.num_tables,
            hash_size: params.hash_size,
            w: params.w,
            probe_radius: self.probe_radius,
            empty_probe: self.empty_probe,
        }
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TunedParams {
    pub num_tables: usize,
    pub hash_size: usize,
    /// Absolute bucket width.
    pub w: f64,
    /// `w` divided by the sample's mean pairwise distance.
    pub w_multiplier: f64,
}

/// Measurements for one evaluated grid point.
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub params: TunedParams,
    pub recall: f64,
    pub avg_latency_ms: f64,
    pub avg_candidates: f64,
    pub build_time: Duration,
    pub memory_usage: usize,
    pub score: f64,
}

/// Outcome of a tuning run.
#[derive(Debug, Clone)]
pub struct TuningReport {
    /// Highest-scoring trial; ties go to the earliest grid point.
    pub best: TrialResult,
    /// Every evaluated trial, in grid order.
    pub trials: Vec<TrialResult>,
    /// Number of grid points, evaluated or not.
    pub grid_size: usize,
    /// Mean pairwise distance of the point sample.
    pub mean_distance: f64,
    /// True when the time budget stopped the search early.
    pub exhausted_budget: bool,
}

/// Mean distance over all unordered pairs of `points`.
///
/// Returns `1.0` for fewer than two points or when every pair coincides, so
/// the result is always usable as a bucket-width scale.
pub fn mean_pairwise_distance(points: &[Vec<f64>], metric: &dyn Distance) -> Result<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            total += metric.distance(
                ArrayView1::from(a.as_slice()),
                ArrayView1::from(b.as_slice()),
            )?;
            count += 1;
        }
    }
    let mean = if count > 0 { total / count as f64 } else { 1.0 };
    Ok(if mean > 0.0 && mean.is_finite() { mean } else { 1.0 })
}

/// Grid-search tuner for [`LshIndex`].
pub struct AutoTuner {
    metric: Arc<dyn Distance>,
    config: TunerConfig,
}

impl std::fmt::Debug for AutoTuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTuner")
            .field("metric", &self.metric.name())
            .field("config", &self.config)
            .finish()
    }
}

impl AutoTuner {
    pub fn new(metric: Arc<dyn Distance>) -> Self {
        Self::with_config(metric, TunerConfig::default())
    }

    pub fn with_config(metric: Arc<dyn Distance>, config: TunerConfig) -> Self {
        Self { metric, config }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Search the grid and return the winning index, built over `points`,
    /// together with the full report.
    ///
    /// Any failing grid point fails the whole run.
    pub fn tune(
        &self,
        points: &[Vec<f64>],
        queries: &[Vec<f64>],
        rng: &mut impl Rng,
    ) -> Result<(LshIndex, TuningReport)> {
        self.config.validate()?;
        if points.is_empty() {
            return Err(NnError::EmptyIndex);
        }
        if queries.is_empty() {
            return Err(NnError::InvalidConfiguration(
                "query sample is empty".into(),
            ));
        }

        let started = Instant::now();
        let mean_distance = mean_pairwise_distance(points, self.metric.as_ref())?;

        let mut oracle = BruteForceIndex::new(Arc::clone(&self.metric));
        oracle.build(points)?;
        let truth = oracle.ground_truth(queries)?;

        let grid = self.config.grid.points(mean_distance);
        let seeds: Vec<u64> = grid.iter().map(|_| rng.gen()).collect();
        let jobs: Vec<(TunedParams, u64)> = grid.iter().copied().zip(seeds).collect();

        info!(
            grid_size = jobs.len(),
            points = points.len(),
            queries = queries.len(),
            mean_distance,
            "starting LSH auto-tuning"
        );

        let (trials, exhausted_budget) = self.run_waves(&jobs, points, queries, &truth, started)?;

        let mut best_pos = 0;
        for (pos, trial) in trials.iter().enumerate() {
            if trial.score > trials[best_pos].score {
                best_pos = pos;
            }
        }
        let best = trials[best_pos].clone();
        let (_, best_seed) = jobs[best_pos];

        let (index, _) = self.build_candidate(&best.params, best_seed, points)?;

        info!(
            num_tables = best.params.num_tables,
            hash_size = best.params.hash_size,
            w = best.params.w,
            recall = best.recall,
            score = best.score,
            evaluated = trials.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "auto-tuning finished"
        );

        Ok((
            index,
            TuningReport {
                best,
                trials,
                grid_size: jobs.len(),
                mean_distance,
                exhausted_budget,
            },
        ))
    }

    /// Evaluate `jobs` in waves, checking the time budget between waves.
    fn run_waves(
        &self,
        jobs: &[(TunedParams, u64)],
        points: &[Vec<f64>],
        queries: &[Vec<f64>],
        truth: &[Neighbor],
        started: Instant,
    ) -> Result<(Vec<TrialResult>, bool)> {
        let executor = Executor::new(self.config.workers)?;
        let mut trials = Vec::with_capacity(jobs.len());

        for wave in jobs.chunks(executor.wave_size()) {
            if let Some(budget) = self.config.time_budget {
                if !trials.is_empty() && started.elapsed() >= budget {
                    warn!(
                        evaluated = trials.len(),
                        skipped = jobs.len() - trials.len(),
                        "tuning time budget exhausted; keeping best so far"
                    );
                    return Ok((trials, true));
                }
            }
            let results = executor.run(wave, |(params, seed)| {
                self.evaluate(params, *seed, points, queries, truth)
            })?;
            trials.extend(results);
        }
        Ok((trials, false))
    }

    fn build_candidate(
        &self,
        params: &TunedParams,
        seed: u64,
        points: &[Vec<f64>],
    ) -> Result<(LshIndex, AlgorithmPerformance)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index =
            LshIndex::new(self.config.lsh_config(params), Arc::clone(&self.metric), &mut rng)?;
        let perf = index.build_with_rng(points, &mut rng)?;
        Ok((index, perf))
    }

    fn evaluate(
        &self,
        params: &TunedParams,
        seed: u64,
        points: &[Vec<f64>],
        queries: &[Vec<f64>],
        truth: &[Neighbor],
    ) -> Result<TrialResult> {
        let (index, perf) = self.build_candidate(params, seed, points)?;

        let mut hits = 0usize;
        let mut total_latency = Duration::ZERO;
        let mut total_candidates = 0usize;
        for (query, expected) in queries.iter().zip(truth) {
            let start = Instant::now();
            let outcome = index.search(query, 1)?;
            total_latency += start.elapsed();

            total_candidates += outcome.candidates;
            if outcome.neighbors.first().map(|n| n.index) == Some(expected.index) {
                hits += 1;
            }
        }

        let n = queries.len() as f64;
        let recall = hits as f64 / n;
        let avg_candidates = total_candidates as f64 / n;
        let avg_latency_ms = match self.config.latency_source {
            LatencySource::WallClock => total_latency.as_secs_f64() * 1000.0 / n,
            LatencySource::CandidateCount => avg_candidates / 1000.0,
        };
        let score = 100.0 * recall - self.config.latency_weight * avg_latency_ms;

        debug!(
            num_tables = params.num_tables,
            hash_size = params.hash_size,
            w = params.w,
            recall,
            avg_latency_ms,
            avg_candidates,
            score,
            "evaluated grid point"
        );

        Ok(TrialResult {
            params: *params,
            recall,
            avg_latency_ms,
            avg_candidates,
            build_time: perf.preprocess_time,
            memory_usage: perf.memory_usage,
            score,
        })
    }
}

// ---------------------------------------------------------------------------
// Wave execution
// ---------------------------------------------------------------------------

/// Runs one wave of grid points, in parallel when the `parallel` feature is on.
/// Results always come back in input order.
#[cfg(feature = "parallel")]
struct Executor {
    pool: Option<rayon::ThreadPool>,
}

#[cfg(feature = "parallel")]
impl Executor {
    fn new(workers: Option<usize>) -> Result<Self> {
        let pool = match workers {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| NnError::InvalidConfiguration(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self { pool })
    }

    fn wave_size(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
        .max(1)
    }

    fn run<T, R, F>(&self, wave: &[T], f: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync,
    {
        use rayon::prelude::*;

        let work = || wave.par_iter().map(&f).collect::<Result<Vec<R>>>();
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

#[cfg(not(feature = "parallel"))]
struct Executor;

#[cfg(not(feature = "parallel"))]
impl Executor {
    fn new(_workers: Option<usize>) -> Result<Self> {
        Ok(Self)
    }

    fn wave_size(&self) -> usize {
        1
    }

    fn run<T, R, F>(&self, wave: &[T], f: F) -> Result<Vec<R>>
    where
        F: Fn(&T) -> Result<R>,
    {
        wave.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use rand_distr::{Distribution, Uniform};

    fn sample(rng: &mut StdRng, n: usize, dim: usize) -> Vec<Vec<f64>> {
        let unit = Uniform::new(-1.0, 1.0);
        (0..n)
            .map(|_| (0..dim).map(|_| unit.sample(rng)).collect())
            .collect()
    }

    fn metric() -> Arc<dyn Distance> {
        Arc::new(DistanceMetric::Euclidean)
    }

    #[test]
    fn test_mean_pairwise_distance() {
        let points = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![0.0, 0.0]];
        // pairs: 5, 0, 5
        let mean = mean_pairwise_distance(&points, &DistanceMetric::Euclidean).unwrap();
        assert!((mean - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_pairwise_distance_degenerate() {
        let metric = DistanceMetric::Euclidean;
        assert_eq!(mean_pairwise_distance(&[], &metric).unwrap(), 1.0);
        assert_eq!(mean_pairwise_distance(&[vec![1.0]], &metric).unwrap(), 1.0);
        assert_eq!(
            mean_pairwise_distance(&[vec![1.0], vec![1.0]], &metric).unwrap(),
            1.0
        );
    }

    #[test]
    fn test_grid_order() {
        let grid = TuningGrid {
            w_multipliers: vec![1.0, 2.0],
            num_tables: vec![1, 3],
            hash_sizes: vec![2, 4],
        };
        let points = grid.points(0.5);
        assert_eq!(points.len(), 8);
        assert_eq!((points[0].num_tables, points[0].hash_size), (1, 2));
        assert_eq!((points[1].num_tables, points[1].hash_size), (1, 4));
        assert_eq!((points[2].num_tables, points[2].hash_size), (3, 2));
        assert!((points[4].w - 1.0).abs() < 1e-12);
        assert_eq!(TuningGrid::default().len(), 80);
    }

    #[test]
    fn test_rejects_empty_inputs() {
        let tuner = AutoTuner::new(metric());
        let mut rng = StdRng::seed_from_u64(1);
        let err = tuner.tune(&[], &[vec![0.0]], &mut rng).unwrap_err();
        assert!(matches!(err, NnError::EmptyIndex));
        let err = tuner.tune(&[vec![0.0]], &[], &mut rng).unwrap_err();
        assert!(matches!(err, NnError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_rejects_empty_grid_axis() {
        let config = TunerConfig::default().with_grid(TuningGrid {
            num_tables: vec![],
            ..TuningGrid::default()
        });
        let tuner = AutoTuner::with_config(metric(), config);
        let mut rng = StdRng::seed_from_u64(1);
        let err = tuner
            .tune(&[vec![0.0], vec![1.0]], &[vec![0.5]], &mut rng)
            .unwrap_err();
        assert!(matches!(err, NnError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_malformed_grid_point_fails_run() {
        let config = TunerConfig::default().with_grid(TuningGrid {
            w_multipliers: vec![1.0],
            num_tables: vec![2],
            hash_sizes: vec![3, 0],
        });
        let tuner = AutoTuner::with_config(metric(), config);
        let mut rng = StdRng::seed_from_u64(1);
        let err = tuner
            .tune(&[vec![0.0], vec![1.0]], &[vec![0.5]], &mut rng)
            .unwrap_err();
        assert!(matches!(err, NnError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_tune_small_sample() {
        let mut data_rng = StdRng::seed_from_u64(10);
        let points = sample(&mut data_rng, 120, 4);
        let queries = sample(&mut data_rng, 15, 4);
        let config = TunerConfig::default()
            .with_latency_source(LatencySource::CandidateCount)
            .with_workers(2);
        let tuner = AutoTuner::with_config(metric(), config);

        let mut rng = StdRng::seed_from_u64(99);
        let (index, report) = tuner.tune(&points, &queries, &mut rng).unwrap();

        assert_eq!(report.trials.len(), report.grid_size);
        assert!(!report.exhausted_budget);
        assert!(report.trials.iter().all(|t| t.score <= report.best.score));
        assert!((0.0..=1.0).contains(&report.best.recall));
        assert_eq!(index.len(), 120);
        assert_eq!(index.config().num_tables, report.best.params.num_tables);
        assert_eq!(index.config().hash_size, report.best.params.hash_size);
    }

    #[test]
    fn test_returned_index_matches_scored_recall() {
        let mut data_rng = StdRng::seed_from_u64(21);
        let points = sample(&mut data_rng, 80, 3);
        let queries = sample(&mut data_rng, 10, 3);
        let config = TunerConfig::default().with_latency_source(LatencySource::CandidateCount);
        let tuner = AutoTuner::with_config(metric(), config);
        let mut rng = StdRng::seed_from_u64(5);
        let (index, report) = tuner.tune(&points, &queries, &mut rng).unwrap();

        let mut oracle = BruteForceIndex::new(metric());
        oracle.build(&points).unwrap();
        let truth = oracle.ground_truth(&queries).unwrap();
        let hits = queries
            .iter()
            .zip(&truth)
            .filter(|(q, t)| index.find_nearest(q).unwrap().index == t.index)
            .count();
        assert!((hits as f64 / queries.len() as f64 - report.best.recall).abs() < 1e-12);
    }

    #[test]
    fn test_zero_budget_stops_after_first_wave() {
        let mut data_rng = StdRng::seed_from_u64(3);
        let points = sample(&mut data_rng, 60, 3);
        let queries = sample(&mut data_rng, 5, 3);
        let config = TunerConfig::default()
            .with_time_budget(Duration::ZERO)
            .with_workers(1);
        let tuner = AutoTuner::with_config(metric(), config);
        let mut rng = StdRng::seed_from_u64(8);
        let (_, report) = tuner.tune(&points, &queries, &mut rng).unwrap();

        assert!(report.exhausted_budget);
        assert_eq!(report.trials.len(), 1);
        assert_eq!(report.best.params, report.trials[0].params);
    }
}
