use std::sync::Arc;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::distance::{Distance, DistanceMetric};
use crate::error::{NnError, Result};
use crate::hash::{probe_keys, ProjectionHasher};
use crate::index::{AlgorithmPerformance, NearestNeighborIndex, Neighbor, PointStore, TopK};
use crate::metrics::{MetricsCollector, MetricsSnapshot, QueryRecord};

/// What a query does when its probe windows yield fewer candidates than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmptyProbePolicy {
    /// Scan every stored point for that query (exact answer, brute-force cost).
    BruteForce,
    /// Double the probe radius until enough candidates appear or `max_radius`
    /// is reached, then scan every stored point.
    Widen { max_radius: usize },
}

/// Configuration for the LSH index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LshConfig {
    /// Number of independent hash tables.
    pub num_tables: usize,
    /// Number of projections folded into each bucket key.
    pub hash_size: usize,
    /// Bucket width in projected space.
    pub w: f64,
    /// Keys `key - probe_radius ..= key + probe_radius` are probed per table.
    pub probe_radius: usize,
    /// Behaviour when the probe windows come up short.
    pub empty_probe: EmptyProbePolicy,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            num_tables: 5,
            hash_size: 4,
            w: 1.0,
            probe_radius: 5,
            empty_probe: EmptyProbePolicy::BruteForce,
        }
    }
}

impl LshConfig {
    /// Reject parameters that would make hashing meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.num_tables == 0 {
            return Err(NnError::InvalidConfiguration(
                "num_tables must be > 0".into(),
            ));
        }
        if self.hash_size == 0 {
            return Err(NnError::InvalidConfiguration(
                "hash_size must be > 0".into(),
            ));
        }
        if !(self.w.is_finite() && self.w > 0.0) {
            return Err(NnError::InvalidConfiguration(format!(
                "w must be positive and finite, got {}",
                self.w
            )));
        }
        Ok(())
    }
}

/// Aggregate statistics about a built index.
#[derive(Debug, Clone)]
pub struct LshStats {
    pub num_points: usize,
    pub dimension: usize,
    pub num_tables: usize,
    pub hash_size: usize,
    pub w: f64,
    pub probe_radius: usize,
    pub total_buckets: usize,
    pub avg_bucket_size: f64,
    pub max_bucket_size: usize,
    pub memory_estimate_bytes: usize,
}

impl std::fmt::Display for LshStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LshIndex {{ points: {}, dim: {}, tables: {}, hash_size: {}, w: {:.4}, \
             probe: ±{}, buckets: {}, avg_bucket: {:.1}, max_bucket: {}, mem: ~{:.1}KB }}",
            self.num_points,
            self.dimension,
            self.num_tables,
            self.hash_size,
            self.w,
            self.probe_radius,
            self.total_buckets,
            self.avg_bucket_size,
            self.max_bucket_size,
            self.memory_estimate_bytes as f64 / 1024.0,
        )
    }
}

/// Result of a single query together with how it was answered.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Selected neighbors, ascending by distance.
    pub neighbors: Vec<Neighbor>,
    /// Number of distance evaluations performed.
    pub candidates: usize,
    /// True when the probe windows came up short and every point was scanned.
    pub fell_back: bool,
}

// ---------------------------------------------------------------------------
// LshIndex
// ---------------------------------------------------------------------------

/// Multi-table, multi-probe random-projection LSH index.
///
/// Every `build` redraws the hash families and rebuilds all tables. Queries
/// only read, so a built index can be shared across threads.
pub struct LshIndex {
    config: LshConfig,
    metric: Arc<dyn Distance>,
    rng: StdRng,
    points: PointStore,
    hashers: Vec<ProjectionHasher>,
    tables: Vec<HashMap<i64, Vec<usize>>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for LshIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LshIndex")
            .field("config", &self.config)
            .field("metric", &self.metric.name())
            .field("num_points", &self.points.len())
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}

impl LshIndex {
    /// Start building an index with the builder pattern.
    pub fn builder() -> LshIndexBuilder {
        LshIndexBuilder::new()
    }

    /// Create an unbuilt index. A private generator is seeded from `rng`, so
    /// [`NearestNeighborIndex::build`] is reproducible for a seeded caller.
    pub fn new(config: LshConfig, metric: Arc<dyn Distance>, rng: &mut impl Rng) -> Result<Self> {
        Self::with_parts(config, metric, StdRng::seed_from_u64(rng.gen()), false)
    }

    fn with_parts(
        config: LshConfig,
        metric: Arc<dyn Distance>,
        rng: StdRng,
        enable_metrics: bool,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            metric,
            rng,
            points: PointStore::default(),
            hashers: Vec::new(),
            tables: Vec::new(),
            metrics: enable_metrics.then(|| Arc::new(MetricsCollector::new())),
        })
    }

    // ------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------

    /// Build from `dataset`, drawing every hash family from `rng`.
    pub fn build_with_rng(
        &mut self,
        dataset: &[Vec<f64>],
        rng: &mut impl Rng,
    ) -> Result<AlgorithmPerformance> {
        let start = Instant::now();

        let points = PointStore::from_rows(dataset)?;
        let dim = points.dim();
        let hashers: Vec<ProjectionHasher> = (0..self.config.num_tables)
            .map(|_| ProjectionHasher::new(dim, self.config.hash_size, self.config.w, rng))
            .collect();

        let keys = hash_points(&hashers, &points);
        let mut tables: Vec<HashMap<i64, Vec<usize>>> =
            (0..self.config.num_tables).map(|_| HashMap::new()).collect();
        for (idx, point_keys) in keys.into_iter().enumerate() {
            for (table, key) in tables.iter_mut().zip(point_keys) {
                table.entry(key).or_default().push(idx);
            }
        }

        self.points = points;
        self.hashers = hashers;
        self.tables = tables;

        let preprocess_time = start.elapsed();
        let memory_usage = self.memory_bytes();
        debug!(
            points = self.points.len(),
            dim,
            tables = self.config.num_tables,
            hash_size = self.config.hash_size,
            w = self.config.w,
            buckets = self.tables.iter().map(|t| t.len()).sum::<usize>(),
            elapsed_us = preprocess_time.as_micros() as u64,
            "built LSH index"
        );

        Ok(AlgorithmPerformance {
            preprocess_time,
            memory_usage,
            recall: None,
        })
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// Find up to `k` approximate nearest neighbors and report how many
    /// distance evaluations it took.
    pub fn search(&self, query: &[f64], k: usize) -> Result<SearchOutcome> {
        let started = self.metrics.as_ref().map(|_| Instant::now());
        let query = self.points.check_query(query)?;
        let k = k.min(self.points.len());

        let mut tally = QueryRecord::default();
        let candidate_ids = self.probe(&query, k, &mut tally);
        let mut top = TopK::new(k);
        match &candidate_ids {
            Some(ids) => {
                for &idx in ids {
                    top.offer(idx, self.metric.distance(query, self.points.row(idx))?);
                }
            }
            None => {
                trace!(wanted = k, "probe windows came up short; scanning all points");
                for (idx, point) in self.points.rows().enumerate() {
                    top.offer(idx, self.metric.distance(query, point)?);
                }
            }
        }
        let candidates = candidate_ids.map_or(self.points.len(), |ids| ids.len());
        let fell_back = tally.fell_back;

        if let (Some(m), Some(started)) = (self.metrics.as_ref(), started) {
            tally.candidates = candidates as u64;
            tally.elapsed_ns = started.elapsed().as_nanos() as u64;
            m.record(&tally);
        }

        Ok(SearchOutcome {
            neighbors: top.into_sorted(),
            candidates,
            fell_back,
        })
    }

    /// Deduplicated candidates holding at least `wanted` points, or `None` when
    /// the policy gives up and the caller must scan everything.
    fn probe(
        &self,
        query: &ArrayView1<f64>,
        wanted: usize,
        tally: &mut QueryRecord,
    ) -> Option<Vec<usize>> {
        if wanted == 0 {
            return Some(Vec::new());
        }
        let query_keys: Vec<i64> = self.hashers.iter().map(|h| h.bucket_key(query)).collect();

        let mut radius = self.config.probe_radius;
        loop {
            let candidates = self.gather(&query_keys, radius, tally);
            if candidates.len() >= wanted {
                return Some(candidates);
            }
            let give_up = match self.config.empty_probe {
                EmptyProbePolicy::BruteForce => true,
                EmptyProbePolicy::Widen { max_radius } => {
                    if radius >= max_radius {
                        true
                    } else {
                        radius = radius.max(1).saturating_mul(2).min(max_radius);
                        trace!(radius, "widening probe window");
                        false
                    }
                }
            };
            if give_up {
                tally.fell_back = true;
                return None;
            }
        }
    }

    /// Union of the buckets in every table's probe window, in first-seen order.
    fn gather(&self, query_keys: &[i64], radius: usize, tally: &mut QueryRecord) -> Vec<usize> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut candidates = Vec::new();

        for (table, &key) in self.tables.iter().zip(query_keys) {
            for probe in probe_keys(key, radius) {
                let Some(bucket) = table.get(&probe) else {
                    tally.probe_misses += 1;
                    continue;
                };
                tally.probe_hits += 1;
                for &idx in bucket {
                    if seen.insert(idx) {
                        candidates.push(idx);
                    }
                }
            }
        }
        candidates
    }

    // ------------------------------------------------------------------
    // Stats / metrics
    // ------------------------------------------------------------------

    /// Estimated footprint: stored points, hash families and table buckets.
    pub fn memory_bytes(&self) -> usize {
        let hasher_mem: usize = self.hashers.iter().map(|h| h.memory_bytes()).sum();
        let table_mem: usize = self
            .tables
            .iter()
            .map(|t| {
                let entries: usize = t.values().map(|b| b.len()).sum();
                t.len() * (std::mem::size_of::<i64>() + std::mem::size_of::<Vec<usize>>())
                    + entries * std::mem::size_of::<usize>()
            })
            .sum();
        self.points.memory_bytes() + hasher_mem + table_mem
    }

    /// Compute aggregate statistics about the index.
    pub fn stats(&self) -> LshStats {
        let total_buckets: usize = self.tables.iter().map(|t| t.len()).sum();
        let total_entries: usize = self
            .tables
            .iter()
            .flat_map(|t| t.values())
            .map(|b| b.len())
            .sum();
        let max_bucket_size = self
            .tables
            .iter()
            .flat_map(|t| t.values())
            .map(|b| b.len())
            .max()
            .unwrap_or(0);

        LshStats {
            num_points: self.points.len(),
            dimension: self.points.dim(),
            num_tables: self.config.num_tables,
            hash_size: self.config.hash_size,
            w: self.config.w,
            probe_radius: self.config.probe_radius,
            total_buckets,
            avg_bucket_size: if total_buckets > 0 {
                total_entries as f64 / total_buckets as f64
            } else {
                0.0
            },
            max_bucket_size,
            memory_estimate_bytes: self.memory_bytes(),
        }
    }

    /// Snapshot of runtime metrics (`None` if metrics were not enabled).
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Reset metrics counters.
    pub fn reset_metrics(&self) {
        if let Some(ref m) = self.metrics {
            m.reset();
        }
    }

    pub fn config(&self) -> &LshConfig {
        &self.config
    }
}

#[cfg(feature = "parallel")]
fn hash_points(hashers: &[ProjectionHasher], points: &PointStore) -> Vec<Vec<i64>> {
    use rayon::prelude::*;

    (0..points.len())
        .into_par_iter()
        .map(|idx| {
            let point = points.row(idx);
            hashers.iter().map(|h| h.bucket_key(&point)).collect()
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn hash_points(hashers: &[ProjectionHasher], points: &PointStore) -> Vec<Vec<i64>> {
    points
        .rows()
        .map(|point| hashers.iter().map(|h| h.bucket_key(&point)).collect())
        .collect()
}

impl NearestNeighborIndex for LshIndex {
    fn build(&mut self, dataset: &[Vec<f64>]) -> Result<AlgorithmPerformance> {
        let mut rng = self.rng.clone();
        let perf = self.build_with_rng(dataset, &mut rng);
        self.rng = rng;
        perf
    }

    fn find_nearest(&self, query: &[f64]) -> Result<Neighbor> {
        self.search(query, 1)?
            .neighbors
            .into_iter()
            .next()
            .ok_or(NnError::EmptyIndex)
    }

    fn find_k_nearest(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>> {
        Ok(self.search(query, k)?.neighbors)
    }

    fn name(&self) -> &str {
        "LSH"
    }

    fn metric(&self) -> &dyn Distance {
        self.metric.as_ref()
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    fn dimension(&self) -> usize {
        self.points.dim()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LshIndex`].
pub struct LshIndexBuilder {
    config: LshConfig,
    metric: Arc<dyn Distance>,
    seed: Option<u64>,
    enable_metrics: bool,
}

impl Default for LshIndexBuilder {
    fn default() -> Self {
        Self {
            config: LshConfig::default(),
            metric: Arc::new(DistanceMetric::Euclidean),
            seed: None,
            enable_metrics: false,
        }
    }
}

impl LshIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: LshConfig) -> Self {
        self.config = config;
        self
    }

    pub fn num_tables(mut self, n: usize) -> Self {
        self.config.num_tables = n;
        self
    }

    pub fn hash_size(mut self, n: usize) -> Self {
        self.config.hash_size = n;
        self
    }

    pub fn w(mut self, w: f64) -> Self {
        self.config.w = w;
        self
    }

    pub fn probe_radius(mut self, r: usize) -> Self {
        self.config.probe_radius = r;
        self
    }

    pub fn empty_probe(mut self, policy: EmptyProbePolicy) -> Self {
        self.config.empty_probe = policy;
        self
    }

    pub fn metric(mut self, metric: Arc<dyn Distance>) -> Self {
        self.metric = metric;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn enable_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Create the index, returning an error on invalid configuration.
    /// Without a seed the generator is seeded from OS entropy.
    pub fn build(self) -> Result<LshIndex> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        LshIndex::with_parts(self.config, self.metric, rng, self.enable_metrics)
    }

    /// Create the index with its generator seeded from `rng`.
    pub fn build_with_rng(self, rng: &mut impl Rng) -> Result<LshIndex> {
        let rng = StdRng::seed_from_u64(rng.gen());
        LshIndex::with_parts(self.config, self.metric, rng, self.enable_metrics)
    }
}
