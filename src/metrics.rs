use std::sync::atomic::{AtomicU64, Ordering};

/// What one LSH query cost, reported to [`MetricsCollector::record`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryRecord {
    /// Distance evaluations performed.
    pub candidates: u64,
    /// Probed keys that matched a bucket, summed over tables and widenings.
    pub probe_hits: u64,
    /// Probed keys with no bucket.
    pub probe_misses: u64,
    /// The query was answered by a full scan.
    pub fell_back: bool,
    pub elapsed_ns: u64,
}

/// Query counters for an LSH index. Atomic, so a shared index can record
/// from many threads at once.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    queries: AtomicU64,
    candidates: AtomicU64,
    elapsed_ns: AtomicU64,
    probe_hits: AtomicU64,
    probe_misses: AtomicU64,
    fallbacks: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, query: &QueryRecord) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.candidates.fetch_add(query.candidates, Ordering::Relaxed);
        self.elapsed_ns.fetch_add(query.elapsed_ns, Ordering::Relaxed);
        self.probe_hits.fetch_add(query.probe_hits, Ordering::Relaxed);
        self.probe_misses.fetch_add(query.probe_misses, Ordering::Relaxed);
        if query.fell_back {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let queries = load(&self.queries);
        let hits = load(&self.probe_hits);
        let probes = hits + load(&self.probe_misses);
        let per_query = |total: u64| {
            if queries == 0 {
                0.0
            } else {
                total as f64 / queries as f64
            }
        };

        MetricsSnapshot {
            query_count: queries,
            fallback_scans: load(&self.fallbacks),
            avg_query_time_us: per_query(load(&self.elapsed_ns)) / 1000.0,
            avg_candidates_per_query: per_query(load(&self.candidates)),
            hit_rate: if probes == 0 {
                0.0
            } else {
                hits as f64 / probes as f64
            },
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.queries,
            &self.candidates,
            &self.elapsed_ns,
            &self.probe_hits,
            &self.probe_misses,
            &self.fallbacks,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Counters at one instant, reduced to per-query averages.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub query_count: u64,
    /// Queries answered by scanning every point.
    pub fallback_scans: u64,
    pub avg_query_time_us: f64,
    /// Distance evaluations per query.
    pub avg_candidates_per_query: f64,
    /// Fraction of probed keys that matched a bucket.
    pub hit_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "queries={} fallbacks={} avg_query={:.2}us avg_candidates={:.1} hit_rate={:.1}%",
            self.query_count,
            self.fallback_scans,
            self.avg_query_time_us,
            self.avg_candidates_per_query,
            self.hit_rate * 100.0,
        )
    }
}
