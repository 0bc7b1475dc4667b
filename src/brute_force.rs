//! Exact linear-scan search, the ground-truth oracle for everything else.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::distance::Distance;
use crate::error::Result;
use crate::index::{AlgorithmPerformance, NearestNeighborIndex, Neighbor, PointStore, TopK};

/// Exact nearest-neighbor index that compares the query with every stored point.
pub struct BruteForceIndex {
    metric: Arc<dyn Distance>,
    points: PointStore,
}

impl std::fmt::Debug for BruteForceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BruteForceIndex")
            .field("metric", &self.metric.name())
            .field("num_points", &self.points.len())
            .field("dimension", &self.points.dim())
            .finish()
    }
}

impl BruteForceIndex {
    pub fn new(metric: Arc<dyn Distance>) -> Self {
        Self {
            metric,
            points: PointStore::default(),
        }
    }

    /// Exact nearest neighbor of every query, in query order.
    pub fn ground_truth(&self, queries: &[Vec<f64>]) -> Result<Vec<Neighbor>> {
        queries.iter().map(|q| self.find_nearest(q)).collect()
    }
}

impl NearestNeighborIndex for BruteForceIndex {
    fn build(&mut self, dataset: &[Vec<f64>]) -> Result<AlgorithmPerformance> {
        let start = Instant::now();
        self.points = PointStore::from_rows(dataset)?;
        let preprocess_time = start.elapsed();

        debug!(
            points = self.points.len(),
            dim = self.points.dim(),
            elapsed_us = preprocess_time.as_micros() as u64,
            "built brute-force index"
        );

        Ok(AlgorithmPerformance {
            preprocess_time,
            memory_usage: self.points.memory_bytes(),
            recall: Some(1.0),
        })
    }

    fn find_nearest(&self, query: &[f64]) -> Result<Neighbor> {
        let query = self.points.check_query(query)?;

        let mut best = Neighbor {
            index: 0,
            distance: f64::INFINITY,
        };
        for (index, point) in self.points.rows().enumerate() {
            let distance = self.metric.distance(query, point)?;
            if distance < best.distance {
                best = Neighbor { index, distance };
            }
        }
        Ok(best)
    }

    fn find_k_nearest(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>> {
        let query = self.points.check_query(query)?;
        let k = k.min(self.points.len());

        let mut top = TopK::new(k);
        for (index, point) in self.points.rows().enumerate() {
            top.offer(index, self.metric.distance(query, point)?);
        }
        Ok(top.into_sorted())
    }

    fn name(&self) -> &str {
        "BruteForce"
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
