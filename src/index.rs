use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use ndarray::{Array2, ArrayView1};

use crate::distance::Distance;
use crate::error::{NnError, Result};

/// A single nearest-neighbor result.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neighbor {
    /// 0-based position of the point in the dataset passed to `build`.
    pub index: usize,
    /// Distance from the query point (lower is closer).
    pub distance: f64,
}

/// Cost of a `build` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmPerformance {
    /// Wall-clock time spent copying the dataset and building auxiliary structures.
    pub preprocess_time: Duration,
    /// Estimated heap footprint of the index in bytes.
    pub memory_usage: usize,
    /// Recall known by construction (`Some(1.0)` for exact search). Approximate
    /// indexes leave this `None`; the harness measures it.
    pub recall: Option<f64>,
}

/// Common capability shared by every nearest-neighbor index.
pub trait NearestNeighborIndex: Send + Sync {
    /// Copy `dataset` into the index, replacing any previous contents.
    fn build(&mut self, dataset: &[Vec<f64>]) -> Result<AlgorithmPerformance>;

    /// Closest stored point to `query`.
    fn find_nearest(&self, query: &[f64]) -> Result<Neighbor>;

    /// Up to `k` closest stored points, ascending by distance. `k` is clamped
    /// to the number of stored points.
    fn find_k_nearest(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>>;

    /// Algorithm name used in reports.
    fn name(&self) -> &str;

    /// The distance function used for ranking.
    fn metric(&self) -> &dyn Distance;

    /// Number of stored points.
    fn len(&self) -> usize;

    /// True when no points are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of the stored points (0 when empty).
    fn dimension(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Owned point storage
// ---------------------------------------------------------------------------

/// Owned, contiguous copy of a dataset. Row `i` is the point with index `i`.
#[derive(Debug, Clone)]
pub(crate) struct PointStore {
    points: Array2<f64>,
}

impl Default for PointStore {
    fn default() -> Self {
        Self {
            points: Array2::zeros((0, 0)),
        }
    }
}

impl PointStore {
    /// Copy `dataset`, taking the dimension from the first point.
    pub(crate) fn from_rows(dataset: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = dataset.first() else {
            return Ok(Self::default());
        };
        let dim = first.len();
        let mut flat = Vec::with_capacity(dataset.len() * dim);
        for point in dataset {
            if point.len() != dim {
                return Err(NnError::DimensionMismatch {
                    expected: dim,
                    got: point.len(),
                });
            }
            flat.extend_from_slice(point);
        }
        let points = Array2::from_shape_vec((dataset.len(), dim), flat)
            .map_err(|e| NnError::InvalidConfiguration(e.to_string()))?;
        Ok(Self { points })
    }

    pub(crate) fn len(&self) -> usize {
        self.points.nrows()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    pub(crate) fn dim(&self) -> usize {
        self.points.ncols()
    }

    pub(crate) fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.points.row(index)
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.points.outer_iter()
    }

    /// Validate a query against the stored points.
    pub(crate) fn check_query<'q>(&self, query: &'q [f64]) -> Result<ArrayView1<'q, f64>> {
        if self.is_empty() {
            return Err(NnError::EmptyIndex);
        }
        if query.len() != self.dim() {
            return Err(NnError::DimensionMismatch {
                expected: self.dim(),
                got: query.len(),
            });
        }
        Ok(ArrayView1::from(query))
    }

    /// Bytes held by the stored coordinates plus the container header.
    pub(crate) fn memory_bytes(&self) -> usize {
        self.points.len() * std::mem::size_of::<f64>() + std::mem::size_of::<Array2<f64>>()
    }
}

// ---------------------------------------------------------------------------
// Bounded best-k selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Entry {
    distance: f64,
    seq: usize,
    index: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Keeps the `k` smallest `(distance, index)` pairs seen so far.
///
/// Equal distances are ordered by offer order, so the first-offered point wins.
#[derive(Debug)]
pub(crate) struct TopK {
    k: usize,
    seq: usize,
    heap: BinaryHeap<Entry>,
}

impl TopK {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            seq: 0,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    pub(crate) fn offer(&mut self, index: usize, distance: f64) {
        let entry = Entry {
            distance,
            seq: self.seq,
            index,
        };
        self.seq += 1;
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(worst) = self.heap.peek() {
            if entry < *worst {
                self.heap.pop();
                self.heap.push(entry);
            }
        }
    }

    /// Selected neighbors, ascending by distance.
    pub(crate) fn into_sorted(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| Neighbor {
                index: e.index,
                distance: e.distance,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_store_ragged() {
        let err = PointStore::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, NnError::DimensionMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn test_point_store_empty_query() {
        let store = PointStore::from_rows(&[]).unwrap();
        assert!(store.is_empty());
        assert!(matches!(store.check_query(&[1.0]), Err(NnError::EmptyIndex)));
    }

    #[test]
    fn test_point_store_rows() {
        let store = PointStore::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.dim(), 2);
        assert_eq!(store.row(1).to_vec(), vec![3.0, 4.0]);
        assert!(store.memory_bytes() >= 4 * std::mem::size_of::<f64>());
    }

    #[test]
    fn test_top_k_keeps_smallest() {
        let mut top = TopK::new(2);
        for (i, d) in [5.0, 1.0, 3.0, 0.5, 4.0].into_iter().enumerate() {
            top.offer(i, d);
        }
        let result = top.into_sorted();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].index, 3);
        assert_eq!(result[1].index, 1);
    }

    #[test]
    fn test_top_k_tie_keeps_first() {
        let mut top = TopK::new(1);
        top.offer(7, 1.0);
        top.offer(2, 1.0);
        assert_eq!(top.into_sorted()[0].index, 7);
    }

    #[test]
    fn test_top_k_zero() {
        let mut top = TopK::new(0);
        top.offer(0, 1.0);
        assert!(top.into_sorted().is_empty());
    }
}
