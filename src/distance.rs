use ndarray::ArrayView1;

use crate::error::{NnError, Result};

/// A pairwise dissimilarity between two points of equal dimension.
///
/// Implementations must be stateless (or at least immutable), symmetric and
/// return `0.0` for identical inputs. They are shared between indexes, the
/// tuner and the harness behind an `Arc<dyn Distance>`.
pub trait Distance: Send + Sync {
    /// Distance between `a` and `b`. Fails with
    /// [`NnError::DimensionMismatch`] when the lengths differ.
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64>;

    /// Human-readable name used in reports.
    fn name(&self) -> &str;
}

/// Built-in distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DistanceMetric {
    /// Euclidean (L2) distance. Range [0, inf).
    #[default]
    Euclidean,
    /// Manhattan (L1) distance. Range [0, inf).
    Manhattan,
    /// Cosine distance: 1 - cos(a, b). Range [0, 2].
    Cosine,
}

impl DistanceMetric {
    /// Compute the distance without the dimension check.
    ///
    /// Mismatched inputs are compared over the shorter length.
    pub fn compute(&self, a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Manhattan => manhattan_distance(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }
}

impl Distance for DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
        check_dims(&a, &b)?;
        Ok(self.compute(&a, &b))
    }

    fn name(&self) -> &str {
        match self {
            DistanceMetric::Euclidean => "Euclidean",
            DistanceMetric::Manhattan => "Manhattan",
            DistanceMetric::Cosine => "Cosine",
        }
    }
}

/// Fail with [`NnError::DimensionMismatch`] unless both views have the same length.
#[inline]
pub fn check_dims(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> Result<()> {
    if a.len() != b.len() {
        return Err(NnError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }
    Ok(())
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Manhattan (L1) distance between two vectors.
pub fn manhattan_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Cosine distance: 1 - cos(a, b).
///
/// Two zero vectors are considered identical (distance 0); a zero vector
/// against a non-zero one has distance 1.
pub fn cosine_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    let denom = norm_a * norm_b;
    if denom < f64::EPSILON {
        return if norm_a < f64::EPSILON && norm_b < f64::EPSILON {
            0.0
        } else {
            1.0
        };
    }
    (1.0 - dot(a, b) / denom).max(0.0)
}

/// Dot product of two vectors.
#[inline]
pub fn dot(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
