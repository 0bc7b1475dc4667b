//! Synthetic point sets for benchmarks, tests and tuning samples.

use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal, Uniform};

use crate::error::{NnError, Result};

/// A source of synthetic points drawn from a named distribution.
pub trait DataGenerator {
    /// `num_points` points of dimension `dim`, drawn from `rng`.
    fn generate(&self, num_points: usize, dim: usize, rng: &mut dyn RngCore) -> Vec<Vec<f64>>;

    /// Distribution label used in reports.
    fn name(&self) -> &str;
}

/// Coordinates drawn independently and uniformly from `[min, max)`.
#[derive(Debug, Clone, Copy)]
pub struct UniformGenerator {
    dist: Uniform<f64>,
}

impl UniformGenerator {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(NnError::InvalidConfiguration(format!(
                "uniform range must satisfy min < max, got [{min}, {max})"
            )));
        }
        Ok(Self {
            dist: Uniform::new(min, max),
        })
    }
}

impl DataGenerator for UniformGenerator {
    fn generate(&self, num_points: usize, dim: usize, rng: &mut dyn RngCore) -> Vec<Vec<f64>> {
        sample_points(&self.dist, num_points, dim, rng)
    }

    fn name(&self) -> &str {
        "Uniform"
    }
}

/// Coordinates drawn independently from a normal distribution.
#[derive(Debug, Clone, Copy)]
pub struct NormalGenerator {
    dist: Normal<f64>,
}

impl NormalGenerator {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        let dist = Normal::new(mean, std_dev)
            .map_err(|e| NnError::InvalidConfiguration(format!("normal distribution: {e}")))?;
        Ok(Self { dist })
    }
}

impl DataGenerator for NormalGenerator {
    fn generate(&self, num_points: usize, dim: usize, rng: &mut dyn RngCore) -> Vec<Vec<f64>> {
        sample_points(&self.dist, num_points, dim, rng)
    }

    fn name(&self) -> &str {
        "Normal"
    }
}

fn sample_points<D: Distribution<f64>, R: Rng + ?Sized>(
    dist: &D,
    num_points: usize,
    dim: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    (0..num_points)
        .map(|_| (0..dim).map(|_| dist.sample(rng)).collect())
        .collect()
}
