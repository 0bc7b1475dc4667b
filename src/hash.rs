use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_distr::Uniform;

/// Multiplier used to fold per-projection slots into one bucket key.
const KEY_MIX: i64 = 31;

/// A quantized random-projection hash family for one hash table.
///
/// Each of the `hash_size` projections maps a point to
/// `trunc((dot(p, a_j) + b_j) / w)`; the slots are folded left-to-right into
/// a single signed bucket key.
#[derive(Debug, Clone)]
pub struct ProjectionHasher {
    /// One projection vector per row, shape `(hash_size, dim)`.
    projections: Array2<f64>,
    offsets: Array1<f64>,
    w: f64,
}

impl ProjectionHasher {
    /// Draw `hash_size` projection vectors of dimension `dim` with components
    /// uniform on `[-1, 1]`, and `hash_size` offsets uniform on `[0, w)`.
    ///
    /// `w` must be positive and finite.
    pub fn new(dim: usize, hash_size: usize, w: f64, rng: &mut impl Rng) -> Self {
        let component = Uniform::new_inclusive(-1.0, 1.0);
        let offset = Uniform::new(0.0, w);
        let projections = Array2::from_shape_fn((hash_size, dim), |_| rng.sample(component));
        let offsets = Array1::from_shape_fn(hash_size, |_| rng.sample(offset));
        Self {
            projections,
            offsets,
            w,
        }
    }

    /// Bucket key of `point`. The caller guarantees `point.len() == self.dim()`.
    pub fn bucket_key(&self, point: &ArrayView1<f64>) -> i64 {
        let projected = self.projections.dot(point);
        projected
            .iter()
            .zip(self.offsets.iter())
            .fold(0i64, |code, (p, b)| {
                code.wrapping_mul(KEY_MIX)
                    .wrapping_add(slot(p + b, self.w))
            })
    }

    /// Number of projections (slots folded into each key).
    pub fn hash_size(&self) -> usize {
        self.projections.nrows()
    }

    /// Dimension of the projection vectors.
    pub fn dim(&self) -> usize {
        self.projections.ncols()
    }

    /// Bucket width.
    pub fn w(&self) -> f64 {
        self.w
    }

    /// Bytes held by the projections and offsets.
    pub fn memory_bytes(&self) -> usize {
        (self.projections.len() + self.offsets.len()) * std::mem::size_of::<f64>()
    }
}

/// Quantize a shifted projection: divide by `w` and truncate toward zero.
///
/// Out-of-range values saturate at `i64::MIN`/`i64::MAX`; NaN maps to 0.
#[inline]
pub fn slot(value: f64, w: f64) -> i64 {
    (value / w) as i64
}

/// Keys probed for a query whose exact key is `key`: the symmetric window
/// `key - radius ..= key + radius`, in ascending offset order.
pub fn probe_keys(key: i64, radius: usize) -> impl Iterator<Item = i64> {
    let r = radius.min(i64::MAX as usize) as i64;
    (-r..=r).map(move |offset| key.wrapping_add(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_deterministic_hash() {
        let mut rng = StdRng::seed_from_u64(42);
        let hasher = ProjectionHasher::new(4, 8, 1.0, &mut rng);
        let v = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(hasher.bucket_key(&v.view()), hasher.bucket_key(&v.view()));
    }

    #[test]
    fn test_same_seed_same_family() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        let ha = ProjectionHasher::new(3, 4, 0.5, &mut a);
        let hb = ProjectionHasher::new(3, 4, 0.5, &mut b);
        let v = array![0.3, -0.2, 0.9];
        assert_eq!(ha.bucket_key(&v.view()), hb.bucket_key(&v.view()));
    }

    #[test]
    fn test_draw_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        let hasher = ProjectionHasher::new(16, 6, 0.25, &mut rng);
        assert_eq!(hasher.hash_size(), 6);
        assert_eq!(hasher.dim(), 16);
        assert!(hasher.projections.iter().all(|x| (-1.0..=1.0).contains(x)));
        assert!(hasher.offsets.iter().all(|b| (0.0..0.25).contains(b)));
    }

    #[test]
    fn test_key_folding() {
        // Identity projections with zero offsets make slots easy to predict.
        let hasher = ProjectionHasher {
            projections: array![[1.0, 0.0], [0.0, 1.0]],
            offsets: array![0.0, 0.0],
            w: 1.0,
        };
        let v = array![2.5, -3.7];
        // slots: 2, -3 -> (0 * 31 + 2) * 31 + (-3)
        assert_eq!(hasher.bucket_key(&v.view()), 2 * 31 - 3);
    }

    #[test]
    fn test_slot_truncates_toward_zero() {
        assert_eq!(slot(1.9, 1.0), 1);
        assert_eq!(slot(-1.9, 1.0), -1);
        assert_eq!(slot(f64::INFINITY, 1.0), i64::MAX);
        assert_eq!(slot(f64::NAN, 1.0), 0);
    }

    #[test]
    fn test_probe_keys_window() {
        let keys: Vec<i64> = probe_keys(10, 2).collect();
        assert_eq!(keys, vec![8, 9, 10, 11, 12]);
        let only: Vec<i64> = probe_keys(-4, 0).collect();
        assert_eq!(only, vec![-4]);
    }

    #[test]
    fn test_probe_keys_wrap() {
        let keys: Vec<i64> = probe_keys(i64::MAX, 1).collect();
        assert_eq!(keys, vec![i64::MAX - 1, i64::MAX, i64::MIN]);
    }
}
