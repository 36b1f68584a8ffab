//! Distance metrics over input and output spaces.
//!
//! Individual fairness is stated as "similar individuals get similar outputs";
//! these metrics define "similar". Every metric here is a function of the row
//! difference `a - b`, which is why [`Distance::grad`] only returns the
//! gradient w.r.t. `a`: the gradient w.r.t. `b` is its negation.

use crate::error::{FairError, Result};
use ndarray::{Array1, Array2, Axis};
use std::fmt::Debug;

mod subspace;
pub use subspace::{SensitiveSubspaceDistance, SubspaceFitConfig};

/// A row-wise distance between two equally shaped batches.
pub trait Distance: Debug + Send + Sync {
    /// Distance between row `i` of `a` and row `i` of `b`, for every `i`.
    fn distance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64>;

    /// Gradient of each row's distance w.r.t. the corresponding row of `a`.
    fn grad(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64>;
}

/// `‖a - b‖₂`
#[derive(Clone, Copy, Debug, Default)]
pub struct EuclideanDistance;

impl Distance for EuclideanDistance {
    fn distance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64> {
        (a - b).mapv(|d| d * d).sum_axis(Axis(1)).mapv(f64::sqrt)
    }

    fn grad(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let mut diff = a - b;
        for mut row in diff.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }
        diff
    }
}

/// `‖a - b‖₂²`
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredEuclideanDistance;

impl Distance for SquaredEuclideanDistance {
    fn distance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64> {
        (a - b).mapv(|d| d * d).sum_axis(Axis(1))
    }

    fn grad(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        (a - b) * 2.0
    }
}

/// Euclidean distance that ignores protected attributes.
///
/// Two individuals differing only in protected columns are at distance zero,
/// so the auditor may move freely along those columns.
#[derive(Clone, Debug)]
pub struct ProtectedEuclideanDistance {
    mask: Array1<f64>,
}

impl ProtectedEuclideanDistance {
    /// `protected` lists the column indices to ignore out of `n_features`.
    pub fn new(protected: &[usize], n_features: usize) -> Result<Self> {
        let mut mask = Array1::ones(n_features);
        for &idx in protected {
            if idx >= n_features {
                return Err(FairError::InvalidParameter(format!(
                    "protected index {} out of range for {} features",
                    idx, n_features
                )));
            }
            mask[idx] = 0.0;
        }
        Ok(Self { mask })
    }

    fn masked_diff(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        (a - b) * &self.mask
    }
}

impl Distance for ProtectedEuclideanDistance {
    fn distance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64> {
        self.masked_diff(a, b)
            .mapv(|d| d * d)
            .sum_axis(Axis(1))
            .mapv(f64::sqrt)
    }

    fn grad(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let masked = self.masked_diff(a, b);
        EuclideanDistance.grad(&masked, &Array2::zeros(masked.raw_dim()))
    }
}

/// Squared Mahalanobis form `(a - b)ᵀ Σ (a - b)`.
#[derive(Clone, Debug)]
pub struct MahalanobisDistance {
    sigma: Array2<f64>,
}

impl MahalanobisDistance {
    pub fn new(sigma: Array2<f64>) -> Result<Self> {
        let (r, c) = sigma.dim();
        if r != c || r == 0 {
            return Err(FairError::shape("non-empty square matrix", format!("({}, {})", r, c)));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> &Array2<f64> {
        &self.sigma
    }
}

impl Distance for MahalanobisDistance {
    fn distance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64> {
        let diff = a - b;
        (diff.dot(&self.sigma) * &diff).sum_axis(Axis(1))
    }

    fn grad(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let diff = a - b;
        let sym = &self.sigma + &self.sigma.t();
        diff.dot(&sym)
    }
}
