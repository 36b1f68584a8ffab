//! Differentiable criteria used as the base loss of fair training.
//!
//! Implementors define:
//! - the scalar loss value (mean over the batch),
//! - the gradient of that value w.r.t. the network output,
//! - the non-linearity applied to raw outputs by `predict_proba`.
//!
//! Predictions are always `(n, k)` matrices. Targets are either the same
//! shape, or, for [`CrossEntropyLoss`], an `(n, 1)` column of class indices.

use crate::error::{FairError, Result};
use ndarray::{Array2, Axis, Zip};

/// A differentiable loss with mean reduction.
pub trait Criterion: Clone {
    /// Computes the scalar loss value.
    fn loss(&self, prediction: &Array2<f64>, target: &Array2<f64>) -> f64;

    /// Computes `∂L/∂prediction`, which is passed to the network's backward pass.
    fn grad_wrt_prediction(&self, prediction: &Array2<f64>, target: &Array2<f64>) -> Array2<f64>;

    /// Maps raw network outputs to the values returned by `predict_proba`.
    fn predict_nonlinearity(&self, prediction: &Array2<f64>) -> Array2<f64> {
        prediction.clone()
    }

    /// Checks that `target` can be scored against a network with
    /// `n_outputs` output columns.
    ///
    /// # Errors
    /// Returns [`FairError::InvalidShape`] when the widths disagree.
    fn check_target(&self, n_outputs: usize, target: &Array2<f64>) -> Result<()> {
        if target.ncols() != n_outputs {
            return Err(FairError::shape(
                format!("{} target columns", n_outputs),
                format!("{} target columns", target.ncols()),
            ));
        }
        Ok(())
    }
}

/// Mean Squared Error: `L = (1/N) Σ (pred - target)²` over all `N` entries.
///
/// Gradient: `2 (pred - target) / N`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MSELoss;

impl Criterion for MSELoss {
    fn loss(&self, pred: &Array2<f64>, target: &Array2<f64>) -> f64 {
        let diff = pred - target;
        diff.mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    fn grad_wrt_prediction(&self, pred: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        let n = pred.len().max(1) as f64;
        (pred - target) * (2.0 / n)
    }
}

/// Mean Absolute Error: `L = (1/N) Σ |pred - target|`.
///
/// Gradient: `sign(pred - target) / N` (subgradient 0 at zero).
#[derive(Clone, Copy, Debug, Default)]
pub struct MAELoss;

impl Criterion for MAELoss {
    fn loss(&self, pred: &Array2<f64>, target: &Array2<f64>) -> f64 {
        (pred - target).mapv(f64::abs).mean().unwrap_or(0.0)
    }

    fn grad_wrt_prediction(&self, pred: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        let n = pred.len().max(1) as f64;
        (pred - target).mapv(|d| {
            if d > 0.0 {
                1.0 / n
            } else if d < 0.0 {
                -1.0 / n
            } else {
                0.0
            }
        })
    }
}

/// Binary Cross-Entropy on logits (numerically stable).
///
/// Computes `max(z, 0) - z t + log(1 + exp(-|z|))` averaged over all entries.
/// Gradient w.r.t. logits: `(σ(z) - t) / N`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BCEWithLogitsLoss;

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Criterion for BCEWithLogitsLoss {
    fn loss(&self, logits: &Array2<f64>, targets: &Array2<f64>) -> f64 {
        let mut total = 0.0;
        Zip::from(logits).and(targets).for_each(|&z, &t| {
            total += z.max(0.0) - z * t + (-z.abs()).exp().ln_1p();
        });
        total / logits.len().max(1) as f64
    }

    fn grad_wrt_prediction(&self, logits: &Array2<f64>, targets: &Array2<f64>) -> Array2<f64> {
        let n = logits.len().max(1) as f64;
        Zip::from(logits)
            .and(targets)
            .map_collect(|&z, &t| (sigmoid(z) - t) / n)
    }

    fn predict_nonlinearity(&self, logits: &Array2<f64>) -> Array2<f64> {
        logits.mapv(sigmoid)
    }
}

/// Softmax cross-entropy on logits.
///
/// Targets are either an `(n, 1)` column of class indices, or an `(n, k)`
/// matrix of class probabilities (one-hot or soft). The loss is averaged over
/// samples.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrossEntropyLoss;

/// Row-wise softmax with max subtraction.
pub fn softmax(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = logits.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

impl CrossEntropyLoss {
    /// Expands class-index targets into one-hot rows; probability targets pass through.
    ///
    /// Indices outside `0..k` leave their row empty; [`Criterion::check_target`]
    /// rejects them before training.
    fn target_distribution(logits: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        let (n, k) = logits.dim();
        if target.ncols() == 1 && k > 1 {
            let mut dist = Array2::zeros((n, k));
            for (i, &cls) in target.column(0).iter().enumerate() {
                if cls < 0.0 {
                    continue;
                }
                if let Some(slot) = dist.get_mut((i, cls.round() as usize)) {
                    *slot = 1.0;
                }
            }
            dist
        } else {
            target.clone()
        }
    }
}

impl Criterion for CrossEntropyLoss {
    fn loss(&self, logits: &Array2<f64>, target: &Array2<f64>) -> f64 {
        let n = logits.nrows().max(1) as f64;
        let dist = Self::target_distribution(logits, target);
        let mut total = 0.0;
        for (row, t) in logits.axis_iter(Axis(0)).zip(dist.axis_iter(Axis(0))) {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            let log_sum_exp = max + row.mapv(|v| (v - max).exp()).sum().ln();
            total += row
                .iter()
                .zip(t.iter())
                .map(|(&z, &p)| p * (log_sum_exp - z))
                .sum::<f64>();
        }
        total / n
    }

    fn grad_wrt_prediction(&self, logits: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        let n = logits.nrows().max(1) as f64;
        let dist = Self::target_distribution(logits, target);
        let probs = softmax(logits);
        let mut grad = Array2::zeros(logits.raw_dim());
        for ((mut g, p), t) in grad
            .axis_iter_mut(Axis(0))
            .zip(probs.axis_iter(Axis(0)))
            .zip(dist.axis_iter(Axis(0)))
        {
            // d/dz of -Σ t log softmax(z) = softmax(z) Σt - t
            let mass = t.sum();
            Zip::from(&mut g)
                .and(&p)
                .and(&t)
                .for_each(|g, &p, &t| *g = (p * mass - t) / n);
        }
        grad
    }

    fn predict_nonlinearity(&self, logits: &Array2<f64>) -> Array2<f64> {
        softmax(logits)
    }

    /// Accepts `(n, k)` class probabilities, or an `(n, 1)` column of
    /// integer class indices in `0..k`.
    fn check_target(&self, n_outputs: usize, target: &Array2<f64>) -> Result<()> {
        if target.ncols() == n_outputs {
            return Ok(());
        }
        if target.ncols() != 1 {
            return Err(FairError::shape(
                format!("1 or {} target columns", n_outputs),
                format!("{} target columns", target.ncols()),
            ));
        }
        match target
            .iter()
            .find(|&&c| c < 0.0 || c.fract() != 0.0 || c >= n_outputs as f64)
        {
            Some(bad) => Err(FairError::shape(
                format!("class indices in 0..{} for {} network outputs", n_outputs, n_outputs),
                format!("class index {}", bad),
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_mse_loss() {
        let pred = array![[3.0], [5.0]];
        let target = array![[1.0], [2.0]];

        let loss_val = MSELoss.loss(&pred, &target);
        // ((3-1)^2 + (5-2)^2) / 2 = 6.5
        assert_abs_diff_eq!(loss_val, 6.5, epsilon = 1e-12);

        let grad = MSELoss.grad_wrt_prediction(&pred, &target);
        assert_eq!(grad, array![[2.0], [3.0]]);
    }

    #[test]
    fn test_mae_loss() {
        let pred = array![[3.0], [-1.0]];
        let target = array![[1.0], [2.0]];

        assert_abs_diff_eq!(MAELoss.loss(&pred, &target), 2.5, epsilon = 1e-12);
        assert_eq!(
            MAELoss.grad_wrt_prediction(&pred, &target),
            array![[0.5], [-0.5]]
        );
    }

    #[test]
    fn test_bce_with_logits_loss() {
        let logits = array![[0.0], [2.0], [-2.0]];
        let targets = array![[1.0], [1.0], [0.0]];

        // (log 2 + 2 * log(1 + e^-2)) / 3
        let expected = (2f64.ln() + 2.0 * (1.0 + (-2f64).exp()).ln()) / 3.0;
        assert_abs_diff_eq!(BCEWithLogitsLoss.loss(&logits, &targets), expected, epsilon = 1e-12);

        let grad = BCEWithLogitsLoss.grad_wrt_prediction(&logits, &targets);
        assert_abs_diff_eq!(grad[[0, 0]], (0.5 - 1.0) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bce_numerical_stability() {
        let logits = array![[100.0], [-100.0]];
        let targets = array![[1.0], [0.0]];

        assert!(BCEWithLogitsLoss.loss(&logits, &targets).is_finite());
        let grad = BCEWithLogitsLoss.grad_wrt_prediction(&logits, &targets);
        assert!(grad.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let probs = softmax(&array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]]);
        for row in probs.axis_iter(Axis(0)) {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(probs[[1, 0]], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_index_and_one_hot_agree() {
        let logits = array![[2.0, 0.5, -1.0], [0.1, 0.2, 3.0]];
        let indices = array![[0.0], [2.0]];
        let one_hot = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];

        let ce = CrossEntropyLoss;
        assert_abs_diff_eq!(
            ce.loss(&logits, &indices),
            ce.loss(&logits, &one_hot),
            epsilon = 1e-12
        );
        assert_eq!(
            ce.grad_wrt_prediction(&logits, &indices),
            ce.grad_wrt_prediction(&logits, &one_hot)
        );
    }

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let logits = Array2::zeros((2, 4));
        let target = array![[1.0], [3.0]];
        assert_abs_diff_eq!(CrossEntropyLoss.loss(&logits, &target), 4f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_gradient_matches_finite_differences() {
        let logits = array![[0.3, -0.2, 0.9]];
        let target = array![[1.0]];
        let grad = CrossEntropyLoss.grad_wrt_prediction(&logits, &target);
        let h = 1e-6;
        for j in 0..3 {
            let mut lp = logits.clone();
            lp[[0, j]] += h;
            let mut lm = logits.clone();
            lm[[0, j]] -= h;
            let numeric =
                (CrossEntropyLoss.loss(&lp, &target) - CrossEntropyLoss.loss(&lm, &target)) / (2.0 * h);
            assert_abs_diff_eq!(grad[[0, j]], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_check_target_widths() {
        assert!(MSELoss.check_target(1, &array![[0.5], [1.5]]).is_ok());
        let err = BCEWithLogitsLoss.check_target(1, &array![[0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, FairError::InvalidShape { .. }));

        let ce = CrossEntropyLoss;
        assert!(ce.check_target(3, &array![[0.0], [2.0]]).is_ok());
        assert!(ce.check_target(3, &array![[0.0, 1.0, 0.0]]).is_ok());
        assert!(ce.check_target(2, &array![[0.0], [2.0]]).is_err());
        assert!(ce.check_target(2, &array![[-1.0]]).is_err());
        assert!(ce.check_target(2, &array![[0.5]]).is_err());
        assert!(ce.check_target(2, &array![[0.0, 0.0, 1.0]]).is_err());
    }

    #[test]
    fn test_cross_entropy_ignores_out_of_range_index() {
        let logits = array![[0.2, -0.1]];
        let loss = CrossEntropyLoss.loss(&logits, &array![[5.0]]);
        assert_abs_diff_eq!(loss, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_predict_nonlinearity_defaults_to_identity() {
        let raw = array![[-1.5, 2.0]];
        assert_eq!(MSELoss.predict_nonlinearity(&raw), raw);
    }
}
