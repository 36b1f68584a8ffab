//! Scoring functions used by `FittedFairNet::score`.

use crate::error::{FairError, Result};
use ndarray::{Array2, Axis};

fn check_lengths(n_true: usize, n_pred: usize) -> Result<()> {
    if n_true != n_pred {
        return Err(FairError::shape(
            format!("{} predictions", n_true),
            format!("{}", n_pred),
        ));
    }
    if n_true == 0 {
        return Err(FairError::EmptyData("cannot score zero samples".to_string()));
    }
    Ok(())
}

/// Fraction of predictions equal to the truth.
pub fn accuracy<T: PartialEq>(y_true: &[T], y_pred: &[T]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Mean squared error over all entries.
pub fn mean_squared_error(y_true: &Array2<f64>, y_pred: &Array2<f64>) -> Result<f64> {
    if y_true.dim() != y_pred.dim() {
        return Err(FairError::shape(
            format!("{:?}", y_true.dim()),
            format!("{:?}", y_pred.dim()),
        ));
    }
    check_lengths(y_true.nrows(), y_pred.nrows())?;
    Ok((y_true - y_pred).mapv(|d| d * d).mean().unwrap_or(0.0))
}

/// Coefficient of determination, averaged uniformly over output columns.
///
/// A column with constant truth scores `1.0` if predicted exactly, else `0.0`.
pub fn r2_score(y_true: &Array2<f64>, y_pred: &Array2<f64>) -> Result<f64> {
    if y_true.dim() != y_pred.dim() {
        return Err(FairError::shape(
            format!("{:?}", y_true.dim()),
            format!("{:?}", y_pred.dim()),
        ));
    }
    check_lengths(y_true.nrows(), y_pred.nrows())?;

    let mut total = 0.0;
    for (t, p) in y_true.axis_iter(Axis(1)).zip(y_pred.axis_iter(Axis(1))) {
        let mean = t.mean().unwrap_or(0.0);
        let ss_res: f64 = t.iter().zip(p.iter()).map(|(a, b)| (a - b).powi(2)).sum();
        let ss_tot: f64 = t.iter().map(|a| (a - mean).powi(2)).sum();
        total += if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };
    }
    Ok(total / y_true.ncols().max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[1, 0, 1, 1], &[1, 1, 1, 0]).unwrap(), 0.5);
        assert!(accuracy::<i32>(&[], &[]).is_err());
        assert!(accuracy(&[1], &[1, 2]).is_err());
    }

    #[test]
    fn test_mean_squared_error() {
        let mse = mean_squared_error(&array![[1.0], [2.0]], &array![[2.0], [4.0]]).unwrap();
        assert_abs_diff_eq!(mse, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_r2_perfect_and_mean_prediction() {
        let y = array![[1.0], [2.0], [3.0]];
        assert_abs_diff_eq!(r2_score(&y, &y).unwrap(), 1.0, epsilon = 1e-12);
        let mean = array![[2.0], [2.0], [2.0]];
        assert_abs_diff_eq!(r2_score(&y, &mean).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_r2_constant_truth() {
        let y = array![[1.0], [1.0]];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![[0.0], [1.0]]).unwrap(), 0.0);
    }
}
