use super::{Distance, MahalanobisDistance};
use crate::error::{FairError, Result};
use crate::loss::{BCEWithLogitsLoss, Criterion};
use crate::model::{Linear, Network, ParamOps};
use crate::optimizer::{Adam, Optimizer};
use crate::regularizers::{Regularizer, L2};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Settings for learning a sensitive subspace from protected attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubspaceFitConfig {
    /// Full-batch optimization steps per protected attribute.
    pub max_iter: usize,
    pub lr: f64,
    /// L2 penalty on the logistic-regression weights.
    pub l2: f64,
    /// Add the unit vector of each protected column to the basis.
    pub keep_protected_idxs: bool,
}

impl Default for SubspaceFitConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            lr: 0.05,
            l2: 1e-3,
            keep_protected_idxs: true,
        }
    }
}

/// Mahalanobis distance that ignores movement inside a sensitive subspace.
///
/// Given basis vectors spanning the sensitive directions, `Σ = I - P` where
/// `P` projects onto their span. Perturbations along sensitive directions cost
/// nothing, everything orthogonal costs its squared length.
#[derive(Clone, Debug)]
pub struct SensitiveSubspaceDistance {
    basis: Array2<f64>,
    inner: MahalanobisDistance,
}

impl SensitiveSubspaceDistance {
    /// Builds the metric from sensitive directions given as rows of `basis`.
    pub fn from_basis(basis: &Array2<f64>) -> Result<Self> {
        let (_, dim) = basis.dim();
        if dim == 0 {
            return Err(FairError::EmptyData("basis has no columns".to_string()));
        }
        let ortho = orthonormalize(basis);
        let projection = ortho.t().dot(&ortho);
        let sigma = Array2::eye(dim) - projection;
        Ok(Self {
            basis: ortho,
            inner: MahalanobisDistance::new(sigma)?,
        })
    }

    /// Learns the sensitive directions from data.
    ///
    /// For every protected column a logistic regression predicts that
    /// (binary) attribute from the remaining columns; its coefficient vector
    /// is a direction along which the attribute can be inferred and becomes
    /// part of the basis.
    pub fn fit_logistic(
        x: &Array2<f64>,
        protected: &[usize],
        config: &SubspaceFitConfig,
    ) -> Result<Self> {
        let (n, dim) = x.dim();
        if n == 0 {
            return Err(FairError::EmptyData("cannot fit subspace on empty data".to_string()));
        }
        if protected.is_empty() {
            return Err(FairError::InvalidParameter("no protected attributes given".to_string()));
        }
        if let Some(&bad) = protected.iter().find(|&&p| p >= dim) {
            return Err(FairError::InvalidParameter(format!(
                "protected index {} out of range for {} features",
                bad, dim
            )));
        }

        let keep: Vec<usize> = (0..dim).filter(|j| !protected.contains(j)).collect();
        let features = x.select(Axis(1), &keep);
        let mut rows: Vec<Array1<f64>> = Vec::new();

        for &p in protected {
            let target = x.slice(s![.., p..p + 1]).to_owned();
            if target.iter().any(|&v| v != 0.0 && v != 1.0) {
                return Err(FairError::InvalidTarget(format!(
                    "protected column {} must be binary 0/1",
                    p
                )));
            }
            let coef = fit_logistic_regression(&features, &target, config);
            let mut direction = Array1::zeros(dim);
            for (k, &j) in keep.iter().enumerate() {
                direction[j] = coef[k];
            }
            rows.push(direction);
            if config.keep_protected_idxs {
                let mut unit = Array1::zeros(dim);
                unit[p] = 1.0;
                rows.push(unit);
            }
        }

        let mut basis = Array2::zeros((rows.len(), dim));
        for (i, r) in rows.iter().enumerate() {
            basis.row_mut(i).assign(r);
        }
        Self::from_basis(&basis)
    }

    /// Orthonormal basis of the sensitive subspace, one direction per row.
    pub fn basis(&self) -> &Array2<f64> {
        &self.basis
    }

    pub fn sigma(&self) -> &Array2<f64> {
        self.inner.sigma()
    }
}

impl Distance for SensitiveSubspaceDistance {
    fn distance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array1<f64> {
        self.inner.distance(a, b)
    }

    fn grad(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        self.inner.grad(a, b)
    }
}

/// Gram-Schmidt over the rows; near-dependent rows are dropped.
fn orthonormalize(vectors: &Array2<f64>) -> Array2<f64> {
    let mut kept: Vec<Array1<f64>> = Vec::new();
    for row in vectors.axis_iter(Axis(0)) {
        let mut v = row.to_owned();
        for q in &kept {
            let proj = v.dot(q);
            v.scaled_add(-proj, q);
        }
        let norm = v.dot(&v).sqrt();
        if norm > 1e-10 {
            kept.push(v / norm);
        }
    }
    let mut out = Array2::zeros((kept.len(), vectors.ncols()));
    for (i, q) in kept.iter().enumerate() {
        out.row_mut(i).assign(q);
    }
    out
}

fn fit_logistic_regression(
    x: &Array2<f64>,
    y: &Array2<f64>,
    config: &SubspaceFitConfig,
) -> Array1<f64> {
    let mut model = Linear::new(x.ncols(), 1);
    let mut optimizer = Adam::new(config.lr);
    let penalty = L2::new(config.l2);
    for _ in 0..config.max_iter {
        let logits = model.forward(x);
        let grad_out = BCEWithLogitsLoss.grad_wrt_prediction(&logits, y);
        let (grads, _) = model.backward(x, &grad_out);
        let (_, reg_grad) = penalty.regularizer_penalty_grad(model.params());
        let updated = optimizer.step(model.params(), &grads.add(&reg_grad));
        model.update_params(&updated);
    }
    model.params().weights.column(0).to_owned()
}
