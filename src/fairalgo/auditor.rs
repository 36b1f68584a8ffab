//! Adversarial auditors.
//!
//! An auditor looks for perturbed inputs `x + δ` that are close to `x` under
//! the input metric yet treated very differently by the network. Both
//! auditors start from `δ ~ U(-0.1, 0.1)` and run Adam on δ; the network's
//! parameters are never touched.

use crate::distances::Distance;
use crate::loss::Criterion;
use crate::model::Network;
use crate::optimizer::{Adam, Optimizer};
use ndarray::Array2;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

const INIT_RANGE: f64 = 0.1;

fn initial_perturbation(shape: (usize, usize), rng: &mut Xoshiro256PlusPlus) -> Array2<f64> {
    Array2::from_shape_fn(shape, |_| rng.gen_range(-INIT_RANGE..INIT_RANGE))
}

/// Auditor for Sensitive Set Invariance.
///
/// Maximizes the output transport cost minus λ times the input transport
/// cost: `Σ d_y(f(x), f(x+δ)) - λ Σ d_x(x, x+δ)`.
#[derive(Clone, Debug)]
pub struct SenSeIAuditor {
    distance_x: Arc<dyn Distance>,
    distance_y: Arc<dyn Distance>,
    num_steps: usize,
    lr: f64,
}

impl SenSeIAuditor {
    pub fn new(
        distance_x: Arc<dyn Distance>,
        distance_y: Arc<dyn Distance>,
        num_steps: usize,
        lr: f64,
    ) -> Self {
        Self {
            distance_x,
            distance_y,
            num_steps,
            lr,
        }
    }

    /// Value of the objective being maximized at `x_adv`.
    pub fn objective<N: Network>(
        &self,
        network: &N,
        x: &Array2<f64>,
        x_adv: &Array2<f64>,
        lambda: f64,
    ) -> f64 {
        let y = network.forward(x);
        let y_adv = network.forward(x_adv);
        self.distance_y.distance(&y, &y_adv).sum()
            - lambda * self.distance_x.distance(x, x_adv).sum()
    }

    /// Searches worst-case inputs for the batch `x`.
    pub fn generate_worst_case_examples<N: Network>(
        &self,
        network: &N,
        x: &Array2<f64>,
        lambda: f64,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Array2<f64> {
        let y = network.forward(x);
        let mut delta = initial_perturbation(x.dim(), rng);
        let mut optimizer = Adam::new(self.lr);

        for _ in 0..self.num_steps {
            let x_adv = x + &delta;
            let y_adv = network.forward(&x_adv);
            // d_y(y, y_adv) depends on y_adv through its second argument
            let grad_y_adv = -self.distance_y.grad(&y, &y_adv);
            let (_, output_term) = network.backward(&x_adv, &grad_y_adv);
            let input_term = -self.distance_x.grad(x, &x_adv);
            // gradient of the negated objective
            let grad = -(output_term - input_term * lambda);
            delta = optimizer.step(&delta, &grad);
        }
        x + &delta
    }
}

/// Auditor for Sensitive Subspace Robustness.
///
/// Maximizes the criterion on perturbed inputs minus λ times the mean input
/// transport cost: `L(f(x+δ), y) - λ mean d_x(x, x+δ)`.
#[derive(Clone, Debug)]
pub struct SenSRAuditor {
    distance_x: Arc<dyn Distance>,
    num_steps: usize,
    lr: f64,
}

impl SenSRAuditor {
    pub fn new(distance_x: Arc<dyn Distance>, num_steps: usize, lr: f64) -> Self {
        Self {
            distance_x,
            num_steps,
            lr,
        }
    }

    /// Value of the objective being maximized at `x_adv`.
    pub fn objective<N: Network, C: Criterion>(
        &self,
        network: &N,
        criterion: &C,
        x: &Array2<f64>,
        y: &Array2<f64>,
        x_adv: &Array2<f64>,
        lambda: f64,
    ) -> f64 {
        let loss = criterion.loss(&network.forward(x_adv), y);
        loss - lambda * mean(&self.distance_x.distance(x, x_adv))
    }

    /// Searches worst-case inputs for the labelled batch `(x, y)`.
    pub fn generate_worst_case_examples<N: Network, C: Criterion>(
        &self,
        network: &N,
        criterion: &C,
        x: &Array2<f64>,
        y: &Array2<f64>,
        lambda: f64,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Array2<f64> {
        let n = x.nrows().max(1) as f64;
        let mut delta = initial_perturbation(x.dim(), rng);
        let mut optimizer = Adam::new(self.lr);

        for _ in 0..self.num_steps {
            let x_adv = x + &delta;
            let y_adv = network.forward(&x_adv);
            let grad_pred = criterion.grad_wrt_prediction(&y_adv, y);
            let (_, loss_term) = network.backward(&x_adv, &grad_pred);
            let input_term = -self.distance_x.grad(x, &x_adv) / n;
            let grad = -(loss_term - input_term * lambda);
            delta = optimizer.step(&delta, &grad);
        }
        x + &delta
    }
}

pub(crate) fn mean(values: &ndarray::Array1<f64>) -> f64 {
    values.mean().unwrap_or(0.0)
}
