//! Dense affine layer: `y = x W + b`.
//!
//! Used on its own as a linear (logistic / softmax / least-squares) model, and
//! as the building block of [`Mlp`](crate::model::Mlp).

use crate::model::{Network, ParamOps};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Trainable parameters of a dense layer.
///
/// `weights` has shape `(n_inputs, n_outputs)`, `bias` has length `n_outputs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl LinearParams {
    pub fn zeros(n_inputs: usize, n_outputs: usize) -> Self {
        Self {
            weights: Array2::zeros((n_inputs, n_outputs)),
            bias: Array1::zeros(n_outputs),
        }
    }

    /// Uniform `U(-1/√fan_in, 1/√fan_in)` initialization for weights and bias.
    pub fn uniform(n_inputs: usize, n_outputs: usize, rng: &mut Xoshiro256PlusPlus) -> Self {
        let bound = 1.0 / (n_inputs.max(1) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((n_inputs, n_outputs), |_| rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_fn(n_outputs, |_| rng.gen_range(-bound..bound));
        Self { weights, bias }
    }
}

impl ParamOps for LinearParams {
    fn add(&self, other: &Self) -> Self {
        Self {
            weights: &self.weights + &other.weights,
            bias: &self.bias + &other.bias,
        }
    }

    fn scale(&self, scalar: f64) -> Self {
        Self {
            weights: &self.weights * scalar,
            bias: &self.bias * scalar,
        }
    }

    fn zip_map<F: Fn(f64, f64) -> f64>(&self, other: &Self, f: F) -> Self {
        let mut weights = self.weights.clone();
        weights.zip_mut_with(&other.weights, |a, &b| *a = f(*a, b));
        let mut bias = self.bias.clone();
        bias.zip_mut_with(&other.bias, |a, &b| *a = f(*a, b));
        Self { weights, bias }
    }

    fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            weights: self.weights.mapv(&f),
            bias: self.bias.mapv(&f),
        }
    }

    fn sum_squares(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum::<f64>() + self.bias.iter().map(|b| b * b).sum::<f64>()
    }
}

/// A single dense layer without activation.
#[derive(Clone, Debug)]
pub struct Linear {
    params: LinearParams,
}

impl Linear {
    /// Creates a zero-initialized layer. Call
    /// [`Network::reset_parameters`] for a random start.
    pub fn new(n_inputs: usize, n_outputs: usize) -> Self {
        Self {
            params: LinearParams::zeros(n_inputs, n_outputs),
        }
    }

    /// Constructs a layer from explicit parameters (e.g. for testing or warm start).
    pub fn from_params(params: LinearParams) -> Self {
        Self { params }
    }
}

impl Network for Linear {
    type Params = LinearParams;

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.params.weights) + &self.params.bias
    }

    fn backward(&self, x: &Array2<f64>, grad_output: &Array2<f64>) -> (LinearParams, Array2<f64>) {
        let grads = LinearParams {
            weights: x.t().dot(grad_output),
            bias: grad_output.sum_axis(Axis(0)),
        };
        let grad_input = grad_output.dot(&self.params.weights.t());
        (grads, grad_input)
    }

    fn params(&self) -> &LinearParams {
        &self.params
    }

    fn update_params(&mut self, params: &LinearParams) {
        self.params = params.clone();
    }

    fn reset_parameters(&mut self, rng: &mut Xoshiro256PlusPlus) {
        self.params = LinearParams::uniform(self.n_inputs(), self.n_outputs(), rng);
    }

    fn n_inputs(&self) -> usize {
        self.params.weights.nrows()
    }

    fn n_outputs(&self) -> usize {
        self.params.weights.ncols()
    }
}
