//! Trainable network modules.
//!
//! A [`Network`] is the user-supplied architecture the fair estimator trains.
//! There is no autograd here: every network implements its own backward pass.
//! Given the upstream gradient it returns both the parameter gradients
//! (consumed by optimizers) and the input gradients (consumed by the fairness
//! auditors, which search the input space).

use ndarray::Array2;
use rand_xoshiro::Xoshiro256PlusPlus;

pub mod linear;
pub mod mlp;

pub use linear::{Linear, LinearParams};
pub use mlp::{Mlp, MlpParams};

/// Element-wise arithmetic over a parameter set.
///
/// Optimizers and regularizers are written once against this trait and work
/// for every network whose parameters implement it.
pub trait ParamOps: Clone {
    /// Element-wise sum.
    fn add(&self, other: &Self) -> Self;

    /// Multiplies every parameter by `scalar`.
    fn scale(&self, scalar: f64) -> Self;

    /// Applies `f` element-wise to `self` and `other`.
    ///
    /// # Panics
    /// If the two parameter sets have different shapes.
    fn zip_map<F: Fn(f64, f64) -> f64>(&self, other: &Self, f: F) -> Self;

    /// Applies `f` to every parameter.
    fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self;

    /// Sum of squared parameters (squared L2 norm).
    fn sum_squares(&self) -> f64;

    /// Parameter set of the same shape filled with zeros.
    fn zeros_like(&self) -> Self {
        self.map(|_| 0.0)
    }
}

/// A differentiable module mapping a feature batch `(n, d_in)` to an output
/// batch `(n, d_out)`.
pub trait Network: Clone {
    /// Trainable parameters. Gradients share the same type.
    type Params: ParamOps + serde::Serialize + for<'de> serde::Deserialize<'de>;

    /// Forward pass.
    fn forward(&self, x: &Array2<f64>) -> Array2<f64>;

    /// Backward pass for the forward call on `x`.
    ///
    /// Returns `(∂L/∂θ, ∂L/∂x)` given `grad_output = ∂L/∂f(x)`.
    fn backward(&self, x: &Array2<f64>, grad_output: &Array2<f64>)
        -> (Self::Params, Array2<f64>);

    fn params(&self) -> &Self::Params;

    fn update_params(&mut self, params: &Self::Params);

    /// Draws fresh initial parameters.
    fn reset_parameters(&mut self, rng: &mut Xoshiro256PlusPlus);

    /// Toggles train/eval behaviour. Modules without mode-dependent layers
    /// ignore it.
    fn set_training(&mut self, _training: bool) {}

    /// Number of input features.
    fn n_inputs(&self) -> usize;

    /// Number of output columns.
    fn n_outputs(&self) -> usize;
}

/// Plain matrices are parameter sets too; the auditors optimize input
/// perturbations with the same optimizers used for network weights.
impl ParamOps for Array2<f64> {
    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn scale(&self, scalar: f64) -> Self {
        self * scalar
    }

    fn zip_map<F: Fn(f64, f64) -> f64>(&self, other: &Self, f: F) -> Self {
        let mut out = self.clone();
        out.zip_mut_with(other, |a, &b| *a = f(*a, b));
        out
    }

    fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        self.mapv(f)
    }

    fn sum_squares(&self) -> f64 {
        self.iter().map(|v| v * v).sum()
    }
}
