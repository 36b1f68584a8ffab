//! Individually fair training modules.
//!
//! A fairness module wraps the user's network and criterion. In training mode
//! its forward pass runs an adversarial auditor that searches for the
//! worst-case comparable individuals and returns a fair loss; in evaluation
//! mode it is a plain forward pass of the network.

use crate::error::{FairError, Result};
use crate::loss::Criterion;
use crate::model::{Network, ParamOps};
use crate::trainer::Strategy;
use ndarray::Array2;

mod auditor;
mod sensei;
mod sensr;

pub use auditor::{SenSRAuditor, SenSeIAuditor};
pub use sensei::SenSeI;
pub use sensr::SenSR;

/// Loss of one training batch together with what is needed to backpropagate it.
///
/// The loss may depend on several network evaluations (original and
/// worst-case inputs). Each evaluation leaves one tape entry: the input the
/// network saw and `∂L/∂output` for that call.
#[derive(Clone, Debug)]
pub struct FairLoss {
    pub value: f64,
    tape: Vec<(Array2<f64>, Array2<f64>)>,
}

impl FairLoss {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            tape: Vec::new(),
        }
    }

    /// Base criterion loss of a single forward call on `x`.
    pub fn from_criterion<C: Criterion>(
        criterion: &C,
        x: &Array2<f64>,
        y_pred: &Array2<f64>,
        y: &Array2<f64>,
    ) -> Self {
        let mut loss = Self::new(criterion.loss(y_pred, y));
        loss.record(x.clone(), criterion.grad_wrt_prediction(y_pred, y));
        loss
    }

    /// Adds a network call on `input` whose output receives `grad_output`.
    pub fn record(&mut self, input: Array2<f64>, grad_output: Array2<f64>) {
        self.tape.push((input, grad_output));
    }

    /// Parameter gradients of the loss, summed over all recorded calls.
    pub fn backward<N: Network>(&self, network: &N) -> Option<N::Params> {
        self.tape
            .iter()
            .map(|(x, g)| network.backward(x, g).0)
            .reduce(|acc, g| acc.add(&g))
    }
}

/// Output of a fairness module's forward pass.
#[derive(Clone, Debug)]
pub struct FairResponse {
    /// Fair training loss; `None` in evaluation mode.
    pub loss: Option<FairLoss>,
    /// Network predictions on the unperturbed inputs.
    pub y_pred: Array2<f64>,
}

/// A fairness algorithm wrapped around a network and a criterion.
pub trait FairAlgorithm<N: Network, C: Criterion> {
    /// Forward pass.
    ///
    /// In training mode `y` is required and the response carries the fair
    /// loss. In evaluation mode only predictions are produced.
    fn forward(&mut self, x: &Array2<f64>, y: Option<&Array2<f64>>) -> Result<FairResponse>;

    /// Evaluation-mode forward pass that leaves the module untouched.
    fn infer(&self, x: &Array2<f64>) -> Array2<f64> {
        self.network().forward(x)
    }

    fn set_training(&mut self, training: bool);

    fn is_training(&self) -> bool;

    fn network(&self) -> &N;

    fn network_mut(&mut self) -> &mut N;

    fn criterion(&self) -> &C;

    /// Current value of the dual variable λ.
    fn lambda(&self) -> f64;

    /// Learning rate the parameter optimizer must use, if the algorithm fixes one.
    fn primal_lr(&self) -> Option<f64> {
        None
    }

    /// Whether this module was built from exactly `strategy`.
    fn matches(&self, strategy: &Strategy) -> bool;
}

pub(crate) fn require_targets(y: Option<&Array2<f64>>, n_rows: usize) -> Result<&Array2<f64>> {
    let y = y.ok_or_else(|| {
        FairError::MissingTargets("fair training forward needs targets".to_string())
    })?;
    if y.nrows() != n_rows {
        return Err(FairError::shape(
            format!("{} target rows", n_rows),
            format!("{}", y.nrows()),
        ));
    }
    Ok(y)
}
