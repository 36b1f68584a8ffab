//! Weight penalties added to the training loss.

use crate::model::ParamOps;

/// A penalty on network parameters.
///
/// Returns the penalty value (added to the reported training loss) and its
/// gradient w.r.t. the parameters (added to the loss gradient before the
/// optimizer step).
pub trait Regularizer<P: ParamOps> {
    fn regularizer_penalty_grad(&self, params: &P) -> (f64, P);
}

/// L2 weight decay: `penalty = λ ‖θ‖²`, `grad = 2 λ θ`.
#[derive(Clone, Copy, Debug)]
pub struct L2 {
    lambda: f64,
}

impl L2 {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl<P: ParamOps> Regularizer<P> for L2 {
    fn regularizer_penalty_grad(&self, params: &P) -> (f64, P) {
        let penalty = self.lambda * params.sum_squares();
        (penalty, params.scale(2.0 * self.lambda))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoRegularizer;

impl<P: ParamOps> Regularizer<P> for NoRegularizer {
    fn regularizer_penalty_grad(&self, params: &P) -> (f64, P) {
        (0.0, params.zeros_like())
    }
}
