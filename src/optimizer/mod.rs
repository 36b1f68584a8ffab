use crate::model::ParamOps;
use serde::{Deserialize, Serialize};

/// Trait for gradient-based optimizers.
///
/// Optimizers update a parameter set from its gradient. Training logic
/// (the estimator's fit loop) is decoupled from the update rule, so any
/// network can be paired with any optimizer.
///
/// # Type Parameters
/// * `P`: parameter type (e.g. [`LinearParams`](crate::model::LinearParams))
///
/// # Example
/// ```rust
/// use fairlearne_rs::model::{LinearParams, ParamOps};
/// use fairlearne_rs::optimizer::{Optimizer, SGD};
///
/// let params = LinearParams::zeros(3, 1);
/// let grads = params.map(|_| 1.0);
/// let mut sgd = SGD::new(0.01);
/// let updated = sgd.step(&params, &grads);
/// assert!((updated.weights[[0, 0]] + 0.01).abs() < 1e-12);
/// ```
pub trait Optimizer<P> {
    /// Performs one optimization step and returns the updated parameters.
    ///
    /// Stateful optimizers (momentum, Adam) advance their internal moments.
    fn step(&mut self, params: &P, gradients: &P) -> P;

    /// Current learning rate.
    fn learning_rate(&self) -> f64;
}

/// Stochastic Gradient Descent with optional momentum.
///
/// ```text
/// v ← μ v + ∇L(θ)
/// θ ← θ - η v
/// ```
/// With `μ = 0` this is plain `θ ← θ - η ∇L(θ)`.
#[derive(Clone, Debug)]
pub struct SGD<P> {
    lr: f64,
    momentum: f64,
    velocity: Option<P>,
}

impl<P> SGD<P> {
    /// Creates a plain SGD optimizer with the specified learning rate.
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            momentum: 0.0,
            velocity: None,
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }
}

impl<P: ParamOps> Optimizer<P> for SGD<P> {
    fn step(&mut self, params: &P, grads: &P) -> P {
        let direction = if self.momentum > 0.0 {
            let v = match &self.velocity {
                Some(v) => v.scale(self.momentum).add(grads),
                None => grads.clone(),
            };
            self.velocity = Some(v.clone());
            v
        } else {
            grads.clone()
        };
        // Using (-lr) enables a single scaling instead of scale + subtract
        params.add(&direction.scale(-self.lr))
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

/// Adam optimizer (Kingma & Ba) with bias-corrected moments.
#[derive(Clone, Debug)]
pub struct Adam<P> {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: i32,
    m: Option<P>,
    v: Option<P>,
}

impl<P> Adam<P> {
    /// Adam with the usual defaults `β1 = 0.9`, `β2 = 0.999`, `ε = 1e-8`.
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: None,
            v: None,
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }
}

impl<P: ParamOps> Optimizer<P> for Adam<P> {
    fn step(&mut self, params: &P, grads: &P) -> P {
        let (b1, b2) = (self.beta1, self.beta2);
        let m_prev = self.m.take().unwrap_or_else(|| grads.zeros_like());
        let v_prev = self.v.take().unwrap_or_else(|| grads.zeros_like());

        let m = m_prev.zip_map(grads, |m, g| b1 * m + (1.0 - b1) * g);
        let v = v_prev.zip_map(grads, |v, g| b2 * v + (1.0 - b2) * g * g);
        self.t += 1;

        let bias1 = 1.0 - b1.powi(self.t);
        let bias2 = 1.0 - b2.powi(self.t);
        let (lr, eps) = (self.lr, self.eps);
        let update = m.zip_map(&v, |m, v| lr * (m / bias1) / ((v / bias2).sqrt() + eps));

        self.m = Some(m);
        self.v = Some(v);
        params.add(&update.scale(-1.0))
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }
}

/// Serializable optimizer selection used by the estimator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd { lr: f64, momentum: f64 },
    Adam { lr: f64 },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Sgd {
            lr: 0.01,
            momentum: 0.0,
        }
    }
}

impl OptimizerKind {
    pub fn learning_rate(&self) -> f64 {
        match self {
            OptimizerKind::Sgd { lr, .. } | OptimizerKind::Adam { lr } => *lr,
        }
    }

    /// Returns the same optimizer kind with a different learning rate.
    pub fn with_learning_rate(&self, lr: f64) -> Self {
        match self {
            OptimizerKind::Sgd { momentum, .. } => OptimizerKind::Sgd {
                lr,
                momentum: *momentum,
            },
            OptimizerKind::Adam { .. } => OptimizerKind::Adam { lr },
        }
    }

    /// Instantiates a fresh optimizer for parameters of type `P`.
    pub fn build<P: ParamOps + 'static>(&self) -> Box<dyn Optimizer<P>> {
        match *self {
            OptimizerKind::Sgd { lr, momentum } => Box::new(SGD::new(lr).with_momentum(momentum)),
            OptimizerKind::Adam { lr } => Box::new(Adam::new(lr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearParams;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn params(w: f64, b: f64) -> LinearParams {
        LinearParams {
            weights: array![[w]],
            bias: array![b],
        }
    }

    #[test]
    fn test_sgd_new_initialization() {
        let sgd = SGD::<LinearParams>::new(0.01);
        assert_eq!(sgd.learning_rate(), 0.01);
    }

    #[test]
    fn test_sgd_step_correctness() {
        // params_new = params_old - lr * grads
        let mut sgd = SGD::new(0.1);
        let updated = sgd.step(&params(2.0, 1.0), &params(1.0, 0.5));

        assert_abs_diff_eq!(updated.weights[[0, 0]], 1.9, epsilon = 1e-12);
        assert_abs_diff_eq!(updated.bias[0], 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_sgd_zero_gradient_no_change() {
        let mut sgd = SGD::new(0.5);
        let p = params(3.0, -1.0);
        assert_eq!(sgd.step(&p, &p.zeros_like()), p);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let mut sgd = SGD::new(1.0).with_momentum(0.5);
        let g = params(1.0, 0.0);
        let p1 = sgd.step(&params(0.0, 0.0), &g);
        assert_abs_diff_eq!(p1.weights[[0, 0]], -1.0, epsilon = 1e-12);
        // v = 0.5 * 1 + 1 = 1.5
        let p2 = sgd.step(&p1, &g);
        assert_abs_diff_eq!(p2.weights[[0, 0]], -2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_adam_first_step_moves_by_lr() {
        // With bias correction the first step is lr * sign(g)
        let mut adam = Adam::new(0.1);
        let updated = adam.step(&params(1.0, 1.0), &params(4.0, -0.25));
        assert_abs_diff_eq!(updated.weights[[0, 0]], 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(updated.bias[0], 1.1, epsilon = 1e-6);
    }

    #[test]
    fn test_adam_minimizes_quadratic() {
        // f(w) = (w - 3)^2
        let mut adam = Adam::new(0.1);
        let mut p = params(0.0, 0.0);
        for _ in 0..500 {
            let g = params(2.0 * (p.weights[[0, 0]] - 3.0), 0.0);
            p = adam.step(&p, &g);
        }
        assert_abs_diff_eq!(p.weights[[0, 0]], 3.0, epsilon = 1e-2);
    }

    #[test]
    fn test_optimizer_kind_serde_and_build() {
        let kind: OptimizerKind = serde_json::from_str(r#"{"kind":"adam","lr":0.05}"#).unwrap();
        assert_eq!(kind, OptimizerKind::Adam { lr: 0.05 });
        assert_eq!(kind.with_learning_rate(0.2).learning_rate(), 0.2);

        let mut opt = OptimizerKind::default().build::<LinearParams>();
        assert_eq!(opt.learning_rate(), 0.01);
        let updated = opt.step(&params(1.0, 0.0), &params(1.0, 0.0));
        assert_abs_diff_eq!(updated.weights[[0, 0]], 0.99, epsilon = 1e-12);
    }
}
