use super::auditor::{mean, SenSeIAuditor};
use super::{require_targets, FairAlgorithm, FairLoss, FairResponse};
use crate::error::Result;
use crate::loss::Criterion;
use crate::model::Network;
use crate::trainer::{SenSeIConfig, Strategy};
use ndarray::Array2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

const MIN_LAMBDA: f64 = 1e-5;

/// Sensitive Set Invariance (Yurochkin & Sun, ICLR 2021).
///
/// Training loss: `L(f(x), y) + ρ · mean d_y(f(x), f(x_worst))`, where
/// `x_worst` comes from [`SenSeIAuditor`] and λ is adapted so that the mean
/// input transport cost tracks `eps`.
pub struct SenSeI<N, C> {
    network: N,
    criterion: C,
    config: SenSeIConfig,
    auditor: SenSeIAuditor,
    lambda: f64,
    training: bool,
    rng: Xoshiro256PlusPlus,
}

impl<N: Network, C: Criterion> SenSeI<N, C> {
    pub fn new(network: N, criterion: C, config: SenSeIConfig, seed: u64) -> Self {
        let auditor = SenSeIAuditor::new(
            config.distance_x.clone(),
            config.distance_y.clone(),
            config.params.auditor_nsteps,
            config.params.auditor_lr,
        );
        Self {
            network,
            criterion,
            config,
            auditor,
            lambda: 1.0,
            training: true,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    fn update_lambda(&mut self, mean_dist: f64) {
        let eps = self.config.params.eps;
        let lr_factor = mean_dist.max(eps) / mean_dist.min(eps);
        self.lambda = (self.lambda + lr_factor * (mean_dist - eps)).max(MIN_LAMBDA);
        tracing::debug!(lambda = self.lambda, mean_dist, "SenSeI lambda update");
    }

    fn train_forward(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> FairResponse {
        let y_pred = self.network.forward(x);
        let x_worst = self.auditor.generate_worst_case_examples(
            &self.network,
            x,
            self.lambda,
            &mut self.rng,
        );
        let mean_dist = mean(&self.config.distance_x.distance(x, &x_worst));
        self.update_lambda(mean_dist);

        let y_worst = self.network.forward(&x_worst);
        let n = x.nrows().max(1) as f64;
        let rho = self.config.params.rho;
        let distance_y = &self.config.distance_y;
        let fair_term = mean(&distance_y.distance(&y_pred, &y_worst));
        let fair_grad = distance_y.grad(&y_pred, &y_worst) * (rho / n);

        let mut loss = FairLoss::new(self.criterion.loss(&y_pred, y) + rho * fair_term);
        loss.record(
            x.clone(),
            self.criterion.grad_wrt_prediction(&y_pred, y) + &fair_grad,
        );
        loss.record(x_worst, -fair_grad);

        FairResponse {
            loss: Some(loss),
            y_pred,
        }
    }
}

impl<N: Network, C: Criterion> FairAlgorithm<N, C> for SenSeI<N, C> {
    fn forward(&mut self, x: &Array2<f64>, y: Option<&Array2<f64>>) -> Result<FairResponse> {
        if !self.training {
            return Ok(FairResponse {
                loss: None,
                y_pred: self.network.forward(x),
            });
        }
        let y = require_targets(y, x.nrows())?;
        Ok(self.train_forward(x, y))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.network.set_training(training);
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn network(&self) -> &N {
        &self.network
    }

    fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    fn criterion(&self) -> &C {
        &self.criterion
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn matches(&self, strategy: &Strategy) -> bool {
        matches!(strategy, Strategy::SetInvariance(c) if *c == self.config)
    }
}
