use super::auditor::{mean, SenSRAuditor};
use super::{require_targets, FairAlgorithm, FairLoss, FairResponse};
use crate::error::Result;
use crate::loss::Criterion;
use crate::model::Network;
use crate::trainer::{SenSRConfig, Strategy};
use ndarray::Array2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Sensitive Subspace Robustness (Yurochkin, Bower & Sun, ICLR 2020).
///
/// Trains on worst-case inputs from [`SenSRAuditor`]: the loss is the base
/// criterion on `f(x_worst)`. λ is a dual variable moved by `lr_lamb` toward
/// keeping the mean transport cost at `eps`.
pub struct SenSR<N, C> {
    network: N,
    criterion: C,
    config: SenSRConfig,
    auditor: SenSRAuditor,
    lambda: f64,
    training: bool,
    rng: Xoshiro256PlusPlus,
}

impl<N: Network, C: Criterion> SenSR<N, C> {
    pub fn new(network: N, criterion: C, config: SenSRConfig, seed: u64) -> Self {
        let auditor = SenSRAuditor::new(
            config.distance_x.clone(),
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
        let params = &self.config.params;
        self.lambda = (self.lambda - params.lr_lamb * (params.eps - mean_dist)).max(0.0);
        tracing::debug!(lambda = self.lambda, mean_dist, "SenSR lambda update");
    }
}

impl<N: Network, C: Criterion> FairAlgorithm<N, C> for SenSR<N, C> {
    fn forward(&mut self, x: &Array2<f64>, y: Option<&Array2<f64>>) -> Result<FairResponse> {
        let y_pred = self.network.forward(x);
        if !self.training {
            return Ok(FairResponse { loss: None, y_pred });
        }
        let y = require_targets(y, x.nrows())?;

        let x_worst = self.auditor.generate_worst_case_examples(
            &self.network,
            &self.criterion,
            x,
            y,
            self.lambda,
            &mut self.rng,
        );
        let mean_dist = mean(&self.config.distance_x.distance(x, &x_worst));
        self.update_lambda(mean_dist);

        let y_worst = self.network.forward(&x_worst);
        let loss = FairLoss::from_criterion(&self.criterion, &x_worst, &y_worst, y);
        Ok(FairResponse {
            loss: Some(loss),
            y_pred,
        })
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

    fn primal_lr(&self) -> Option<f64> {
        Some(self.config.params.lr_param)
    }

    fn matches(&self, strategy: &Strategy) -> bool {
        matches!(strategy, Strategy::SubspaceRobustness(c) if *c == self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distances::SquaredEuclideanDistance;
    use crate::loss::MSELoss;
    use crate::model::{Linear, LinearParams};
    use crate::trainer::SenSRParams;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::sync::Arc;

    fn config(nsteps: usize) -> SenSRConfig {
        SenSRConfig {
            distance_x: Arc::new(SquaredEuclideanDistance),
            params: SenSRParams {
                eps: 0.1,
                lr_lamb: 0.5,
                lr_param: 0.02,
                auditor_nsteps: nsteps,
                auditor_lr: 0.01,
            },
        }
    }

    fn net() -> Linear {
        Linear::from_params(LinearParams {
            weights: array![[1.0], [1.0]],
            bias: array![0.0],
        })
    }

    #[test]
    fn test_eval_forward_has_no_loss() {
        let mut module = SenSR::new(net(), MSELoss, config(2), 0);
        module.set_training(false);
        assert!(!module.is_training());
        let response = module.forward(&array![[1.0, 1.0]], None).unwrap();
        assert!(response.loss.is_none());
        assert_eq!(response.y_pred, array![[2.0]]);
    }

    #[test]
    fn test_loss_is_criterion_on_worst_case() {
        let mut module = SenSR::new(net(), MSELoss, config(3), 5);
        let x = array![[1.0, 0.0], [0.0, 2.0]];
        let y = array![[1.0], [2.0]];
        let response = module.forward(&x, Some(&y)).unwrap();
        // y_pred is on the clean inputs
        assert_eq!(response.y_pred, net().forward(&x));

        let loss = response.loss.unwrap();
        let x_worst = loss.tape[0].0.clone();
        assert_ne!(x_worst, x);
        assert_abs_diff_eq!(
            loss.value,
            MSELoss.loss(&net().forward(&x_worst), &y),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_lambda_update_rule() {
        let mut module = SenSR::new(net(), MSELoss, config(0), 0);
        // λ = 1 - 0.5 * (0.1 - 0.3)
        module.update_lambda(0.3);
        assert_abs_diff_eq!(module.lambda(), 1.1, epsilon = 1e-12);
        // never negative
        module.lambda = 0.01;
        module.update_lambda(0.0);
        assert_eq!(module.lambda(), 0.0);
    }

    #[test]
    fn test_primal_lr_is_lr_param() {
        let module = SenSR::new(net(), MSELoss, config(1), 0);
        assert_eq!(module.primal_lr(), Some(0.02));
    }
}
