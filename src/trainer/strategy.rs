//! Fairness strategies selectable on the estimator.
//!
//! A [`Strategy`] carries the hyperparameters of one fairness algorithm and
//! acts as the factory for its training module.

use crate::distances::Distance;
use crate::error::{FairError, Result};
use crate::fairalgo::{FairAlgorithm, SenSR, SenSeI};
use crate::loss::Criterion;
use crate::model::Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Scalar hyperparameters of Sensitive Set Invariance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SenSeIParams {
    /// Weight of the invariance term in the training loss.
    pub rho: f64,
    /// Target transport budget for the auditor.
    pub eps: f64,
    pub auditor_nsteps: usize,
    pub auditor_lr: f64,
}

/// Scalar hyperparameters of Sensitive Subspace Robustness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SenSRParams {
    /// Target transport budget for the auditor.
    pub eps: f64,
    /// Step size of the dual variable λ.
    pub lr_lamb: f64,
    /// Step size of the network parameters.
    pub lr_param: f64,
    pub auditor_nsteps: usize,
    pub auditor_lr: f64,
}

/// Set-invariance configuration: input and output metrics plus scalars.
#[derive(Clone)]
pub struct SenSeIConfig {
    pub distance_x: Arc<dyn Distance>,
    pub distance_y: Arc<dyn Distance>,
    pub params: SenSeIParams,
}

/// Subspace-robustness configuration: input metric plus scalars.
#[derive(Clone)]
pub struct SenSRConfig {
    pub distance_x: Arc<dyn Distance>,
    pub params: SenSRParams,
}

fn same_distance(a: &Arc<dyn Distance>, b: &Arc<dyn Distance>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

// Distances compare by identity: swapping in another metric instance counts
// as a change even if it is numerically equal.
impl PartialEq for SenSeIConfig {
    fn eq(&self, other: &Self) -> bool {
        same_distance(&self.distance_x, &other.distance_x)
            && same_distance(&self.distance_y, &other.distance_y)
            && self.params == other.params
    }
}

impl PartialEq for SenSRConfig {
    fn eq(&self, other: &Self) -> bool {
        same_distance(&self.distance_x, &other.distance_x) && self.params == other.params
    }
}

impl fmt::Debug for SenSeIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenSeIConfig")
            .field("distance_x", &self.distance_x)
            .field("distance_y", &self.distance_y)
            .field("params", &self.params)
            .finish()
    }
}

impl fmt::Debug for SenSRConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenSRConfig")
            .field("distance_x", &self.distance_x)
            .field("params", &self.params)
            .finish()
    }
}

/// Fairness algorithm used during training.
#[derive(Clone, Debug, PartialEq)]
pub enum Strategy {
    /// Sensitive Set Invariance (SenSeI).
    SetInvariance(SenSeIConfig),
    /// Sensitive Subspace Robustness (SenSR).
    SubspaceRobustness(SenSRConfig),
}

impl Strategy {
    pub fn sensei(
        distance_x: Arc<dyn Distance>,
        distance_y: Arc<dyn Distance>,
        params: SenSeIParams,
    ) -> Self {
        Strategy::SetInvariance(SenSeIConfig {
            distance_x,
            distance_y,
            params,
        })
    }

    pub fn sensr(distance_x: Arc<dyn Distance>, params: SenSRParams) -> Self {
        Strategy::SubspaceRobustness(SenSRConfig { distance_x, params })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::SetInvariance(_) => "SenSeI",
            Strategy::SubspaceRobustness(_) => "SenSR",
        }
    }

    /// Checks hyperparameter ranges.
    pub fn validate(&self) -> Result<()> {
        let (eps, auditor_lr) = match self {
            Strategy::SetInvariance(c) => {
                if c.params.rho < 0.0 {
                    return Err(FairError::InvalidParameter(format!(
                        "rho must be non-negative, got {}",
                        c.params.rho
                    )));
                }
                (c.params.eps, c.params.auditor_lr)
            }
            Strategy::SubspaceRobustness(c) => {
                if c.params.lr_param <= 0.0 {
                    return Err(FairError::InvalidParameter(format!(
                        "lr_param must be positive, got {}",
                        c.params.lr_param
                    )));
                }
                (c.params.eps, c.params.auditor_lr)
            }
        };
        if eps <= 0.0 {
            return Err(FairError::InvalidParameter(format!(
                "eps must be positive, got {}",
                eps
            )));
        }
        if auditor_lr <= 0.0 {
            return Err(FairError::InvalidParameter(format!(
                "auditor_lr must be positive, got {}",
                auditor_lr
            )));
        }
        Ok(())
    }

    /// Builds the fairness module around `network` and `criterion`.
    ///
    /// `seed` drives the auditor's random initial perturbations.
    pub fn initialize_module<N, C>(
        &self,
        network: N,
        criterion: C,
        seed: u64,
    ) -> Result<Box<dyn FairAlgorithm<N, C>>>
    where
        N: Network + 'static,
        C: Criterion + 'static,
    {
        self.validate()?;
        tracing::debug!(strategy = self.name(), seed, "initializing fairness module");
        Ok(match self {
            Strategy::SetInvariance(config) => {
                Box::new(SenSeI::new(network, criterion, config.clone(), seed))
            }
            Strategy::SubspaceRobustness(config) => {
                Box::new(SenSR::new(network, criterion, config.clone(), seed))
            }
        })
    }
}
