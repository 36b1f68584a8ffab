//! The fair estimator.
//!
//! [`FairNet`] holds an unfitted configuration: network architecture,
//! criterion, fairness [`Strategy`] and [`TrainingConfig`]. Calling
//! [`FairNet::fit`] resolves the task from the targets, encodes the labels,
//! builds the fairness module and returns a [`FittedFairNet`] that can
//! predict, score and continue training.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fairlearne_rs::distances::{EuclideanDistance, SquaredEuclideanDistance};
//! use fairlearne_rs::loss::BCEWithLogitsLoss;
//! use fairlearne_rs::model::Linear;
//! use fairlearne_rs::trainer::{FairNet, SenSeIParams, Strategy};
//! use ndarray::array;
//!
//! let strategy = Strategy::sensei(
//!     Arc::new(EuclideanDistance),
//!     Arc::new(SquaredEuclideanDistance),
//!     SenSeIParams { rho: 1.0, eps: 0.1, auditor_nsteps: 5, auditor_lr: 0.01 },
//! );
//! let net = FairNet::new(Linear::new(2, 1), BCEWithLogitsLoss, strategy)
//!     .max_epochs(5)
//!     .random_state(0);
//!
//! let x = array![[0.0, 1.0], [1.0, 0.0], [0.9, 0.1], [0.1, 0.8]];
//! let fitted = net.fit(x.clone(), vec!["no", "yes", "yes", "no"]).unwrap();
//! assert_eq!(fitted.predict(x).unwrap().len(), 4);
//! ```

use crate::dataset::{Dataset, Features, TabularDataset, Targets};
use crate::error::{FairError, Result};
use crate::loss::Criterion;
use crate::model::Network;
use crate::optimizer::OptimizerKind;
use crate::preprocessing::FittedLabelBinarizer;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

mod config;
mod fitted;
mod history;
mod split;
mod strategy;
mod task;

pub use self::config::TrainingConfig;
pub use self::fitted::{FittedFairNet, Predictions, StepOutput};
pub use self::history::{EpochRecord, History};
pub use self::split::ValidSplit;
pub use self::strategy::{SenSRConfig, SenSRParams, SenSeIConfig, SenSeIParams, Strategy};
pub use self::task::{EstimatorType, Task, TaskMode};

use self::task::{resolve_targets, ResolvedTargets};

/// Unfitted fair estimator.
///
/// Hyperparameters are set with consuming builder methods. Defaults:
/// - `max_epochs`: 10
/// - `batch_size`: 128
/// - optimizer: SGD with learning rate 0.01
/// - `task`: [`TaskMode::Auto`]
#[derive(Clone)]
pub struct FairNet<N, C> {
    pub(crate) network: N,
    pub(crate) criterion: C,
    pub(crate) strategy: Strategy,
    pub(crate) config: TrainingConfig,
}

impl<N, C> FairNet<N, C>
where
    N: Network + 'static,
    C: Criterion + 'static,
{
    /// Creates an estimator for `network` trained on `criterion` under `strategy`.
    ///
    /// The network's current weights are only a template: `fit` draws fresh
    /// initial parameters.
    pub fn new(network: N, criterion: C, strategy: Strategy) -> Self {
        Self {
            network,
            criterion,
            strategy,
            config: TrainingConfig::default(),
        }
    }

    pub fn max_epochs(mut self, epochs: usize) -> Self {
        self.config.max_epochs = epochs;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.config.optimizer = optimizer;
        self
    }

    /// Sets the learning rate of the configured optimizer.
    pub fn lr(mut self, lr: f64) -> Self {
        self.config.optimizer = self.config.optimizer.with_learning_rate(lr);
        self
    }

    pub fn weight_decay(mut self, weight_decay: f64) -> Self {
        self.config.weight_decay = weight_decay;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Holds out part of the data for a validation loss.
    ///
    /// The validation loss is the plain criterion; it contains no fairness
    /// term and is not a suitable early-stopping signal for fairness.
    pub fn valid_split(mut self, split: Option<ValidSplit>) -> Self {
        self.config.valid_split = split;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    pub fn warm_start(mut self, warm_start: bool) -> Self {
        self.config.warm_start = warm_start;
        self
    }

    /// Sets verbosity for training output.
    ///
    /// When `true`, every epoch's losses are logged at info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn task(mut self, task: TaskMode) -> Self {
        self.config.task = task;
        self
    }

    /// Replaces every training setting at once, e.g. from a JSON file.
    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn criterion(&self) -> &C {
        &self.criterion
    }

    /// Kind of estimator, if known before fitting.
    ///
    /// # Errors
    /// [`FairError::NotFitted`] when the task mode is `Auto`.
    pub fn estimator_type(&self) -> Result<EstimatorType> {
        self.config
            .task
            .explicit()
            .map(|task| task.estimator_type())
            .ok_or_else(|| {
                FairError::NotFitted(
                    "task mode is auto. Call fit with targets or set the task explicitly"
                        .to_string(),
                )
            })
    }

    /// Initializes and trains a new fitted estimator.
    ///
    /// Classification targets are recorded as `classes`; unless they already
    /// are the integers `0..C` they are binarized into floats. Continuous
    /// targets switch an `Auto` task to regression.
    ///
    /// # Errors
    /// - [`FairError::Configuration`] for targets incompatible with the task
    /// - shape and data errors from the dataset adapter
    pub fn fit(&self, x: impl Into<Features>, y: impl Into<Targets>) -> Result<FittedFairNet<N, C>> {
        let targets = y.into();
        let mut resolved = resolve_targets(self.config.task, Some(&targets))?;
        let dataset = TabularDataset::from_arrays(x.into(), resolved.y.take())?;
        self.fit_resolved(&dataset, resolved)
    }

    /// Trains on a prepared dataset whose targets are used as-is.
    ///
    /// With task mode `Auto` this assumes classification and logs a warning.
    pub fn fit_dataset(&self, dataset: &TabularDataset) -> Result<FittedFairNet<N, C>> {
        let resolved = resolve_targets(self.config.task, None)?;
        self.fit_resolved(dataset, resolved)
    }

    /// Builds a fitted estimator from parameters saved with
    /// [`FittedFairNet::save_params`], without training.
    pub fn load_fitted(&self, path: impl AsRef<std::path::Path>) -> Result<FittedFairNet<N, C>> {
        let mut fitted = self.initialize(None, None, Task::Classification)?;
        fitted.load_params(path)?;
        Ok(fitted)
    }

    fn fit_resolved(
        &self,
        dataset: &TabularDataset,
        resolved: ResolvedTargets,
    ) -> Result<FittedFairNet<N, C>> {
        let mut fitted = self.initialize(
            Some(dataset.n_features()),
            resolved.binarizer,
            resolved.task,
        )?;
        fitted.fit_loop(dataset)?;
        Ok(fitted)
    }

    /// Fresh network weights, fairness module and optimizer.
    fn initialize(
        &self,
        n_features: Option<usize>,
        binarizer: Option<FittedLabelBinarizer>,
        task: Task,
    ) -> Result<FittedFairNet<N, C>> {
        self.config.validate()?;
        if let Some(n) = n_features {
            if n != self.network.n_inputs() {
                return Err(FairError::shape(
                    format!("{} input features", self.network.n_inputs()),
                    format!("{}", n),
                ));
            }
        }
        let seed = self.config.random_state.unwrap_or_else(rand::random);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut network = self.network.clone();
        network.reset_parameters(&mut rng);
        let module = self
            .strategy
            .initialize_module(network, self.criterion.clone(), rng.gen())?;
        Ok(FittedFairNet::new(self.clone(), module, task, binarizer, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distances::{EuclideanDistance, SquaredEuclideanDistance};
    use crate::loss::MSELoss;
    use crate::model::Linear;
    use ndarray::array;
    use std::sync::Arc;

    fn estimator() -> FairNet<Linear, MSELoss> {
        let strategy = Strategy::sensei(
            Arc::new(EuclideanDistance),
            Arc::new(SquaredEuclideanDistance),
            SenSeIParams {
                rho: 0.5,
                eps: 0.1,
                auditor_nsteps: 2,
                auditor_lr: 0.01,
            },
        );
        FairNet::new(Linear::new(2, 1), MSELoss, strategy)
    }

    // === Builder Tests ===

    #[test]
    fn test_builder_default_values() {
        let net = estimator();
        assert_eq!(net.config().max_epochs, 10);
        assert_eq!(net.config().batch_size, 128);
        assert_eq!(net.config().optimizer.learning_rate(), 0.01);
        assert!(net.config().valid_split.is_none());
        assert_eq!(net.config().task, TaskMode::Auto);
    }

    #[test]
    fn test_builder_setters() {
        let net = estimator()
            .max_epochs(3)
            .batch_size(16)
            .lr(0.5)
            .weight_decay(0.01)
            .shuffle(true)
            .random_state(4)
            .warm_start(true)
            .verbose(true)
            .task(TaskMode::Regression);
        let c = net.config();
        assert_eq!((c.max_epochs, c.batch_size), (3, 16));
        assert_eq!(c.optimizer.learning_rate(), 0.5);
        assert_eq!(c.random_state, Some(4));
        assert!(c.shuffle && c.warm_start && c.verbose);
    }

    // === estimator_type Tests ===

    #[test]
    fn test_estimator_type_auto_is_not_fitted() {
        let err = estimator().estimator_type().unwrap_err();
        assert!(matches!(err, FairError::NotFitted(_)));
    }

    #[test]
    fn test_estimator_type_explicit() {
        assert_eq!(
            estimator().task(TaskMode::Regression).estimator_type().unwrap(),
            EstimatorType::Regressor
        );
        assert_eq!(
            estimator().task(TaskMode::Classification).estimator_type().unwrap(),
            EstimatorType::Classifier
        );
    }

    // === fit Tests ===

    #[test]
    fn test_fit_rejects_feature_mismatch() {
        let err = estimator()
            .fit(array![[1.0, 2.0, 3.0]], vec![0.5])
            .err()
            .unwrap();
        assert!(matches!(err, FairError::InvalidShape { .. }));
    }

    #[test]
    fn test_fit_rejects_invalid_config() {
        let err = estimator()
            .batch_size(0)
            .fit(array![[1.0, 2.0]], vec![0.5])
            .err()
            .unwrap();
        assert!(matches!(err, FairError::InvalidParameter(_)));
    }

    #[test]
    fn test_fit_dataset_without_targets_fails() {
        let dataset = TabularDataset::from_arrays(array![[1.0, 2.0]].into(), None).unwrap();
        let err = estimator().fit_dataset(&dataset).err().unwrap();
        assert!(matches!(err, FairError::MissingTargets(_)));
    }

    #[test]
    fn test_fit_dataset_auto_assumes_classification() {
        let dataset = TabularDataset::from_arrays(
            array![[1.0, 2.0], [0.0, 1.0]].into(),
            Some(array![[1.0], [0.0]]),
        )
        .unwrap();
        let fitted = estimator().max_epochs(1).random_state(0).fit_dataset(&dataset).unwrap();
        assert_eq!(fitted.task(), Task::Classification);
        assert!(fitted.classes().is_none());
    }

    #[test]
    fn test_fit_is_reproducible_with_seed() {
        let x = array![[1.0, 2.0], [0.0, 1.0], [2.0, 0.5]];
        let y = vec![0.5, 1.5, -0.3];
        let a = estimator().random_state(3).fit(x.clone(), y.clone()).unwrap();
        let b = estimator().random_state(3).fit(x, y).unwrap();
        assert_eq!(a.network().params(), b.network().params());
        assert_eq!(a.history(), b.history());
    }
}
