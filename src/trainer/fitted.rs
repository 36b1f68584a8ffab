use super::history::{EpochRecord, History};
use super::task::{encode_with, resolve_targets, Task};
use super::{EstimatorType, FairNet, Strategy, TrainingConfig};
use crate::dataset::{Batch, Dataset, Features, TabularDataset, Targets};
use crate::error::{FairError, Result};
use crate::fairalgo::{FairAlgorithm, FairLoss, FairResponse};
use crate::loss::Criterion;
use crate::metrics::{accuracy, r2_score};
use crate::model::{Network, ParamOps};
use crate::optimizer::Optimizer;
use crate::preprocessing::{argmax_rows, FittedLabelBinarizer, Label, LabelBinarizerParams};
use crate::regularizers::{NoRegularizer, Regularizer, L2};
use crate::serialization::SerializableParams;
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output of [`FittedFairNet::predict`].
#[derive(Clone, Debug, PartialEq)]
pub enum Predictions {
    /// Classification with a known label vocabulary.
    Labels(Vec<Label>),
    /// Classification trained without labels: arg-max output index.
    Indices(Vec<usize>),
    /// Regression: raw network outputs.
    Values(Array2<f64>),
}

impl Predictions {
    pub fn len(&self) -> usize {
        match self {
            Predictions::Labels(v) => v.len(),
            Predictions::Indices(v) => v.len(),
            Predictions::Values(v) => v.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Option<&[Label]> {
        match self {
            Predictions::Labels(v) => Some(v),
            _ => None,
        }
    }

    pub fn values(&self) -> Option<&Array2<f64>> {
        match self {
            Predictions::Values(v) => Some(v),
            _ => None,
        }
    }
}

/// Loss and predictions of one batch step.
#[derive(Clone, Debug)]
pub struct StepOutput {
    pub loss: f64,
    pub y_pred: Array2<f64>,
}

/// What `save_params` writes: network weights and the fitted label state.
#[derive(Serialize, Deserialize)]
struct FittedState<P> {
    params: P,
    task: Task,
    binarizer: Option<LabelBinarizerParams>,
    history: History,
}

fn build_optimizer<N, C>(
    config: &TrainingConfig,
    module: &dyn FairAlgorithm<N, C>,
) -> Box<dyn Optimizer<N::Params>>
where
    N: Network + 'static,
    C: Criterion + 'static,
{
    let kind = match module.primal_lr() {
        Some(lr) => config.optimizer.with_learning_rate(lr),
        None => config.optimizer.clone(),
    };
    kind.build()
}

fn build_regularizer<P: ParamOps + 'static>(weight_decay: f64) -> Box<dyn Regularizer<P>> {
    if weight_decay > 0.0 {
        Box::new(L2::new(weight_decay))
    } else {
        Box::new(NoRegularizer)
    }
}

/// A trained fair estimator.
///
/// Holds the fairness module (and through it the trained network), the
/// resolved task and, for classification, the label vocabulary.
pub struct FittedFairNet<N: Network, C: Criterion> {
    estimator: FairNet<N, C>,
    module: Box<dyn FairAlgorithm<N, C>>,
    optimizer: Box<dyn Optimizer<N::Params>>,
    regularizer: Box<dyn Regularizer<N::Params>>,
    task: Task,
    binarizer: Option<FittedLabelBinarizer>,
    history: History,
    rng: Xoshiro256PlusPlus,
}

impl<N, C> FittedFairNet<N, C>
where
    N: Network + 'static,
    C: Criterion + 'static,
{
    pub(crate) fn new(
        estimator: FairNet<N, C>,
        module: Box<dyn FairAlgorithm<N, C>>,
        task: Task,
        binarizer: Option<FittedLabelBinarizer>,
        rng: Xoshiro256PlusPlus,
    ) -> Self {
        let optimizer = build_optimizer(&estimator.config, module.as_ref());
        let regularizer = build_regularizer(estimator.config.weight_decay);
        Self {
            estimator,
            module,
            optimizer,
            regularizer,
            task,
            binarizer,
            history: History::new(),
            rng,
        }
    }

    pub fn task(&self) -> Task {
        self.task
    }

    pub fn estimator_type(&self) -> EstimatorType {
        self.task.estimator_type()
    }

    /// Sorted label vocabulary seen in `fit`, for classification with labels.
    pub fn classes(&self) -> Option<&[Label]> {
        self.binarizer.as_ref().map(|b| b.classes())
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn network(&self) -> &N {
        self.module.network()
    }

    pub fn module(&self) -> &dyn FairAlgorithm<N, C> {
        self.module.as_ref()
    }

    /// Current dual variable of the fairness module.
    pub fn lambda(&self) -> f64 {
        self.module.lambda()
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.estimator.config
    }

    pub fn strategy(&self) -> &Strategy {
        &self.estimator.strategy
    }

    /// Replaces the strategy used by the next `refit`.
    ///
    /// With `warm_start` the fairness module is rebuilt only if the new
    /// strategy differs from the one it was built from.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.estimator.strategy = strategy;
    }

    pub fn set_config(&mut self, config: TrainingConfig) {
        self.estimator.config = config;
    }

    // === Steps ===

    /// Train mode forward, fair loss, backward and one optimizer step.
    pub fn train_step_single(&mut self, batch: &Batch) -> Result<StepOutput> {
        self.module.set_training(true);
        let y = batch.y.as_ref().ok_or_else(|| {
            FairError::MissingTargets("training batch has no targets".to_string())
        })?;
        let mut response = self.module.forward(&batch.x, Some(y))?;
        let loss = self.get_loss(&mut response, y, &batch.x, true)?;
        let grads = loss.backward(self.module.network()).ok_or_else(|| {
            FairError::InvalidParameter("training loss has no gradient".to_string())
        })?;

        let params = self.module.network().params();
        let (penalty, reg_grad) = self.regularizer.regularizer_penalty_grad(params);
        let updated = self.optimizer.step(params, &grads.add(&reg_grad));
        self.module.network_mut().update_params(&updated);

        Ok(StepOutput {
            loss: loss.value + penalty,
            y_pred: response.y_pred,
        })
    }

    /// Eval mode forward and base-criterion loss.
    pub fn validation_step(&self, batch: &Batch) -> Result<StepOutput> {
        let y = batch.y.as_ref().ok_or_else(|| {
            FairError::MissingTargets("validation batch has no targets".to_string())
        })?;
        let mut response = FairResponse {
            loss: None,
            y_pred: self.evaluation_step(batch),
        };
        let loss = self.get_loss(&mut response, y, &batch.x, false)?;
        Ok(StepOutput {
            loss: loss.value,
            y_pred: response.y_pred,
        })
    }

    /// Eval mode forward; predictions only.
    pub fn evaluation_step(&self, batch: &Batch) -> Array2<f64> {
        self.module.infer(&batch.x)
    }

    /// Loss of a batch response.
    ///
    /// In training this is the fairness module's loss. In evaluation it is
    /// the base criterion on the predictions, so validation losses never
    /// include the fairness term.
    pub fn get_loss(
        &self,
        response: &mut FairResponse,
        y_true: &Array2<f64>,
        x: &Array2<f64>,
        training: bool,
    ) -> Result<FairLoss> {
        if training {
            response.loss.take().ok_or_else(|| {
                FairError::InvalidParameter("fairness module returned no training loss".to_string())
            })
        } else {
            Ok(FairLoss::from_criterion(
                self.module.criterion(),
                x,
                &response.y_pred,
                y_true,
            ))
        }
    }

    // === Training ===

    pub(crate) fn fit_loop(&mut self, dataset: &TabularDataset) -> Result<()> {
        if !dataset.has_targets() {
            return Err(FairError::MissingTargets(
                "fit needs targets; pass y or a dataset with targets".to_string(),
            ));
        }
        let n_total = dataset
            .len()
            .ok_or_else(|| FairError::EmptyData("dataset length unknown".to_string()))?;
        if n_total == 0 {
            return Err(FairError::EmptyData("dataset is empty".to_string()));
        }
        self.check_features(dataset)?;
        if let Some(y) = dataset.targets() {
            self.module
                .criterion()
                .check_target(self.module.network().n_outputs(), y)?;
        }

        let config = self.estimator.config.clone();
        let (train_idx, valid_idx) = match &config.valid_split {
            Some(split) => split.split(n_total, self.rng.gen())?,
            None => ((0..n_total).collect(), Vec::new()),
        };

        let first_epoch = self.history.len();
        for epoch in first_epoch..first_epoch + config.max_epochs {
            let mut order = train_idx.clone();
            if config.shuffle {
                order.shuffle(&mut self.rng);
            }

            let mut total_loss = 0.0;
            for batch in dataset.batches_in_order(&order, config.batch_size) {
                let batch = batch?;
                let step = self.train_step_single(&batch)?;
                total_loss += step.loss * batch.len() as f64;
            }
            let train_loss = total_loss / order.len() as f64;

            let valid_loss = if valid_idx.is_empty() {
                None
            } else {
                let mut total = 0.0;
                for batch in dataset.batches_in_order(&valid_idx, config.batch_size) {
                    let batch = batch?;
                    total += self.validation_step(&batch)?.loss * batch.len() as f64;
                }
                Some(total / valid_idx.len() as f64)
            };

            let lambda = self.module.lambda();
            if config.verbose {
                tracing::info!(epoch, train_loss, valid_loss = ?valid_loss, lambda, "epoch finished");
            } else {
                tracing::debug!(epoch, train_loss, valid_loss = ?valid_loss, lambda, "epoch finished");
            }
            self.history.push(EpochRecord {
                epoch,
                train_loss,
                valid_loss,
                train_samples: order.len(),
                valid_samples: valid_idx.len(),
                lambda,
            });
        }
        self.module.set_training(false);
        Ok(())
    }

    /// Continues training on `(x, y)` without re-initializing anything.
    ///
    /// Targets are encoded with the label vocabulary learned in `fit`.
    pub fn partial_fit(&mut self, x: impl Into<Features>, y: impl Into<Targets>) -> Result<()> {
        let targets = y.into();
        let encoded = match (self.task, &self.binarizer) {
            (Task::Classification, Some(binarizer)) => encode_with(binarizer, &targets)?,
            _ => targets.to_array()?,
        };
        let dataset = TabularDataset::from_arrays(x.into(), Some(encoded))?;
        self.fit_loop(&dataset)
    }

    /// Fits again on `(x, y)`.
    ///
    /// Without `warm_start` this is a fresh `fit`. With it the network weights
    /// are kept, and the fairness module is rebuilt only if the strategy was
    /// changed since it was built.
    pub fn refit(&mut self, x: impl Into<Features>, y: impl Into<Targets>) -> Result<()> {
        if !self.estimator.config.warm_start {
            *self = self.estimator.fit(x, y)?;
            return Ok(());
        }

        let targets = y.into();
        let resolved = resolve_targets(self.estimator.config.task, Some(&targets))?;
        let dataset = TabularDataset::from_arrays(x.into(), resolved.y)?;

        if !self.module.matches(&self.estimator.strategy) {
            tracing::debug!(
                strategy = self.estimator.strategy.name(),
                "strategy changed, rebuilding fairness module"
            );
            let network = self.module.network().clone();
            self.module = self.estimator.strategy.initialize_module(
                network,
                self.estimator.criterion.clone(),
                self.rng.gen(),
            )?;
            self.optimizer = build_optimizer(&self.estimator.config, self.module.as_ref());
        }
        self.regularizer = build_regularizer(self.estimator.config.weight_decay);
        self.task = resolved.task;
        self.binarizer = resolved.binarizer;
        self.fit_loop(&dataset)
    }

    // === Inference ===

    fn check_features<D: Dataset>(&self, dataset: &D) -> Result<()> {
        let expected = self.module.network().n_inputs();
        if dataset.n_features() != expected {
            return Err(FairError::shape(
                format!("{} input features", expected),
                format!("{}", dataset.n_features()),
            ));
        }
        Ok(())
    }

    fn forward_all(&self, x: Features) -> Result<Array2<f64>> {
        let dataset = TabularDataset::from_arrays(x, None)?;
        self.check_features(&dataset)?;
        let mut outputs = Vec::new();
        for batch in dataset.batches(self.estimator.config.batch_size) {
            outputs.push(self.evaluation_step(&batch?));
        }
        if outputs.is_empty() {
            return Ok(Array2::zeros((0, self.module.network().n_outputs())));
        }
        let views: Vec<ArrayView2<f64>> = outputs.iter().map(|o| o.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| FairError::InvalidParameter(e.to_string()))
    }

    /// Network outputs after the criterion's non-linearity (softmax,
    /// sigmoid or identity).
    pub fn predict_proba(&self, x: impl Into<Features>) -> Result<Array2<f64>> {
        let raw = self.forward_all(x.into())?;
        Ok(self.module.criterion().predict_nonlinearity(&raw))
    }

    /// Class labels for classification, raw outputs for regression.
    ///
    /// Multi-column probabilities pick the arg-max class. A single
    /// probability column (binary logits) picks the second class when
    /// `p > 0.5`; a plain arg-max over one column would always pick the first.
    pub fn predict(&self, x: impl Into<Features>) -> Result<Predictions> {
        if self.task == Task::Regression {
            return Ok(Predictions::Values(self.forward_all(x.into())?));
        }
        let proba = self.predict_proba(x)?;
        match &self.binarizer {
            Some(binarizer) => Ok(Predictions::Labels(binarizer.inverse_transform(&proba)?)),
            None => Ok(Predictions::Indices(argmax_rows(&proba))),
        }
    }

    /// Accuracy for classification, R² for regression.
    pub fn score(&self, x: impl Into<Features>, y: impl Into<Targets>) -> Result<f64> {
        let targets = y.into();
        match self.predict(x)? {
            Predictions::Values(values) => r2_score(&targets.to_array()?, &values),
            Predictions::Labels(predicted) => {
                let truth = targets.labels()?.ok_or_else(|| {
                    FairError::InvalidTarget("accuracy needs a single label column".to_string())
                })?;
                accuracy(&truth, &predicted)
            }
            Predictions::Indices(predicted) => {
                let truth = targets
                    .labels()?
                    .ok_or_else(|| {
                        FairError::InvalidTarget("accuracy needs a single label column".to_string())
                    })?
                    .iter()
                    .map(|l| l.as_class_index())
                    .collect::<Vec<_>>();
                let predicted: Vec<Option<usize>> = predicted.into_iter().map(Some).collect();
                accuracy(&truth, &predicted)
            }
        }
    }

    // === Persistence ===

    /// Writes network parameters, task, label vocabulary and history.
    pub fn save_params(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = FittedState {
            params: self.module.network().params().clone(),
            task: self.task,
            binarizer: self.binarizer.as_ref().map(|b| b.extract_params()),
            history: self.history.clone(),
        };
        std::fs::write(path, state.to_bytes()?)?;
        Ok(())
    }

    /// Restores what [`save_params`](Self::save_params) wrote.
    ///
    /// # Errors
    /// Returns an error if the saved network has a different shape.
    pub fn load_params(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let state = FittedState::<N::Params>::from_bytes(&bytes)?;

        let mut restored = self.module.network().clone();
        restored.update_params(&state.params);
        let current = self.module.network();
        if (restored.n_inputs(), restored.n_outputs()) != (current.n_inputs(), current.n_outputs()) {
            return Err(FairError::shape(
                format!("network {}x{}", current.n_inputs(), current.n_outputs()),
                format!("{}x{}", restored.n_inputs(), restored.n_outputs()),
            ));
        }
        self.module.network_mut().update_params(&state.params);
        self.task = state.task;
        self.binarizer = state.binarizer.map(FittedLabelBinarizer::from_params);
        self.history = state.history;
        Ok(())
    }
}
