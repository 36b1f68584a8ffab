//! Task resolution: classification or regression, decided once per fit.

use crate::dataset::Targets;
use crate::error::{FairError, Result};
use crate::preprocessing::{type_of_target, FittedLabelBinarizer, LabelBinarizer, TargetType};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested task. `Auto` infers it from the targets passed to `fit`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    #[default]
    Auto,
    Classification,
    Regression,
}

/// Resolved task of a fitted estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    Classification,
    Regression,
}

impl Task {
    pub fn estimator_type(&self) -> EstimatorType {
        match self {
            Task::Classification => EstimatorType::Classifier,
            Task::Regression => EstimatorType::Regressor,
        }
    }
}

impl TaskMode {
    /// The task if it was set explicitly.
    pub fn explicit(&self) -> Option<Task> {
        match self {
            TaskMode::Auto => None,
            TaskMode::Classification => Some(Task::Classification),
            TaskMode::Regression => Some(Task::Regression),
        }
    }
}

/// Kind of estimator, as reported to model-selection code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimatorType {
    Classifier,
    Regressor,
}

impl EstimatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorType::Classifier => "classifier",
            EstimatorType::Regressor => "regressor",
        }
    }
}

impl fmt::Display for EstimatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of inspecting the targets of a `fit` call.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedTargets {
    pub task: Task,
    pub binarizer: Option<FittedLabelBinarizer>,
    /// Targets as fed to the criterion.
    pub y: Option<Array2<f64>>,
}

/// Resolves the task and encodes the targets.
///
/// Classification targets (binary, multiclass, indicator) get a label
/// binarizer. Canonical labels `0..C` are passed through as numbers, any
/// other vocabulary is replaced by its float binarized encoding. Continuous
/// targets resolve `Auto` to regression. Without targets, `Auto` means
/// classification.
pub(crate) fn resolve_targets(mode: TaskMode, targets: Option<&Targets>) -> Result<ResolvedTargets> {
    let targets = match targets {
        Some(t) => t,
        None => {
            let task = mode.explicit().unwrap_or_else(|| {
                tracing::warn!("no targets given with task mode auto, assuming classification");
                Task::Classification
            });
            return Ok(ResolvedTargets {
                task,
                binarizer: None,
                y: None,
            });
        }
    };

    if mode == TaskMode::Regression {
        return Ok(ResolvedTargets {
            task: Task::Regression,
            binarizer: None,
            y: Some(targets.to_array()?),
        });
    }

    let target_type = type_of_target(targets);
    match target_type {
        t if t.is_classification() => {
            let binarizer = LabelBinarizer::new().fit(targets)?;
            let y = encode_with(&binarizer, targets)?;
            tracing::debug!(
                target_type = %target_type,
                n_classes = binarizer.n_classes(),
                canonical = binarizer.is_canonical(),
                "resolved classification targets"
            );
            Ok(ResolvedTargets {
                task: Task::Classification,
                binarizer: Some(binarizer),
                y: Some(y),
            })
        }
        t if t.is_continuous() && mode == TaskMode::Auto => Ok(ResolvedTargets {
            task: Task::Regression,
            binarizer: None,
            y: Some(targets.to_array()?),
        }),
        other => Err(FairError::Configuration(format!(
            "Detected {} type y with task mode {:?}. This combination is not supported.",
            other, mode
        ))),
    }
}

/// Encodes targets with an already fitted binarizer.
pub(crate) fn encode_with(binarizer: &FittedLabelBinarizer, targets: &Targets) -> Result<Array2<f64>> {
    if binarizer.is_canonical() {
        targets.to_array()
    } else {
        binarizer.transform(targets)
    }
}
