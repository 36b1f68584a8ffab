use super::split::ValidSplit;
use super::task::TaskMode;
use crate::error::{FairError, Result};
use crate::optimizer::OptimizerKind;
use serde::{Deserialize, Serialize};

/// Training-loop settings of a fair estimator.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```rust
/// use fairlearne_rs::trainer::TrainingConfig;
///
/// let config = TrainingConfig::from_json_str(r#"{"max_epochs": 50, "shuffle": true}"#).unwrap();
/// assert_eq!(config.max_epochs, 50);
/// assert_eq!(config.batch_size, 128);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_epochs: usize,
    pub batch_size: usize,
    pub optimizer: OptimizerKind,
    /// L2 penalty on the network parameters; `0` disables it.
    pub weight_decay: f64,
    /// Reshuffle training rows every epoch.
    pub shuffle: bool,
    /// Hold out part of the training data to report a validation loss.
    pub valid_split: Option<ValidSplit>,
    /// Seed for initialization, shuffling and the auditor. Random when unset.
    pub random_state: Option<u64>,
    /// Keep network weights across `refit` calls.
    pub warm_start: bool,
    /// Log per-epoch losses at info level.
    pub verbose: bool,
    pub task: TaskMode,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 10,
            batch_size: 128,
            optimizer: OptimizerKind::default(),
            weight_decay: 0.0,
            shuffle: false,
            valid_split: None,
            random_state: None,
            warm_start: false,
            verbose: false,
            task: TaskMode::Auto,
        }
    }
}

impl TrainingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FairError::InvalidParameter("batch_size must be at least 1".to_string()));
        }
        if self.optimizer.learning_rate() <= 0.0 {
            return Err(FairError::InvalidParameter(format!(
                "learning rate must be positive, got {}",
                self.optimizer.learning_rate()
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(FairError::InvalidParameter(format!(
                "weight_decay must be non-negative, got {}",
                self.weight_decay
            )));
        }
        if let Some(split) = &self.valid_split {
            split.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.max_epochs, 10);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.optimizer.learning_rate(), 0.01);
        assert!(config.valid_split.is_none());
        assert!(!config.shuffle);
        assert_eq!(config.task, TaskMode::Auto);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TrainingConfig {
            optimizer: OptimizerKind::Adam { lr: 0.001 },
            valid_split: Some(ValidSplit::new(0.2)),
            random_state: Some(42),
            ..TrainingConfig::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(TrainingConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TrainingConfig::from_json_str(
            r#"{"optimizer": {"kind": "sgd", "lr": 0.1, "momentum": 0.9}, "task": "classification"}"#,
        )
        .unwrap();
        assert_eq!(config.task, TaskMode::Classification);
        assert_eq!(config.max_epochs, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TrainingConfig::from_json_str(r#"{"batch_size": 0}"#).is_err());
        assert!(TrainingConfig::from_json_str(r#"{"weight_decay": -1.0}"#).is_err());
        assert!(TrainingConfig::from_json_str(r#"{"max_epochs": "ten"}"#).is_err());
    }
}
