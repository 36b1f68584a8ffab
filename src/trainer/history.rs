use serde::{Deserialize, Serialize};

/// Losses recorded at the end of one epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    /// Sample-weighted mean of the fair training loss, weight penalty included.
    pub train_loss: f64,
    /// Criterion loss on the held-out rows, if a validation split is set.
    pub valid_loss: Option<f64>,
    pub train_samples: usize,
    pub valid_samples: usize,
    /// Dual variable of the fairness module after the epoch.
    pub lambda: f64,
}

/// Per-epoch training log, across `fit`, `partial_fit` and `refit` calls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    records: Vec<EpochRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn train_losses(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.train_loss).collect()
    }

    pub fn valid_losses(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.valid_loss).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, train_loss: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss,
            valid_loss: None,
            train_samples: 4,
            valid_samples: 0,
            lambda: 1.0,
        }
    }

    #[test]
    fn test_history_accumulates() {
        let mut history = History::new();
        assert!(history.is_empty());
        history.push(record(0, 1.0));
        history.push(record(1, 0.5));
        assert_eq!(history.len(), 2);
        assert_eq!(history.train_losses(), vec![1.0, 0.5]);
        assert_eq!(history.last().map(|r| r.epoch), Some(1));
        history.clear();
        assert!(history.is_empty());
    }
}
