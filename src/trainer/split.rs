use crate::error::{FairError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Random holdout of a fraction of the training rows.
///
/// The validation loss it produces is the plain criterion loss and contains
/// no fairness term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidSplit {
    /// Share of rows held out, in `(0, 1)`.
    pub fraction: f64,
    /// Seed of the row permutation; the estimator seed is used when unset.
    pub random_state: Option<u64>,
}

impl ValidSplit {
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction,
            random_state: None,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fraction > 0.0 && self.fraction < 1.0) {
            return Err(FairError::InvalidParameter(format!(
                "validation fraction must be in (0, 1), got {}",
                self.fraction
            )));
        }
        Ok(())
    }

    /// Splits `0..n` into `(train, valid)` row indices.
    ///
    /// Both parts keep at least one row.
    pub fn split(&self, n: usize, default_seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
        self.validate()?;
        if n < 2 {
            return Err(FairError::EmptyData(format!(
                "cannot split {} sample(s) into train and validation",
                n
            )));
        }
        let n_valid = ((n as f64 * self.fraction).round() as usize).clamp(1, n - 1);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state.unwrap_or(default_seed));
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let valid = order.split_off(n - n_valid);
        Ok((order, valid))
    }
}
