//! Error types shared by the estimator and its collaborators.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FairError>;

/// Errors raised while configuring, fitting or using a fair estimator.
#[derive(Error, Debug)]
pub enum FairError {
    /// The task type was queried while still `Auto` and no fit has resolved it.
    #[error("Not fitted: {0}")]
    NotFitted(String),

    /// Label structure is incompatible with the requested or inferred task.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Shape mismatch between expected and actual array dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },

    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Invalid hyperparameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Training was requested on a dataset that carries no targets.
    #[error("Missing targets: {0}")]
    MissingTargets(String),

    /// Target values cannot be used for the resolved task.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A dataframe or series could not be read.
    #[error("DataFrame error: {0}")]
    Frame(#[from] polars::error::PolarsError),
}

impl From<bincode::Error> for FairError {
    fn from(err: bincode::Error) -> Self {
        FairError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for FairError {
    fn from(err: serde_json::Error) -> Self {
        FairError::Serialization(err.to_string())
    }
}

impl FairError {
    pub(crate) fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
        FairError::InvalidShape {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
