//! Byte encoding for what `save_params` writes.
//!
//! The fitted state (network weights, resolved task, label vocabulary and
//! history) goes through a single bincode blob that `load_params` reads back
//! into an estimator with the same architecture.

use std::error::Error;

/// Plain data that round-trips through bytes.
///
/// The fairness module's λ and the optimizer moments are not part of it.
pub trait SerializableParams: Sized {
    /// The error type returned during (de)serialization.
    type Error: Error + Send + Sync + 'static;

    /// Encodes `self`.
    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error>;

    /// Decodes a value written by [`SerializableParams::to_bytes`].
    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;
}

impl<T> SerializableParams for T
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    type Error = bincode::Error;

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Snapshot {
        weights: Vec<f64>,
        bias: f64,
    }

    #[test]
    fn test_blanket_impl_restores_value() {
        let snap = Snapshot {
            weights: vec![0.5, -1.25],
            bias: 3.0,
        };
        let bytes = snap.to_bytes().unwrap();
        assert_eq!(Snapshot::from_bytes(&bytes).unwrap(), snap);
    }

    #[test]
    fn test_truncated_bytes_fail() {
        let bytes = Snapshot {
            weights: vec![1.0; 4],
            bias: 0.0,
        }
        .to_bytes()
        .unwrap();
        assert!(Snapshot::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }
}
