//! Dataset abstractions for fair training.
//!
//! This module provides the [`Dataset`] trait for uniform access to training
//! data, a [`DatasetBatchIter`] iterator for mini-batch loading and
//! [`TabularDataset`], the adapter that accepts every supported input
//! representation (dense matrices, polars frames, sparse CSR matrices).
//!
//! # Core Concepts
//!
//! - **Dataset**: A source of `(X, y)` pairs where `X` is a feature matrix of
//!   shape `(n_samples, n_features)` and `y` an optional target matrix of shape
//!   `(n_samples, k)`. Targets are absent at prediction time.
//! - **Batch**: A subset of samples for mini-batch gradient descent, either a
//!   contiguous range or an explicit list of row indices (shuffled epochs).
//!
//! # Example
//!
//! ```rust
//! use fairlearne_rs::dataset::{Dataset, TabularDataset};
//! use ndarray::array;
//!
//! let x = array![[1.0], [2.0], [3.0]];
//! let y = array![[0.0], [1.0], [1.0]];
//! let dataset = TabularDataset::from_arrays(x.into(), Some(y)).unwrap();
//!
//! for batch in dataset.batches(2) {
//!     let batch = batch.unwrap();
//!     assert!(batch.x.nrows() <= 2);
//! }
//! ```

use crate::error::Result;
use ndarray::Array2;
use std::ops::Range;

pub mod frame;
pub mod sparse;
pub mod tabular;

pub use self::frame::{DataFrame, Series};
pub use self::sparse::CsrMatrix;
pub use self::tabular::{Features, TabularDataset, Targets};

/// One mini-batch of features and, when available, targets.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub x: Array2<f64>,
    pub y: Option<Array2<f64>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }
}

/// Abstract interface for a fair-training dataset.
///
/// Implementors load rows on demand; the estimator never needs the whole
/// feature matrix at once.
pub trait Dataset {
    /// Returns the total number of samples in the dataset, if known.
    ///
    /// - `Some(n)`: Exact number of samples
    /// - `None`: Size is unknown (e.g. streaming sources)
    fn len(&self) -> Option<usize>;

    /// Checks whether the dataset is empty.
    ///
    /// Default implementation checks if `len() == Some(0)`.
    fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Number of feature columns.
    fn n_features(&self) -> usize;

    /// Whether batches carry targets.
    fn has_targets(&self) -> bool;

    /// Loads the rows at `indices`, in that order.
    fn get_rows(&self, indices: &[usize]) -> Result<Batch>;

    /// Loads a contiguous range of rows `[start, end)`.
    fn get_batch(&self, range: Range<usize>) -> Result<Batch> {
        let indices: Vec<usize> = range.collect();
        self.get_rows(&indices)
    }

    /// Creates an iterator over fixed-size batches in storage order.
    ///
    /// The last batch may be smaller than `batch_size`.
    fn batches(&self, batch_size: usize) -> DatasetBatchIter<'_, Self>
    where
        Self: Sized,
    {
        DatasetBatchIter {
            dataset: self,
            order: None,
            batch_size: batch_size.max(1),
            current: 0,
        }
    }

    /// Creates an iterator over fixed-size batches visiting rows in `order`.
    fn batches_in_order<'a>(&'a self, order: &'a [usize], batch_size: usize) -> DatasetBatchIter<'a, Self>
    where
        Self: Sized,
    {
        DatasetBatchIter {
            dataset: self,
            order: Some(order),
            batch_size: batch_size.max(1),
            current: 0,
        }
    }
}

/// Iterator over dataset batches.
///
/// Created by [`Dataset::batches`] or [`Dataset::batches_in_order`].
/// Data is fetched only when `next()` is called; errors from the dataset are
/// forwarded as `Some(Err(e))`.
pub struct DatasetBatchIter<'a, D: ?Sized> {
    dataset: &'a D,
    /// Explicit row order; storage order when `None`.
    order: Option<&'a [usize]>,
    batch_size: usize,
    /// Position of the next sample to yield.
    current: usize,
}

impl<'a, D: Dataset> Iterator for DatasetBatchIter<'a, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = match self.order {
            Some(order) => order.len(),
            None => self.dataset.len()?,
        };
        if self.current >= total {
            return None;
        }

        let end = (self.current + self.batch_size).min(total);
        let range = self.current..end;
        self.current = end;

        Some(match self.order {
            Some(order) => self.dataset.get_rows(&order[range]),
            None => self.dataset.get_batch(range),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FairError;

    // Mock dataset for iterator logic testing
    struct MockDataset {
        len: usize,
    }

    impl Dataset for MockDataset {
        fn len(&self) -> Option<usize> {
            Some(self.len)
        }

        fn n_features(&self) -> usize {
            2
        }

        fn has_targets(&self) -> bool {
            true
        }

        fn get_rows(&self, indices: &[usize]) -> Result<Batch> {
            if indices.iter().any(|&i| i >= self.len) {
                return Err(FairError::InvalidParameter("range out of bounds".to_string()));
            }
            let n = indices.len();
            // X row i is [2i, 2i + 1], y row i is [i]
            let x = Array2::from_shape_fn((n, 2), |(r, c)| (indices[r] * 2 + c) as f64);
            let y = Array2::from_shape_fn((n, 1), |(r, _)| indices[r] as f64);
            Ok(Batch { x, y: Some(y) })
        }
    }

    #[test]
    fn test_dataset_is_empty() {
        assert!(MockDataset { len: 0 }.is_empty());
        assert!(!MockDataset { len: 1 }.is_empty());
    }

    #[test]
    fn test_batches_full() {
        let dataset = MockDataset { len: 6 };
        let mut iter = dataset.batches(2);

        for i in 0..3 {
            let batch = iter.next().unwrap().unwrap();
            assert_eq!(batch.x.dim(), (2, 2));
            let y: Vec<f64> = batch.y.unwrap().iter().copied().collect();
            assert_eq!(y, vec![i as f64 * 2.0, i as f64 * 2.0 + 1.0]);
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_batches_partial_last() {
        let dataset = MockDataset { len: 5 };
        let sizes: Vec<usize> = dataset.batches(2).map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_batches_larger_than_dataset() {
        let dataset = MockDataset { len: 3 };
        let mut iter = dataset.batches(10);
        assert_eq!(iter.next().unwrap().unwrap().x.dim(), (3, 2));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_batches_empty_dataset() {
        let dataset = MockDataset { len: 0 };
        assert!(dataset.batches(2).next().is_none());
    }

    #[test]
    fn test_batches_in_order_follows_permutation() {
        let dataset = MockDataset { len: 4 };
        let order = [3, 0, 2, 1];
        let ys: Vec<f64> = dataset
            .batches_in_order(&order, 3)
            .flat_map(|b| b.unwrap().y.unwrap().into_iter().collect::<Vec<_>>())
            .collect();
        assert_eq!(ys, vec![3.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn test_batch_errors_are_forwarded() {
        let dataset = MockDataset { len: 2 };
        let order = [0, 5];
        let result = dataset.batches_in_order(&order, 2).next().unwrap();
        assert!(result.is_err());
    }
}
