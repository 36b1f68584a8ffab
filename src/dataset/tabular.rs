//! The input adapter used by the fair estimator.
//!
//! [`Features`] and [`Targets`] accept the representations a caller is likely
//! to hold; [`TabularDataset`] turns them into row-addressable batches.

use super::frame::{frame_to_array, series_to_labels};
use super::{Batch, CsrMatrix, DataFrame, Dataset, Series};
use crate::error::{FairError, Result};
use crate::preprocessing::Label;
use ndarray::{Array1, Array2, Axis};

/// Feature input in any supported representation.
#[derive(Clone, Debug)]
pub enum Features {
    Dense(Array2<f64>),
    Frame(DataFrame),
    Sparse(CsrMatrix),
}

impl Features {
    /// Builds dense features from row vectors.
    ///
    /// # Errors
    /// Returns an error if rows have different lengths.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != n_cols) {
            return Err(FairError::shape(
                format!("{} features per row", n_cols),
                format!("{}", bad.len()),
            ));
        }
        let n_rows = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Array2::from_shape_vec((n_rows, n_cols), flat)
            .map(Features::Dense)
            .map_err(|e| FairError::InvalidParameter(e.to_string()))
    }

    pub fn n_rows(&self) -> usize {
        match self {
            Features::Dense(x) => x.nrows(),
            Features::Frame(df) => df.height(),
            Features::Sparse(m) => m.n_rows(),
        }
    }

    pub fn n_cols(&self) -> usize {
        match self {
            Features::Dense(x) => x.ncols(),
            Features::Frame(df) => df.width(),
            Features::Sparse(m) => m.n_cols(),
        }
    }

    /// Densifies the whole input.
    ///
    /// # Errors
    /// Returns an error if a frame column is not numeric.
    pub fn to_dense(&self) -> Result<Array2<f64>> {
        match self {
            Features::Dense(x) => Ok(x.clone()),
            Features::Frame(df) => frame_to_array(df),
            Features::Sparse(m) => Ok(m.to_dense()),
        }
    }
}

impl From<Array2<f64>> for Features {
    fn from(x: Array2<f64>) -> Self {
        Features::Dense(x)
    }
}

impl From<DataFrame> for Features {
    fn from(df: DataFrame) -> Self {
        Features::Frame(df)
    }
}

impl From<CsrMatrix> for Features {
    fn from(m: CsrMatrix) -> Self {
        Features::Sparse(m)
    }
}

/// Target input in any supported representation.
#[derive(Clone, Debug)]
pub enum Targets {
    /// One label per sample.
    Labels(Vec<Label>),
    /// A named label column.
    Series(Series),
    /// Numeric targets, one row per sample. A single column is a label vector.
    Matrix(Array2<f64>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Labels(v) => v.len(),
            Targets::Series(s) => s.len(),
            Targets::Matrix(m) => m.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_columns(&self) -> usize {
        match self {
            Targets::Matrix(m) => m.ncols(),
            _ => 1,
        }
    }

    /// Targets as a flat label vector; `None` for multi-column matrices.
    ///
    /// # Errors
    /// Returns an error if a series holds missing or unsupported values.
    pub fn labels(&self) -> Result<Option<Vec<Label>>> {
        match self {
            Targets::Labels(v) => Ok(Some(v.clone())),
            Targets::Series(s) => series_to_labels(s).map(Some),
            Targets::Matrix(m) if m.ncols() == 1 => {
                Ok(Some(m.column(0).iter().map(|&v| Label::Float(v)).collect()))
            }
            Targets::Matrix(_) => Ok(None),
        }
    }

    /// Numeric targets as an `(n, k)` matrix.
    ///
    /// # Errors
    /// Returns [`FairError::InvalidTarget`] for text labels.
    pub fn to_array(&self) -> Result<Array2<f64>> {
        let labels = match self {
            Targets::Matrix(m) => return Ok(m.clone()),
            Targets::Labels(v) => v.clone(),
            Targets::Series(s) => series_to_labels(s)?,
        };
        let values = labels
            .iter()
            .map(|l| {
                l.as_f64().ok_or_else(|| {
                    FairError::InvalidTarget(format!("non-numeric label '{}'", l))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Array1::from(values).insert_axis(Axis(1)))
    }
}

impl From<Vec<Label>> for Targets {
    fn from(v: Vec<Label>) -> Self {
        Targets::Labels(v)
    }
}

impl From<Vec<f64>> for Targets {
    fn from(v: Vec<f64>) -> Self {
        Targets::Labels(v.into_iter().map(Label::Float).collect())
    }
}

impl From<Vec<i64>> for Targets {
    fn from(v: Vec<i64>) -> Self {
        Targets::Labels(v.into_iter().map(Label::Int).collect())
    }
}

impl From<Vec<i32>> for Targets {
    fn from(v: Vec<i32>) -> Self {
        Targets::Labels(v.into_iter().map(Label::from).collect())
    }
}

impl From<Vec<&str>> for Targets {
    fn from(v: Vec<&str>) -> Self {
        Targets::Labels(v.into_iter().map(Label::from).collect())
    }
}

impl From<Vec<String>> for Targets {
    fn from(v: Vec<String>) -> Self {
        Targets::Labels(v.into_iter().map(Label::Text).collect())
    }
}

impl From<Array1<f64>> for Targets {
    fn from(v: Array1<f64>) -> Self {
        Targets::Matrix(v.insert_axis(Axis(1)))
    }
}

impl From<Array2<f64>> for Targets {
    fn from(m: Array2<f64>) -> Self {
        Targets::Matrix(m)
    }
}

impl From<Series> for Targets {
    fn from(s: Series) -> Self {
        Targets::Series(s)
    }
}

#[derive(Clone, Debug)]
enum FeatureStore {
    Dense(Array2<f64>),
    Sparse(CsrMatrix),
}

/// Row-addressable features with optional encoded targets.
///
/// Frames are stored densely in column order; sparse inputs stay compressed
/// and are densified one batch at a time.
#[derive(Clone, Debug)]
pub struct TabularDataset {
    x: FeatureStore,
    y: Option<Array2<f64>>,
    n_rows: usize,
    n_cols: usize,
}

impl TabularDataset {
    /// Wraps features and numeric targets.
    ///
    /// # Errors
    /// Returns an error if targets are non-numeric or their length differs
    /// from the number of feature rows.
    pub fn new(features: Features, targets: Option<&Targets>) -> Result<Self> {
        let y = targets.map(Targets::to_array).transpose()?;
        Self::from_arrays(features, y)
    }

    /// Wraps features and already encoded `(n, k)` targets.
    ///
    /// # Errors
    /// Returns an error on a row-count mismatch or a non-numeric frame column.
    pub fn from_arrays(features: Features, y: Option<Array2<f64>>) -> Result<Self> {
        let (n_rows, n_cols) = (features.n_rows(), features.n_cols());
        if let Some(y) = &y {
            if y.nrows() != n_rows {
                return Err(FairError::shape(
                    format!("{} target rows", n_rows),
                    format!("{}", y.nrows()),
                ));
            }
        }
        let x = match features {
            Features::Dense(x) => FeatureStore::Dense(x),
            Features::Frame(df) => FeatureStore::Dense(frame_to_array(&df)?),
            Features::Sparse(m) => FeatureStore::Sparse(m),
        };
        Ok(Self { x, y, n_rows, n_cols })
    }

    pub fn targets(&self) -> Option<&Array2<f64>> {
        self.y.as_ref()
    }

    /// Copy of the rows at `indices`, targets included.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let batch = self.get_rows(indices)?;
        let x = match &self.x {
            FeatureStore::Dense(_) => FeatureStore::Dense(batch.x),
            FeatureStore::Sparse(_) => FeatureStore::Sparse(CsrMatrix::from_dense(&batch.x)),
        };
        Ok(Self {
            x,
            y: batch.y,
            n_rows: indices.len(),
            n_cols: self.n_cols,
        })
    }
}

impl Dataset for TabularDataset {
    fn len(&self) -> Option<usize> {
        Some(self.n_rows)
    }

    fn n_features(&self) -> usize {
        self.n_cols
    }

    fn has_targets(&self) -> bool {
        self.y.is_some()
    }

    fn get_rows(&self, indices: &[usize]) -> Result<Batch> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_rows) {
            return Err(FairError::InvalidParameter(format!(
                "row {} out of range for {} rows",
                bad, self.n_rows
            )));
        }
        let x = match &self.x {
            FeatureStore::Dense(x) => x.select(Axis(0), indices),
            FeatureStore::Sparse(m) => m.rows_dense(indices)?,
        };
        let y = self.y.as_ref().map(|y| y.select(Axis(0), indices));
        Ok(Batch { x, y })
    }
}
