//! Compressed sparse row feature matrices.

use crate::error::{FairError, Result};
use ndarray::Array2;

/// Sparse matrix in CSR layout.
///
/// Row `i` stores its non-zeros in `data[indptr[i]..indptr[i + 1]]` at the
/// column positions given by the same slice of `indices`. Rows are densified
/// per batch, so the full dense matrix is never materialized during training.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// # Errors
    /// Returns an error if the arrays do not describe a valid CSR structure.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self> {
        if indptr.len() != n_rows + 1 {
            return Err(FairError::shape(
                format!("indptr of length {}", n_rows + 1),
                format!("length {}", indptr.len()),
            ));
        }
        if indices.len() != data.len() {
            return Err(FairError::shape(
                format!("{} column indices", data.len()),
                format!("{}", indices.len()),
            ));
        }
        if indptr.first() != Some(&0)
            || indptr.last() != Some(&data.len())
            || indptr.windows(2).any(|w| w[0] > w[1])
        {
            return Err(FairError::InvalidParameter(
                "indptr must be non-decreasing from 0 to nnz".to_string(),
            ));
        }
        if let Some(&bad) = indices.iter().find(|&&c| c >= n_cols) {
            return Err(FairError::InvalidParameter(format!(
                "column index {} out of range for {} columns",
                bad, n_cols
            )));
        }
        Ok(Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        })
    }

    /// Compresses a dense matrix, dropping exact zeros.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let (n_rows, n_cols) = dense.dim();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);
        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(j);
                    data.push(v);
                }
            }
            indptr.push(data.len());
        }
        Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Dense `(rows.len(), n_cols)` matrix of the selected rows.
    pub fn rows_dense(&self, rows: &[usize]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((rows.len(), self.n_cols));
        for (r, &i) in rows.iter().enumerate() {
            if i >= self.n_rows {
                return Err(FairError::InvalidParameter(format!(
                    "row {} out of range for {} rows",
                    i, self.n_rows
                )));
            }
            for k in self.indptr[i]..self.indptr[i + 1] {
                out[[r, self.indices[k]]] += self.data[k];
            }
        }
        Ok(out)
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_rows, self.n_cols));
        for i in 0..self.n_rows {
            for k in self.indptr[i]..self.indptr[i + 1] {
                out[[i, self.indices[k]]] += self.data[k];
            }
        }
        out
    }
}
