//! Conversions from polars frames and series.
//!
//! Feature frames become row-major `f64` matrices in column order. Label
//! series keep their logical type: integers and booleans become
//! [`Label::Int`], floats [`Label::Float`], strings [`Label::Text`].

use crate::error::{FairError, Result};
use crate::preprocessing::Label;
use ndarray::Array2;

pub use polars::prelude::{DataFrame, Series};
use polars::prelude::DataType;

/// Values of every column as a `(height, width)` matrix.
///
/// # Errors
/// Returns [`FairError::InvalidParameter`] when a column has missing values
/// or cannot be read as numbers.
pub fn frame_to_array(df: &DataFrame) -> Result<Array2<f64>> {
    let col_data = df
        .get_columns()
        .iter()
        .map(|column| numeric_values(column.as_materialized_series()))
        .collect::<Result<Vec<Vec<f64>>>>()?;
    Ok(Array2::from_shape_fn((df.height(), df.width()), |(r, c)| col_data[c][r]))
}

fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let as_f64 = series.cast(&DataType::Float64)?;
    // failed casts surface as nulls
    if as_f64.null_count() > 0 {
        return Err(FairError::InvalidParameter(format!(
            "column '{}' ({}) has missing or non-numeric values",
            series.name(),
            series.dtype()
        )));
    }
    Ok(as_f64.f64()?.into_no_null_iter().collect())
}

/// One [`Label`] per element of `series`.
///
/// # Errors
/// Returns [`FairError::InvalidTarget`] for missing labels or unsupported
/// dtypes.
pub fn series_to_labels(series: &Series) -> Result<Vec<Label>> {
    if series.null_count() > 0 {
        return Err(FairError::InvalidTarget(format!(
            "series '{}' has {} missing labels",
            series.name(),
            series.null_count()
        )));
    }
    let dtype = series.dtype();
    if dtype.is_integer() || *dtype == DataType::Boolean {
        let ints = series.cast(&DataType::Int64)?;
        Ok(ints.i64()?.into_no_null_iter().map(Label::Int).collect())
    } else if dtype.is_float() {
        let floats = series.cast(&DataType::Float64)?;
        Ok(floats.f64()?.into_no_null_iter().map(Label::Float).collect())
    } else if *dtype == DataType::String {
        Ok(series
            .str()?
            .into_no_null_iter()
            .map(|s| Label::Text(s.to_string()))
            .collect())
    } else {
        Err(FairError::InvalidTarget(format!(
            "unsupported label dtype {} in series '{}'",
            dtype,
            series.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::NamedFrom;
    use ndarray::array;

    #[test]
    fn test_frame_values_in_column_order() {
        let df = DataFrame::new(vec![
            Series::new("age".into(), vec![30.0, 40.0]).into(),
            Series::new("income".into(), vec![1i64, 2]).into(),
        ])
        .unwrap();
        assert_eq!(frame_to_array(&df).unwrap(), array![[30.0, 1.0], [40.0, 2.0]]);
    }

    #[test]
    fn test_frame_rejects_text_and_missing_values() {
        let text = DataFrame::new(vec![Series::new("city".into(), vec!["a", "b"]).into()]).unwrap();
        assert!(matches!(frame_to_array(&text), Err(FairError::InvalidParameter(_))));

        let missing =
            DataFrame::new(vec![Series::new("x".into(), vec![Some(1.0), None]).into()]).unwrap();
        assert!(frame_to_array(&missing).is_err());
    }

    #[test]
    fn test_series_labels_keep_logical_type() {
        let ints = Series::new("y".into(), vec![2i32, 0]);
        assert_eq!(series_to_labels(&ints).unwrap(), vec![Label::Int(2), Label::Int(0)]);

        let text = Series::new("y".into(), vec!["a", "b"]);
        assert_eq!(series_to_labels(&text).unwrap()[1], Label::from("b"));

        let flags = Series::new("y".into(), vec![true, false]);
        assert_eq!(series_to_labels(&flags).unwrap(), vec![Label::Int(1), Label::Int(0)]);
    }

    #[test]
    fn test_series_with_nulls_is_rejected() {
        let s = Series::new("y".into(), vec![Some("a"), None]);
        assert!(matches!(series_to_labels(&s), Err(FairError::InvalidTarget(_))));
    }
}
