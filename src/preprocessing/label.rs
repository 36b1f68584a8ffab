//! Target inspection and label binarization.
//!
//! [`type_of_target`] classifies a target the way estimators need to decide
//! between classification and regression; [`LabelBinarizer`] learns the
//! label vocabulary and produces the float encoding fed to the criterion.

use crate::dataset::Targets;
use crate::error::{FairError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// A single target label.
///
/// Numeric labels compare by value (`Int(1) == Float(1.0)`); text labels sort
/// after every numeric label.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Label {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Label {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Label::Int(v) => Some(*v as f64),
            Label::Float(v) => Some(*v),
            Label::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Label::Text(_))
    }

    /// `Some(i)` if the label is the integer `i >= 0` (in any numeric form).
    pub fn as_class_index(&self) -> Option<usize> {
        match self.as_f64() {
            Some(v) if v >= 0.0 && v.fract() == 0.0 => Some(v as usize),
            _ => None,
        }
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Label::Text(a), Label::Text(b)) => a.cmp(b),
            (Label::Text(_), _) => Ordering::Greater,
            (_, Label::Text(_)) => Ordering::Less,
            (Label::Int(a), Label::Int(b)) => a.cmp(b),
            (a, b) => {
                // both numeric, at least one float
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{}", v),
            Label::Float(v) => write!(f, "{}", v),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Label::Int(v)
    }
}

impl From<i32> for Label {
    fn from(v: i32) -> Self {
        Label::Int(v as i64)
    }
}

impl From<f64> for Label {
    fn from(v: f64) -> Self {
        Label::Float(v)
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Label::Text(v.to_string())
    }
}

impl From<String> for Label {
    fn from(v: String) -> Self {
        Label::Text(v)
    }
}

/// Structure of a target, as seen by an estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    /// At most two distinct discrete values.
    Binary,
    /// More than two distinct discrete values in a single column.
    Multiclass,
    /// 2-D matrix of 0/1 values with more than one column.
    MultilabelIndicator,
    /// Single column of floats with at least one non-integral value.
    Continuous,
    /// 2-D matrix of floats with at least one non-integral value.
    ContinuousMultioutput,
    /// 2-D matrix of discrete values that is not an indicator matrix.
    MulticlassMultioutput,
    /// Empty, mixed text/numeric or non-finite targets.
    Unknown,
}

impl TargetType {
    pub fn is_continuous(&self) -> bool {
        matches!(self, TargetType::Continuous | TargetType::ContinuousMultioutput)
    }

    pub fn is_classification(&self) -> bool {
        matches!(
            self,
            TargetType::Binary | TargetType::Multiclass | TargetType::MultilabelIndicator
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Binary => "binary",
            TargetType::Multiclass => "multiclass",
            TargetType::MultilabelIndicator => "multilabel-indicator",
            TargetType::Continuous => "continuous",
            TargetType::ContinuousMultioutput => "continuous-multioutput",
            TargetType::MulticlassMultioutput => "multiclass-multioutput",
            TargetType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn type_of_labels(labels: &[Label]) -> TargetType {
    if labels.is_empty() {
        return TargetType::Unknown;
    }
    let n_text = labels.iter().filter(|l| l.is_text()).count();
    if n_text != 0 && n_text != labels.len() {
        return TargetType::Unknown;
    }
    let mut continuous = false;
    for v in labels.iter().filter_map(Label::as_f64) {
        if !v.is_finite() {
            return TargetType::Unknown;
        }
        if v.fract() != 0.0 {
            continuous = true;
        }
    }
    if continuous {
        return TargetType::Continuous;
    }
    let unique: BTreeSet<&Label> = labels.iter().collect();
    if unique.len() <= 2 {
        TargetType::Binary
    } else {
        TargetType::Multiclass
    }
}

fn type_of_matrix(m: &Array2<f64>) -> TargetType {
    if m.is_empty() {
        return TargetType::Unknown;
    }
    if m.iter().any(|v| !v.is_finite()) {
        return TargetType::Unknown;
    }
    if m.iter().any(|v| v.fract() != 0.0) {
        return TargetType::ContinuousMultioutput;
    }
    if m.iter().all(|&v| v == 0.0 || v == 1.0) {
        TargetType::MultilabelIndicator
    } else {
        TargetType::MulticlassMultioutput
    }
}

/// Determines the structure of `targets`.
///
/// Single-column matrices are inspected as 1-D label vectors.
pub fn type_of_target(targets: &Targets) -> TargetType {
    match targets {
        Targets::Matrix(m) if m.ncols() > 1 => type_of_matrix(m),
        other => match other.labels() {
            Ok(Some(labels)) => type_of_labels(&labels),
            _ => TargetType::Unknown,
        },
    }
}

/// Learns the label vocabulary of a classification target.
///
/// Binary targets encode to one column (`1.0` for the greater class), multiclass
/// targets to one-hot rows, indicator matrices pass through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct LabelBinarizer;

impl LabelBinarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn fit(&self, targets: &Targets) -> Result<FittedLabelBinarizer> {
        let y_type = type_of_target(targets);
        let classes = match y_type {
            TargetType::Binary | TargetType::Multiclass => {
                let labels = targets.labels()?.ok_or_else(|| {
                    FairError::InvalidTarget("expected a single label column".to_string())
                })?;
                labels
                    .into_iter()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }
            TargetType::MultilabelIndicator => {
                let n_cols = targets.n_columns();
                (0..n_cols as i64).map(Label::Int).collect()
            }
            other => {
                return Err(FairError::InvalidTarget(format!(
                    "LabelBinarizer does not support {} targets",
                    other
                )))
            }
        };
        Ok(FittedLabelBinarizer { classes, y_type })
    }

    pub fn fit_transform(&self, targets: &Targets) -> Result<(FittedLabelBinarizer, Array2<f64>)> {
        let fitted = self.fit(targets)?;
        let encoded = fitted.transform(targets)?;
        Ok((fitted, encoded))
    }
}

/// Serializable parameters for a fitted LabelBinarizer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabelBinarizerParams {
    pub classes: Vec<Label>,
    pub y_type: TargetType,
}

/// Fitted LabelBinarizer.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedLabelBinarizer {
    classes: Vec<Label>,
    y_type: TargetType,
}

impl FittedLabelBinarizer {
    /// Unique classes in sorted order.
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn y_type(&self) -> TargetType {
        self.y_type
    }

    /// True when the classes are exactly the integers `0..C`.
    pub fn is_canonical(&self) -> bool {
        self.classes
            .iter()
            .enumerate()
            .all(|(i, c)| c.as_class_index() == Some(i))
    }

    pub fn transform(&self, targets: &Targets) -> Result<Array2<f64>> {
        if self.y_type == TargetType::MultilabelIndicator {
            let m = targets.to_array()?;
            if m.ncols() != self.classes.len() {
                return Err(FairError::shape(
                    format!("{} indicator columns", self.classes.len()),
                    format!("{} columns", m.ncols()),
                ));
            }
            return Ok(m);
        }

        let labels = targets.labels()?.ok_or_else(|| {
            FairError::InvalidTarget("expected a single label column".to_string())
        })?;
        let index_of = |label: &Label| {
            self.classes.binary_search(label).map_err(|_| {
                FairError::InvalidTarget(format!("Unknown label value: {}", label))
            })
        };

        if self.y_type == TargetType::Binary {
            let positive = self.classes.get(1);
            let mut out = Array2::zeros((labels.len(), 1));
            for (i, label) in labels.iter().enumerate() {
                index_of(label)?;
                if Some(label) == positive {
                    out[[i, 0]] = 1.0;
                }
            }
            return Ok(out);
        }

        let mut out = Array2::zeros((labels.len(), self.classes.len()));
        for (i, label) in labels.iter().enumerate() {
            out[[i, index_of(label)?]] = 1.0;
        }
        Ok(out)
    }

    /// Maps encoded rows back to labels: threshold 0.5 for a single column,
    /// argmax otherwise.
    pub fn inverse_transform(&self, encoded: &Array2<f64>) -> Result<Vec<Label>> {
        argmax_rows(encoded)
            .into_iter()
            .map(|idx| {
                self.classes.get(idx).cloned().ok_or_else(|| {
                    FairError::InvalidParameter(format!(
                        "Index {} out of bounds (max {})",
                        idx,
                        self.classes.len().saturating_sub(1)
                    ))
                })
            })
            .collect()
    }

    pub fn extract_params(&self) -> LabelBinarizerParams {
        LabelBinarizerParams {
            classes: self.classes.clone(),
            y_type: self.y_type,
        }
    }

    pub fn from_params(params: LabelBinarizerParams) -> Self {
        Self {
            classes: params.classes,
            y_type: params.y_type,
        }
    }
}

/// Predicted class index per row: `p > 0.5` for single-column scores,
/// arg-max otherwise.
pub fn argmax_rows(scores: &Array2<f64>) -> Vec<usize> {
    if scores.ncols() == 1 {
        return scores.column(0).iter().map(|&p| usize::from(p > 0.5)).collect();
    }
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv {
                        (i, v)
                    } else {
                        (bi, bv)
                    }
                })
                .0
        })
        .collect()
}
