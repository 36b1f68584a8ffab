//! Target preprocessing for the fair estimator.
//!
//! # Available Tools
//!
//! - [`type_of_target`]: classify a target as binary, multiclass, continuous, ...
//! - [`LabelBinarizer`]: learn the label vocabulary and encode targets as floats
//!
//! # Example
//!
//! ```rust
//! use fairlearne_rs::dataset::Targets;
//! use fairlearne_rs::preprocessing::{type_of_target, LabelBinarizer, TargetType};
//!
//! let y = Targets::from(vec!["cat", "dog", "cat"]);
//! assert_eq!(type_of_target(&y), TargetType::Binary);
//!
//! let fitted = LabelBinarizer::new().fit(&y).unwrap();
//! assert_eq!(fitted.n_classes(), 2);
//! ```

pub mod label;

pub use label::{
    argmax_rows, type_of_target, FittedLabelBinarizer, Label, LabelBinarizer,
    LabelBinarizerParams, TargetType,
};
