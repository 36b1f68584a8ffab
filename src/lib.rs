//! Individually fair training for small neural networks.
//!
//! A [`FairNet`] wraps a [`Network`](model::Network), a
//! [`Criterion`](loss::Criterion) and a fairness [`Strategy`]:
//!
//! - **SenSeI** (set invariance) penalizes how far an auditor can move the
//!   predictions with input perturbations that are cheap under a fair metric.
//! - **SenSR** (subspace robustness) trains on adversarial inputs found
//!   within a budget of the fair metric.
//!
//! Fitting returns a [`FittedFairNet`] with `predict`, `predict_proba`,
//! `score`, `partial_fit` and parameter persistence.

pub mod dataset;
pub mod distances;
pub mod error;
pub mod fairalgo;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod preprocessing;
pub mod regularizers;
pub mod serialization;
pub mod trainer;

pub use error::{FairError, Result};
pub use preprocessing::Label;
pub use trainer::{
    EstimatorType, FairNet, FittedFairNet, Predictions, SenSRParams, SenSeIParams, Strategy,
    Task, TaskMode, TrainingConfig,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Batch;
    use crate::distances::{
        EuclideanDistance, ProtectedEuclideanDistance, SensitiveSubspaceDistance,
        SquaredEuclideanDistance,
    };
    use crate::loss::{BCEWithLogitsLoss, CrossEntropyLoss, Criterion, MSELoss};
    use crate::model::{Linear, Mlp, Network};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use std::sync::Arc;

    fn sensei(rho: f64) -> Strategy {
        Strategy::sensei(
            Arc::new(EuclideanDistance),
            Arc::new(SquaredEuclideanDistance),
            SenSeIParams {
                rho,
                eps: 0.1,
                auditor_nsteps: 3,
                auditor_lr: 0.01,
            },
        )
    }

    fn toy_x() -> Array2<f64> {
        array![
            [0.0, 1.0],
            [0.1, 0.9],
            [0.2, 0.8],
            [0.8, 0.2],
            [0.9, 0.1],
            [1.0, 0.0]
        ]
    }

    #[test]
    fn test_canonical_labels_train_unchanged() {
        let net = FairNet::new(Linear::new(2, 1), BCEWithLogitsLoss, sensei(1.0))
            .max_epochs(2)
            .random_state(0);
        let fitted = net.fit(toy_x(), vec![0, 0, 0, 1, 1, 1]).unwrap();
        assert_eq!(fitted.task(), Task::Classification);
        assert_eq!(fitted.estimator_type(), EstimatorType::Classifier);
        let classes = fitted.classes().unwrap();
        assert_eq!(classes, &[Label::Int(0), Label::Int(1)]);
        let predicted = fitted.predict(toy_x()).unwrap();
        for label in predicted.labels().unwrap() {
            assert!(classes.contains(label));
        }
    }

    #[test]
    fn test_string_labels_are_binarized_and_sorted() {
        let net = FairNet::new(Linear::new(2, 3), CrossEntropyLoss, sensei(0.5))
            .max_epochs(3)
            .random_state(1);
        let y = vec!["b", "a", "c", "b", "c", "a"];
        let fitted = net.fit(toy_x(), y.clone()).unwrap();
        let classes: Vec<Label> = ["a", "b", "c"].iter().map(|&s| Label::from(s)).collect();
        assert_eq!(fitted.classes().unwrap(), classes.as_slice());
        let predicted = fitted.predict(toy_x()).unwrap();
        assert_eq!(predicted.len(), 6);
        assert!(predicted.labels().unwrap().iter().all(|l| classes.contains(l)));
        let score = fitted.score(toy_x(), y).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_continuous_targets_switch_auto_to_regression() {
        let net = FairNet::new(Linear::new(2, 1), MSELoss, sensei(0.1))
            .max_epochs(2)
            .random_state(2);
        let fitted = net.fit(toy_x(), vec![0.1, 0.3, 0.5, 1.7, 1.9, 2.2]).unwrap();
        assert_eq!(fitted.task(), Task::Regression);
        assert_eq!(fitted.estimator_type(), EstimatorType::Regressor);
        assert!(fitted.classes().is_none());
        assert!(fitted.predict(toy_x()).unwrap().values().is_some());
    }

    #[test]
    fn test_continuous_targets_rejected_for_classification() {
        let net = FairNet::new(Linear::new(2, 1), MSELoss, sensei(0.1))
            .task(TaskMode::Classification);
        let err = net.fit(toy_x(), vec![0.1, 0.3, 0.5, 1.7, 1.9, 2.2]).err().unwrap();
        assert!(matches!(err, FairError::Configuration(_)));
    }

    #[test]
    fn test_class_index_beyond_outputs_is_rejected() {
        let net = FairNet::new(Linear::new(2, 2), CrossEntropyLoss, sensei(0.1)).random_state(0);
        let err = net.fit(toy_x(), vec![0, 1, 2, 0, 1, 2]).err().unwrap();
        assert!(matches!(err, FairError::InvalidShape { .. }));
    }

    #[test]
    fn test_more_classes_than_outputs_is_rejected() {
        let net = FairNet::new(Linear::new(2, 2), CrossEntropyLoss, sensei(0.1)).random_state(0);
        let err = net.fit(toy_x(), vec!["a", "b", "c", "a", "b", "c"]).err().unwrap();
        assert!(matches!(err, FairError::InvalidShape { .. }));
    }

    #[test]
    fn test_binary_targets_need_one_logit_for_bce() {
        let net = FairNet::new(Linear::new(2, 2), BCEWithLogitsLoss, sensei(0.1)).random_state(0);
        let err = net.fit(toy_x(), vec![0, 0, 0, 1, 1, 1]).err().unwrap();
        assert!(matches!(err, FairError::InvalidShape { .. }));
    }

    #[test]
    fn test_estimator_type_unknown_before_fit() {
        let net = FairNet::new(Linear::new(2, 1), MSELoss, sensei(0.1));
        assert!(matches!(net.estimator_type(), Err(FairError::NotFitted(_))));
    }

    #[test]
    fn test_validation_loss_ignores_fairness_term() {
        let y = vec![0, 0, 0, 1, 1, 1];
        let batch = Batch {
            x: toy_x(),
            y: Some(array![[0.0], [0.0], [0.0], [1.0], [1.0], [1.0]]),
        };
        let mut losses = Vec::new();
        for rho in [0.0, 10.0] {
            let fitted = FairNet::new(Linear::new(2, 1), BCEWithLogitsLoss, sensei(rho))
                .max_epochs(0)
                .random_state(5)
                .fit(toy_x(), y.clone())
                .unwrap();
            let step = fitted.validation_step(&batch).unwrap();
            let raw = fitted.network().forward(&batch.x);
            let expected = BCEWithLogitsLoss.loss(&raw, batch.y.as_ref().unwrap());
            assert_abs_diff_eq!(step.loss, expected, epsilon = 1e-12);
            losses.push(step.loss);
        }
        assert_abs_diff_eq!(losses[0], losses[1], epsilon = 1e-12);
    }

    #[test]
    fn test_sensr_with_subspace_distance_fits() {
        let basis = array![[1.0, 0.0]];
        let distance = SensitiveSubspaceDistance::from_basis(&basis).unwrap();
        let strategy = Strategy::sensr(
            Arc::new(distance),
            SenSRParams {
                eps: 0.05,
                lr_lamb: 1.0,
                lr_param: 0.1,
                auditor_nsteps: 3,
                auditor_lr: 0.05,
            },
        );
        let fitted = FairNet::new(Mlp::new(2, &[4], 2), CrossEntropyLoss, strategy)
            .max_epochs(3)
            .batch_size(4)
            .shuffle(true)
            .random_state(7)
            .fit(toy_x(), vec![0, 0, 0, 1, 1, 1])
            .unwrap();
        assert_eq!(fitted.history().len(), 3);
        assert!(fitted.lambda() >= 0.0);
        let proba = fitted.predict_proba(toy_x()).unwrap();
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_protected_distance_with_sensei() {
        let strategy = Strategy::sensei(
            Arc::new(ProtectedEuclideanDistance::new(&[0], 2).unwrap()),
            Arc::new(SquaredEuclideanDistance),
            SenSeIParams {
                rho: 2.0,
                eps: 0.5,
                auditor_nsteps: 2,
                auditor_lr: 0.05,
            },
        );
        let fitted = FairNet::new(Linear::new(2, 1), BCEWithLogitsLoss, strategy)
            .max_epochs(2)
            .random_state(3)
            .fit(toy_x(), vec![0, 0, 0, 1, 1, 1])
            .unwrap();
        assert!(fitted.lambda() >= 1e-5);
        assert!(fitted.history().train_losses().iter().all(|l| l.is_finite()));
    }
}
