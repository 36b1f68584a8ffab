use fairlearne_rs::distances::{
    SensitiveSubspaceDistance, SquaredEuclideanDistance, SubspaceFitConfig,
};
use fairlearne_rs::loss::CrossEntropyLoss;
use fairlearne_rs::model::Mlp;
use fairlearne_rs::optimizer::OptimizerKind;
use fairlearne_rs::trainer::{FairNet, SenSRParams, SenSeIParams, Strategy, ValidSplit};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

// Column 0 is a binary protected attribute that leaks into column 1;
// the label depends on columns 2 and 3 only.
fn synthetic(n: usize, seed: u64) -> (Array2<f64>, Vec<&'static str>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut x = Array2::zeros((n, 4));
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let group = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
        let a: f64 = rng.gen_range(-1.0..1.0);
        let b: f64 = rng.gen_range(-1.0..1.0);
        x[[i, 0]] = group;
        x[[i, 1]] = group + rng.gen_range(-0.3..0.3);
        x[[i, 2]] = a;
        x[[i, 3]] = b;
        y.push(if a + 0.5 * b > 0.0 { "approved" } else { "denied" });
    }
    (x, y)
}

fn main() {
    let (x, y) = synthetic(400, 0);
    let (x_test, y_test) = synthetic(200, 1);

    let subspace = SensitiveSubspaceDistance::fit_logistic(&x, &[0], &SubspaceFitConfig::default())
        .unwrap();
    let fair_metric = Arc::new(subspace);

    let sensr = Strategy::sensr(
        fair_metric.clone(),
        SenSRParams {
            eps: 0.1,
            lr_lamb: 1.0,
            lr_param: 0.05,
            auditor_nsteps: 20,
            auditor_lr: 0.05,
        },
    );
    let sensei = Strategy::sensei(
        fair_metric,
        Arc::new(SquaredEuclideanDistance),
        SenSeIParams {
            rho: 5.0,
            eps: 0.1,
            auditor_nsteps: 20,
            auditor_lr: 0.05,
        },
    );

    for (name, strategy) in [("SenSR", sensr), ("SenSeI", sensei)] {
        let net = FairNet::new(Mlp::new(4, &[16], 2), CrossEntropyLoss, strategy)
            .optimizer(OptimizerKind::Adam { lr: 0.01 })
            .max_epochs(30)
            .batch_size(32)
            .shuffle(true)
            .valid_split(Some(ValidSplit::new(0.2)))
            .random_state(42);

        let fitted = net.fit(x.clone(), y.clone()).unwrap();
        let last = fitted.history().last().unwrap();
        println!(
            "{}: classes {:?}, final train loss {:.4}, valid loss {:?}, lambda {:.4}",
            name,
            fitted.classes().unwrap(),
            last.train_loss,
            last.valid_loss,
            fitted.lambda()
        );
        println!("{}: test accuracy {:.3}", name, fitted.score(x_test.clone(), y_test.clone()).unwrap());
    }
}
