//! Multi-layer perceptron with ReLU hidden activations.

use crate::model::linear::LinearParams;
use crate::model::{Network, ParamOps};
use ndarray::{Array2, Axis};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Parameters of every dense layer, input layer first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub layers: Vec<LinearParams>,
}

impl ParamOps for MlpParams {
    fn add(&self, other: &Self) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .zip(&other.layers)
                .map(|(a, b)| a.add(b))
                .collect(),
        }
    }

    fn scale(&self, scalar: f64) -> Self {
        Self {
            layers: self.layers.iter().map(|l| l.scale(scalar)).collect(),
        }
    }

    fn zip_map<F: Fn(f64, f64) -> f64>(&self, other: &Self, f: F) -> Self {
        assert_eq!(self.layers.len(), other.layers.len(), "layer count mismatch");
        Self {
            layers: self
                .layers
                .iter()
                .zip(&other.layers)
                .map(|(a, b)| a.zip_map(b, &f))
                .collect(),
        }
    }

    fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            layers: self.layers.iter().map(|l| l.map(&f)).collect(),
        }
    }

    fn sum_squares(&self) -> f64 {
        self.layers.iter().map(ParamOps::sum_squares).sum()
    }
}

/// Feed-forward network: `Linear -> ReLU -> ... -> Linear`.
///
/// The output layer has no activation; pair it with a criterion that expects
/// logits (cross-entropy, BCE-with-logits) or raw values (MSE).
#[derive(Clone, Debug)]
pub struct Mlp {
    params: MlpParams,
}

impl Mlp {
    /// Zero-initialized network with the given layer widths.
    ///
    /// `hidden` may be empty, in which case the network is a single dense layer.
    pub fn new(n_inputs: usize, hidden: &[usize], n_outputs: usize) -> Self {
        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(n_inputs);
        widths.extend_from_slice(hidden);
        widths.push(n_outputs);
        let layers = widths
            .windows(2)
            .map(|w| LinearParams::zeros(w[0], w[1]))
            .collect();
        Self {
            params: MlpParams { layers },
        }
    }

    pub fn from_params(params: MlpParams) -> Self {
        Self { params }
    }

    fn affine(p: &LinearParams, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&p.weights) + &p.bias
    }

    /// Pre-activations of every layer for `x`.
    fn pre_activations(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let n_layers = self.params.layers.len();
        let mut outs = Vec::with_capacity(n_layers);
        let mut h = x.clone();
        for (i, p) in self.params.layers.iter().enumerate() {
            let z = Self::affine(p, &h);
            if i + 1 < n_layers {
                h = z.mapv(relu);
            }
            outs.push(z);
        }
        outs
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

impl Network for Mlp {
    type Params = MlpParams;

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        self.pre_activations(x)
            .pop()
            .unwrap_or_else(|| x.clone())
    }

    fn backward(&self, x: &Array2<f64>, grad_output: &Array2<f64>) -> (MlpParams, Array2<f64>) {
        let zs = self.pre_activations(x);
        let n_layers = self.params.layers.len();
        let mut grads = Vec::with_capacity(n_layers);
        let mut delta = grad_output.clone();

        for i in (0..n_layers).rev() {
            let input = if i == 0 { x.clone() } else { zs[i - 1].mapv(relu) };
            let p = &self.params.layers[i];
            grads.push(LinearParams {
                weights: input.t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });
            let mut upstream = delta.dot(&p.weights.t());
            if i > 0 {
                upstream.zip_mut_with(&zs[i - 1], |g, &z| {
                    if z <= 0.0 {
                        *g = 0.0;
                    }
                });
            }
            delta = upstream;
        }
        grads.reverse();
        (MlpParams { layers: grads }, delta)
    }

    fn params(&self) -> &MlpParams {
        &self.params
    }

    fn update_params(&mut self, params: &MlpParams) {
        self.params = params.clone();
    }

    fn reset_parameters(&mut self, rng: &mut Xoshiro256PlusPlus) {
        for layer in &mut self.params.layers {
            let (n_in, n_out) = layer.weights.dim();
            *layer = LinearParams::uniform(n_in, n_out, rng);
        }
    }

    fn n_inputs(&self) -> usize {
        self.params.layers.first().map_or(0, |l| l.weights.nrows())
    }

    fn n_outputs(&self) -> usize {
        self.params.layers.last().map_or(0, |l| l.weights.ncols())
    }
}
