use serde::{Deserialize, Serialize};

use crate::{activation::activation::ActivationFunction, math::matrix::Matrix};

/// Fully connected layer: `a = σ(x·W + b)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    /// Shape `(input_size, size)`.
    pub weights: Matrix,
    /// Shape `(1, size)`.
    pub biases: Matrix,
    pub activator: ActivationFunction,
    /// Activations from the last forward pass, kept for backprop.
    #[serde(skip)]
    pub neurons: Matrix,
    /// Pre-activation values `z` from the last forward pass.
    #[serde(skip)]
    pre_neurons: Matrix,
}

impl Layer {
    pub fn new(size: usize, input_size: usize, activation: ActivationFunction) -> Layer {
        Layer {
            size,
            weights: Matrix::xavier(input_size, size),
            biases: Matrix::zeros(1, size),
            activator: activation,
            neurons: Matrix::zeros(1, size),
            pre_neurons: Matrix::zeros(1, size),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn feed_from(&mut self, input: Vec<f64>) -> Vec<f64> {
        let z = &Matrix::from_data(vec![input]) * &self.weights + self.biases.clone();
        let a = z.map(|x| self.activator.function(x));
        self.pre_neurons = z;
        self.neurons = a.clone();
        a.data.into_iter().next().unwrap_or_default()
    }

    /// Returns `(weights_grad, biases_grad)` given `∂L/∂a` for this layer.
    pub fn compute_gradients(&self, next_layer_delta: &Matrix, inputs: &Matrix) -> (Matrix, Matrix) {
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        let layer_delta = next_layer_delta.hadamard(&act_derivative);
        let weights_grad = &inputs.transpose() * &layer_delta;
        (weights_grad, layer_delta)
    }

    pub fn apply_gradients(&mut self, weights_grad: Matrix, biases_grad: Matrix, lr: f64) {
        self.weights = self.weights.clone() - weights_grad.map(|x| x * lr);
        self.biases = self.biases.clone() - biases_grad.map(|x| x * lr);
    }

    /// Clears the forward caches, e.g. after weights were replaced from disk.
    pub fn reset_cache(&mut self) {
        self.neurons = Matrix::zeros(1, self.size);
        self.pre_neurons = Matrix::zeros(1, self.size);
    }
}
