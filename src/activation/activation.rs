use serde::{Serialize, Deserialize};
use std::f64::consts::E;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    Tanh,
    LeakyReLU { alpha: f64 },
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
        }
    }

    /// Element-wise derivative, evaluated at the pre-activation value.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let fx = self.function(x);
                fx * (1.0 - fx)
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity => 1.0,
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
        }
    }

    /// Operator name used when the network is traced into an interchange graph.
    pub fn op_type(&self) -> &'static str {
        match self {
            ActivationFunction::Sigmoid => "Sigmoid",
            ActivationFunction::ReLU => "Relu",
            ActivationFunction::Identity => "Identity",
            ActivationFunction::Tanh => "Tanh",
            ActivationFunction::LeakyReLU { .. } => "LeakyRelu",
        }
    }

    /// Attributes the traced operator carries, if any.
    pub fn op_attributes(&self) -> Vec<(String, f64)> {
        match self {
            ActivationFunction::LeakyReLU { alpha } => vec![("alpha".to_string(), *alpha)],
            _ => Vec::new(),
        }
    }
}
