use serde::{Deserialize, Serialize};

use crate::layers::dense::Layer;
use crate::math::matrix::Matrix;

/// A set of layers sharing one learning rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub lr: f64,
    /// Layer indices covered by this group; empty means "every layer not claimed elsewhere".
    #[serde(default)]
    pub layers: Vec<usize>,
}

pub struct Sgd {
    pub param_groups: Vec<ParamGroup>,
}

impl Sgd {
    /// Single-group optimizer covering every layer.
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd {
            param_groups: vec![ParamGroup { lr: learning_rate, layers: Vec::new() }],
        }
    }

    pub fn with_groups(param_groups: Vec<ParamGroup>) -> Sgd {
        Sgd { param_groups }
    }

    /// Learning rate that applies to `layer_idx`.
    pub fn lr_for(&self, layer_idx: usize) -> f64 {
        self.param_groups
            .iter()
            .find(|g| g.layers.contains(&layer_idx))
            .or_else(|| self.param_groups.iter().find(|g| g.layers.is_empty()))
            .map_or(0.0, |g| g.lr)
    }

    /// Applies one SGD update to `layer` given its pre-computed gradients.
    pub fn step(&self, layer_idx: usize, layer: &mut Layer, weights_grad: Matrix, biases_grad: Matrix) {
        layer.apply_gradients(weights_grad, biases_grad, self.lr_for(layer_idx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_group_wins_over_catch_all() {
        let sgd = Sgd::with_groups(vec![
            ParamGroup { lr: 0.1, layers: Vec::new() },
            ParamGroup { lr: 0.01, layers: vec![1] },
        ]);
        assert_eq!(sgd.lr_for(0), 0.1);
        assert_eq!(sgd.lr_for(1), 0.01);
    }
}
