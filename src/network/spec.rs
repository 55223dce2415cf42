use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{CallbackError, Result};
use crate::loss::loss_type::LossType;
use crate::network::network::Network;

/// One layer in a network specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub input_size: usize,
    pub activation: ActivationFunction,
}

/// Serializable network architecture plus the loss it trains with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Used as the model file stem.
    pub name: String,
    /// Input → output.
    pub layers: Vec<LayerSpec>,
    pub loss: LossType,
}

impl NetworkSpec {
    /// Checks that consecutive layers agree on their sizes.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(CallbackError::Config(format!("network `{}` has no layers", self.name)));
        }
        for (i, pair) in self.layers.windows(2).enumerate() {
            if pair[0].size != pair[1].input_size {
                return Err(CallbackError::Config(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    i,
                    pair[0].size,
                    i + 1,
                    pair[1].input_size
                )));
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Network> {
        self.validate()?;
        Ok(Network::new(
            self.layers
                .iter()
                .map(|l| (l.size, l.input_size, l.activation))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_chain_is_a_config_error() {
        let spec = NetworkSpec {
            name: "bad".into(),
            layers: vec![
                LayerSpec { size: 3, input_size: 2, activation: ActivationFunction::ReLU },
                LayerSpec { size: 1, input_size: 4, activation: ActivationFunction::Sigmoid },
            ],
            loss: LossType::Mse,
        };
        assert!(matches!(spec.build(), Err(CallbackError::Config(_))));
    }
}
