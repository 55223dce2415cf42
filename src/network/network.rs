use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{CallbackError, Result};
use crate::{activation::activation::ActivationFunction, layers::dense::Layer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    /// Builds a network from (size, input_size, activation) tuples.
    pub fn new(layer_specs: Vec<(usize, usize, ActivationFunction)>) -> Network {
        let layers = layer_specs.into_iter()
            .map(|(size, input_size, activation)| Layer::new(size, input_size, activation))
            .collect();
        Network { layers }
    }

    /// Forward pass; stores activations in each layer for backprop.
    pub fn forward(&mut self, input: Vec<f64>) -> Vec<f64> {
        let mut current = input;
        for layer in &mut self.layers {
            current = layer.feed_from(current);
        }
        current
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }

    /// Parameters as `(name, row-major values)`, weights before biases, layer by layer.
    pub fn named_parameters(&self) -> Vec<(String, Vec<f64>)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                [
                    (format!("layers.{i}.weight"), layer.weights.to_flat()),
                    (format!("layers.{i}.bias"), layer.biases.to_flat()),
                ]
            })
            .collect()
    }

    /// Copies weights from `other` after checking both networks share an architecture.
    pub fn load_weights_from(&mut self, other: Network) -> Result<()> {
        if self.layers.len() != other.layers.len() {
            return Err(CallbackError::shape_mismatch(
                format!("{} layers", self.layers.len()),
                format!("{} layers", other.layers.len()),
            ));
        }
        for (i, (mine, theirs)) in self.layers.iter().zip(&other.layers).enumerate() {
            if mine.weights.shape() != theirs.weights.shape() || mine.biases.shape() != theirs.biases.shape() {
                return Err(CallbackError::shape_mismatch(
                    format!("layers.{i}.weight {:?}", mine.weights.shape()),
                    format!("layers.{i}.weight {:?}", theirs.weights.shape()),
                ));
            }
        }
        for (mine, theirs) in self.layers.iter_mut().zip(other.layers) {
            mine.weights = theirs.weights;
            mine.biases = theirs.biases;
            mine.activator = theirs.activator;
            mine.reset_cache();
        }
        Ok(())
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    ///
    /// JSON has no NaN or infinity, so a diverged network is refused before the
    /// file is touched.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some((name, _)) = self
            .named_parameters()
            .into_iter()
            .find(|(_, values)| values.iter().any(|v| !v.is_finite()))
        {
            return Err(CallbackError::NonFiniteParameter(name));
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Network> {
        let reader = BufReader::new(File::open(path)?);
        let mut network: Network = serde_json::from_reader(reader)?;
        for layer in &mut network.layers {
            layer.reset_cache();
        }
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_net() -> Network {
        Network::new(vec![
            (3, 2, ActivationFunction::Tanh),
            (1, 3, ActivationFunction::Sigmoid),
        ])
    }

    #[test]
    fn named_parameters_follow_layer_order() {
        let names: Vec<String> = xor_net().named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["layers.0.weight", "layers.0.bias", "layers.1.weight", "layers.1.bias"]);
    }

    #[test]
    fn json_round_trip_restores_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let saved = xor_net();
        saved.save_json(&path).unwrap();

        let mut other = xor_net();
        other.load_weights_from(Network::load_json(&path).unwrap()).unwrap();
        assert_eq!(other.named_parameters(), saved.named_parameters());
    }

    #[test]
    fn diverged_weights_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        let mut net = xor_net();
        net.layers[1].biases.data[0][0] = f64::NAN;

        let err = net.save_json(&path).unwrap_err();
        assert!(matches!(&err, CallbackError::NonFiniteParameter(name) if name == "layers.1.bias"), "{err}");
        assert!(!path.exists());

        net.layers[1].biases.data[0][0] = 0.0;
        net.layers[0].weights.data[0][1] = f64::INFINITY;
        assert!(matches!(net.save_json(&path), Err(CallbackError::NonFiniteParameter(n)) if n == "layers.0.weight"));
    }

    #[test]
    fn mismatched_architecture_is_rejected() {
        let mut net = xor_net();
        let wider = Network::new(vec![
            (4, 2, ActivationFunction::Tanh),
            (1, 4, ActivationFunction::Sigmoid),
        ]);
        assert!(matches!(net.load_weights_from(wider), Err(CallbackError::ShapeMismatch { .. })));
    }
}
