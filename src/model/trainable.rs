use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CallbackError, Result};
use crate::export::graph::{Graph, Initializer, Node, ValueInfo};
use crate::loss::loss_type::LossType;
use crate::math::matrix::Matrix;
use crate::math::tensor::Tensor;
use crate::model::handle::{Device, ModelHandle};
use crate::network::network::Network;
use crate::optim::sgd::{ParamGroup, Sgd};

/// A network bundled with its optimizer, loss and run flags.
pub struct Trainable {
    pub network: Network,
    pub optimizer: Sgd,
    pub loss: LossType,
    device: Device,
    training: bool,
    stop_training: bool,
}

impl Trainable {
    pub fn new(network: Network, optimizer: Sgd, loss: LossType) -> Self {
        Self {
            network,
            optimizer,
            loss,
            device: Device::Cpu,
            training: true,
            stop_training: false,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn train(&mut self) {
        self.training = true;
    }

    /// One mini-batch of SGD: accumulates gradients over the batch, averages,
    /// then applies them. Returns the summed loss over the batch samples.
    pub fn train_batch(&mut self, inputs: &[&Vec<f64>], labels: &[&Vec<f64>]) -> f64 {
        let network = &mut self.network;
        let mut total_loss = 0.0;

        let mut acc_grads: Vec<(Matrix, Matrix)> = network.layers.iter()
            .map(|layer| (
                Matrix::zeros(layer.weights.rows, layer.weights.cols),
                Matrix::zeros(layer.biases.rows, layer.biases.cols),
            ))
            .collect();

        for (&input, &expected) in inputs.iter().zip(labels) {
            let output = network.forward(input.clone());
            total_loss += self.loss.loss(&output, expected);

            let mut delta = Matrix::from_data(vec![self.loss.derivative(&output, expected)]);

            for i in (0..network.layers.len()).rev() {
                let input_for_layer = if i == 0 {
                    Matrix::from_data(vec![input.clone()])
                } else {
                    network.layers[i - 1].neurons.clone()
                };

                let (w_grad, b_grad) = network.layers[i].compute_gradients(&delta, &input_for_layer);
                if i > 0 {
                    delta = &b_grad * &network.layers[i].weights.transpose();
                }

                let (w_acc, b_acc) = std::mem::take(&mut acc_grads[i]);
                acc_grads[i] = (w_acc + w_grad, b_acc + b_grad);
            }
        }

        let inv_batch = 1.0 / inputs.len().max(1) as f64;
        for (i, (w_acc, b_acc)) in acc_grads.into_iter().enumerate() {
            self.optimizer.step(
                i,
                &mut network.layers[i],
                w_acc.map(|x| x * inv_batch),
                b_acc.map(|x| x * inv_batch),
            );
        }

        total_loss
    }

    pub fn predict(&mut self, input: &[f64]) -> Vec<f64> {
        self.network.forward(input.to_vec())
    }
}

impl ModelHandle for Trainable {
    fn save(&self, path: &Path) -> Result<()> {
        self.network.save_json(path)
    }

    fn load_state(&mut self, path: &Path) -> Result<()> {
        let restored = Network::load_json(path)?;
        self.network.load_weights_from(restored)
    }

    fn to_device(&mut self, device: Device) -> Result<()> {
        match device {
            Device::Cpu => {
                self.device = device;
                Ok(())
            }
            other => Err(CallbackError::UnsupportedDevice(other)),
        }
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_stop_training(&mut self, stop: bool) {
        self.stop_training = stop;
    }

    fn stop_training(&self) -> bool {
        self.stop_training
    }

    fn named_parameters(&self) -> Vec<(String, Vec<f64>)> {
        self.network.named_parameters()
    }

    fn param_groups(&self) -> Vec<ParamGroup> {
        self.optimizer.param_groups.clone()
    }

    fn trace(&mut self, input: &Tensor) -> Result<Graph> {
        let batch = input.to_batch_matrix()?;
        let expected = self.network.input_size();
        if batch.cols != expected {
            return Err(CallbackError::shape_mismatch(
                format!("{expected} features per sample"),
                format!("{} from input shape {:?}", batch.cols, input.shape),
            ));
        }

        let out_size = self.network.output_size();
        for row in batch.data {
            let out = self.network.forward(row);
            if out.len() != out_size {
                return Err(CallbackError::shape_mismatch(format!("{out_size} outputs"), format!("{}", out.len())));
            }
        }

        let mut nodes = Vec::new();
        let mut current = "input".to_string();
        if input.shape.len() != 2 {
            nodes.push(Node {
                name: "flatten".into(),
                op_type: "Flatten".into(),
                inputs: vec![current],
                outputs: vec!["input.flat".into()],
                attributes: BTreeMap::from([("axis".to_string(), 1.0)]),
            });
            current = "input.flat".into();
        }

        let last = self.network.layers.len().saturating_sub(1);
        let mut initializers = Vec::new();
        for (i, layer) in self.network.layers.iter().enumerate() {
            let weight = format!("layers.{i}.weight");
            let bias = format!("layers.{i}.bias");
            initializers.push(Initializer {
                name: weight.clone(),
                dims: vec![layer.weights.rows, layer.weights.cols],
                data: layer.weights.to_flat(),
            });
            initializers.push(Initializer {
                name: bias.clone(),
                dims: vec![layer.size],
                data: layer.biases.to_flat(),
            });

            let gemm_out = format!("layers.{i}.gemm");
            nodes.push(Node {
                name: format!("layers.{i}.linear"),
                op_type: "Gemm".into(),
                inputs: vec![current, weight, bias],
                outputs: vec![gemm_out.clone()],
                attributes: BTreeMap::new(),
            });

            let act_out = if i == last { "output".to_string() } else { format!("layers.{i}.act") };
            nodes.push(Node {
                name: format!("layers.{i}.activation"),
                op_type: layer.activator.op_type().into(),
                inputs: vec![gemm_out],
                outputs: vec![act_out.clone()],
                attributes: layer.activator.op_attributes().into_iter().collect(),
            });
            current = act_out;
        }

        Ok(Graph {
            name: "network".into(),
            nodes,
            inputs: vec![ValueInfo::fixed("input", &input.shape)],
            outputs: vec![ValueInfo::fixed("output", &[batch.rows, out_size])],
            initializers,
        })
    }
}
