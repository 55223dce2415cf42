use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::export::graph::Graph;
use crate::math::tensor::Tensor;
use crate::optim::sgd::ParamGroup;

/// Where a model's parameters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
    Cuda(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{idx}"),
        }
    }
}

/// The surface observers need from a trainable model and its optimizer.
///
/// The training loop owns the model and lends it to every hook; observers never
/// keep a reference between calls.
pub trait ModelHandle {
    /// Persists the model state to `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Replaces the live parameters with a state previously written by [`save`](Self::save).
    fn load_state(&mut self, path: &Path) -> Result<()>;

    fn to_device(&mut self, device: Device) -> Result<()>;

    /// Switches to inference mode.
    fn eval(&mut self);

    fn is_training(&self) -> bool;

    /// Advisory flag read by the training loop after each epoch.
    fn set_stop_training(&mut self, stop: bool);

    fn stop_training(&self) -> bool;

    fn named_parameters(&self) -> Vec<(String, Vec<f64>)>;

    fn param_groups(&self) -> Vec<ParamGroup>;

    /// Runs `input` through the model and records the forward graph.
    fn trace(&mut self, input: &Tensor) -> Result<Graph>;
}
