use serde::{Deserialize, Serialize};

use crate::error::{CallbackError, Result};

/// Paired samples and targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub inputs: Vec<Vec<f64>>,
    pub labels: Vec<Vec<f64>>,
}

impl Dataset {
    pub fn new(inputs: Vec<Vec<f64>>, labels: Vec<Vec<f64>>) -> Result<Dataset> {
        if inputs.len() != labels.len() {
            return Err(CallbackError::Config(format!(
                "{} inputs but {} labels",
                inputs.len(),
                labels.len()
            )));
        }
        Ok(Dataset { inputs, labels })
    }

    /// The four XOR truth-table rows.
    pub fn xor() -> Dataset {
        Dataset {
            inputs: vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            labels: vec![vec![0.0], vec![1.0], vec![1.0], vec![0.0]],
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Checks every sample has `inputs` features and every label `outputs` values.
    pub fn check_widths(&self, inputs: usize, outputs: usize) -> Result<()> {
        if self.inputs.len() != self.labels.len() {
            return Err(CallbackError::Config(format!(
                "{} inputs but {} labels",
                self.inputs.len(),
                self.labels.len()
            )));
        }
        for (i, (x, y)) in self.inputs.iter().zip(&self.labels).enumerate() {
            if x.len() != inputs {
                return Err(CallbackError::shape_mismatch(
                    format!("{inputs} input features"),
                    format!("{} in sample {i}", x.len()),
                ));
            }
            if y.len() != outputs {
                return Err(CallbackError::shape_mismatch(
                    format!("{outputs} label values"),
                    format!("{} in sample {i}", y.len()),
                ));
            }
        }
        Ok(())
    }

    /// Width of the first sample, if any.
    pub fn feature_count(&self) -> Option<usize> {
        self.inputs.first().map(Vec::len)
    }
}
