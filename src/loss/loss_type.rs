use serde::{Serialize, Deserialize};

use crate::loss::{bce::BceLoss, mse::MseLoss};

/// Selects the loss the training loop minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Mse,
    BinaryCrossEntropy,
}

impl LossType {
    pub fn loss(self, predicted: &[f64], expected: &[f64]) -> f64 {
        match self {
            LossType::Mse => MseLoss::loss(predicted, expected),
            LossType::BinaryCrossEntropy => BceLoss::loss(predicted, expected),
        }
    }

    pub fn derivative(self, predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        match self {
            LossType::Mse => MseLoss::derivative(predicted, expected),
            LossType::BinaryCrossEntropy => BceLoss::derivative(predicted, expected),
        }
    }

    /// Whether an `accuracy` metric is meaningful for this loss.
    pub fn reports_accuracy(self) -> bool {
        self == LossType::BinaryCrossEntropy
    }
}
