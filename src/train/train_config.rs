use serde::{Deserialize, Serialize};

/// Hyperparameters for a [`fit`](crate::train::fit) run.
///
/// - `epochs`: upper bound on full passes; observers may stop earlier
/// - `batch_size`: samples per mini-batch; use `1` for online SGD
/// - `shuffle`: reshuffle sample order at the start of every epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

fn default_shuffle() -> bool {
    true
}

impl TrainConfig {
    pub fn new(epochs: usize, batch_size: usize) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            shuffle: true,
        }
    }
}
