//! Training-lifecycle observers for a small feed-forward network library.
//!
//! The training loop in [`train`] lends a [`ModelHandle`] to every hook of every
//! [`Callback`] in a [`CallbackList`]. Four observers ship with the crate:
//! [`EarlyStopping`], [`ModelCheckpoint`], [`TensorBoard`] and [`ModelExport`].

pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod model;
pub mod callbacks;
pub mod summary;
pub mod export;
pub mod train;
pub mod config;

#[cfg(test)]
mod testing;

// Convenience re-exports
pub use activation::activation::ActivationFunction;
pub use callbacks::{
    Callback, CallbackList, EarlyStopping, Logs, Mode, ModelCheckpoint, ModelExport, Monitor, TensorBoard,
};
pub use config::RunConfig;
pub use error::{CallbackError, Result};
pub use export::{ExportOptions, Exporter, JsonExporter};
pub use math::matrix::Matrix;
pub use model::{Device, ModelHandle, Trainable};
pub use network::network::Network;
pub use optim::sgd::Sgd;
pub use summary::{EventWriter, SummarySink};
pub use train::{fit, Dataset, FitSummary, TrainConfig};
