pub mod dataset;
pub mod loop_fn;
pub mod train_config;

pub use dataset::Dataset;
pub use loop_fn::{fit, FitSummary};
pub use train_config::TrainConfig;
