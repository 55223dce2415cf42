pub mod handle;
pub mod trainable;

pub use handle::{Device, ModelHandle};
pub use trainable::Trainable;
pub use crate::optim::sgd::ParamGroup;
