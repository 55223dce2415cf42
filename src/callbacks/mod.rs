//! Lifecycle hooks invoked by the training loop.
//!
//! Every hook is a no-op unless overridden. The loop lends the model to each hook
//! call; an observer never stores it.

mod checkpoint;
mod early_stopping;
mod export;
mod list;
pub mod logs;
pub mod monitor;
mod tensorboard;

pub use checkpoint::{ModelCheckpoint, SaveRecord};
pub use early_stopping::EarlyStopping;
pub use export::ModelExport;
pub use list::CallbackList;
pub use logs::Logs;
pub use monitor::{Mode, Monitor};
pub use tensorboard::{TensorBoard, WriterFactory};

use crate::error::Result;
use crate::model::ModelHandle;

pub trait Callback {
    /// Short name used in spans and diagnostics.
    fn name(&self) -> &str;

    fn on_train_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_train_end(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_epoch_begin(&mut self, _model: &mut dyn ModelHandle, _epoch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(&mut self, _model: &mut dyn ModelHandle, _epoch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_batch_begin(&mut self, _model: &mut dyn ModelHandle, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_batch_end(&mut self, _model: &mut dyn ModelHandle, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_train_batch_begin(&mut self, _model: &mut dyn ModelHandle, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_train_batch_end(&mut self, _model: &mut dyn ModelHandle, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_test_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_test_end(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_test_batch_begin(&mut self, _model: &mut dyn ModelHandle, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }

    fn on_test_batch_end(&mut self, _model: &mut dyn ModelHandle, _batch: usize, _logs: &Logs) -> Result<()> {
        Ok(())
    }
}
