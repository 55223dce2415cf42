//! Model checkpointing callback.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::Span;

use super::{Callback, Logs, Mode, Monitor};
use crate::error::Result;
use crate::model::ModelHandle;

/// One persisted checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRecord {
    pub epoch: usize,
    pub monitor: String,
    pub value: f64,
    /// Best value this save improved on; `None` for a first save or an unconditional one.
    pub previous: Option<f64>,
    pub path: PathBuf,
}

impl fmt::Display for SaveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.previous {
            Some(previous) => write!(
                f,
                "Epoch {}: {} improved from {:.5} to {:.5}, saving model to {}",
                self.epoch,
                self.monitor,
                previous,
                self.value,
                self.path.display()
            ),
            None => write!(
                f,
                "Epoch {}: {} got {:.5}, saving model to {}",
                self.epoch,
                self.monitor,
                self.value,
                self.path.display()
            ),
        }
    }
}

/// Persists the model whenever the monitored metric improves, or every epoch
/// when `save_best_only` is off.
pub struct ModelCheckpoint {
    filepath: PathBuf,
    monitor: Monitor,
    save_best_only: bool,
    verbose: bool,
    span: Span,
    best: f64,
    saves: Vec<SaveRecord>,
}

impl ModelCheckpoint {
    pub fn new(filepath: impl Into<PathBuf>, monitor: Monitor) -> Self {
        let best = monitor.initial_best();
        Self {
            filepath: filepath.into(),
            monitor,
            save_best_only: true,
            verbose: false,
            span: tracing::info_span!("model_checkpoint"),
            best,
            saves: Vec::new(),
        }
    }

    /// `val_loss` under `min`, saving only improvements.
    pub fn with_defaults(filepath: impl Into<PathBuf>) -> Self {
        Self::new(filepath, Monitor::with_mode("val_loss", Mode::Min))
    }

    pub fn save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    /// Every save performed in the current run, oldest first.
    pub fn saves(&self) -> &[SaveRecord] {
        &self.saves
    }

    fn save_model(&mut self, model: &mut dyn ModelHandle, epoch: usize, value: f64, previous: Option<f64>) -> Result<()> {
        let record = SaveRecord {
            epoch,
            monitor: self.monitor.name().to_string(),
            value,
            previous,
            path: self.filepath.clone(),
        };
        model.save(&self.filepath)?;
        if self.verbose {
            tracing::info!(parent: &self.span, "{record}");
        }
        self.saves.push(record);
        Ok(())
    }
}

impl Callback for ModelCheckpoint {
    fn name(&self) -> &str {
        "model_checkpoint"
    }

    fn on_train_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        self.best = self.monitor.initial_best();
        self.saves.clear();

        if let Some(dir) = self.filepath.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !dir.exists() {
                tracing::debug!(parent: &self.span, dir = %dir.display(), "creating checkpoint directory");
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, model: &mut dyn ModelHandle, epoch: usize, logs: &Logs) -> Result<()> {
        let Some(current) = self.monitor.value(logs, &self.span) else {
            return Ok(());
        };

        if self.monitor.is_improvement(current, self.best) {
            let previous = Some(self.best).filter(|b| b.is_finite());
            self.best = current;
            self.save_model(model, epoch, current, previous)
        } else if !self.save_best_only {
            self.save_model(model, epoch, current, None)
        } else {
            Ok(())
        }
    }
}
