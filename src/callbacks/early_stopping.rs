//! Early stopping callback.

use tracing::Span;

use super::{Callback, Logs, Mode, Monitor};
use crate::error::Result;
use crate::model::ModelHandle;

/// Requests a halt once the monitored metric has not improved for `patience`
/// consecutive epochs.
///
/// The request is a flag on the model; the training loop decides when to act on it.
pub struct EarlyStopping {
    monitor: Monitor,
    patience: usize,
    verbose: bool,
    span: Span,
    best: f64,
    wait: usize,
    stopped_epoch: Option<usize>,
}

impl EarlyStopping {
    pub fn new(monitor: Monitor) -> Self {
        let best = monitor.initial_best();
        Self {
            monitor,
            patience: 0,
            verbose: false,
            span: tracing::info_span!("early_stopping"),
            best,
            wait: 0,
            stopped_epoch: None,
        }
    }

    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Scopes this observer's diagnostics under `span` instead of its own.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn wait(&self) -> usize {
        self.wait
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self::new(Monitor::with_mode("val_loss", Mode::MaxEqual))
    }
}

impl Callback for EarlyStopping {
    fn name(&self) -> &str {
        "early_stopping"
    }

    fn on_train_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        self.wait = 0;
        self.stopped_epoch = None;
        self.best = self.monitor.initial_best();
        Ok(())
    }

    fn on_epoch_end(&mut self, model: &mut dyn ModelHandle, epoch: usize, logs: &Logs) -> Result<()> {
        let Some(current) = self.monitor.value(logs, &self.span) else {
            return Ok(());
        };

        if self.monitor.is_improvement(current, self.best) {
            self.best = current;
            self.wait = 0;
            return Ok(());
        }

        self.wait += 1;
        tracing::debug!(parent: &self.span, epoch, wait = self.wait, patience = self.patience, "no improvement");
        if self.wait >= self.patience && self.stopped_epoch.is_none() {
            self.stopped_epoch = Some(epoch);
            model.set_stop_training(true);
        }
        Ok(())
    }

    fn on_train_end(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        if let (Some(epoch), true) = (self.stopped_epoch, self.verbose) {
            tracing::info!(parent: &self.span, epoch, "Epoch {epoch}: early stopping");
        }
        Ok(())
    }
}
