//! Scalar and histogram summaries per epoch.

use std::path::{Path, PathBuf};

use tracing::Span;

use super::{Callback, Logs};
use crate::error::{CallbackError, Result};
use crate::model::ModelHandle;
use crate::summary::{EventWriter, SummarySink};

/// Opens a sink for a log directory and optional comment.
pub type WriterFactory = Box<dyn FnMut(&Path, Option<&str>) -> Result<Box<dyn SummarySink>>>;

/// Forwards every epoch metric, the learning rate of each optimizer group and a
/// histogram of every parameter to a [`SummarySink`].
///
/// `val_`-prefixed metrics become `<Name>/test`, everything else `<Name>/train`.
pub struct TensorBoard {
    log_dir: PathBuf,
    comment: Option<String>,
    factory: WriterFactory,
    writer: Option<Box<dyn SummarySink>>,
    span: Span,
}

impl TensorBoard {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            comment: None,
            factory: Box::new(|dir: &Path, comment: Option<&str>| Ok(Box::new(EventWriter::create(dir, comment)?) as Box<dyn SummarySink>)),
            writer: None,
            span: tracing::info_span!("tensorboard"),
        }
    }

    /// Suffix for the event file name.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Replaces the default [`EventWriter`] with another sink.
    pub fn with_writer_factory(mut self, factory: WriterFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Default for TensorBoard {
    fn default() -> Self {
        Self::new("logs")
    }
}

/// `val_loss` → `Loss/test`, `accuracy` → `Accuracy/train`.
pub fn parse_key(key: &str) -> String {
    match key.strip_prefix("val_") {
        Some(rest) => format!("{}/test", capitalize(rest)),
        None => format!("{}/train", capitalize(key)),
    }
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl Callback for TensorBoard {
    fn name(&self) -> &str {
        "tensorboard"
    }

    fn on_train_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        if self.writer.is_none() {
            let writer = (self.factory)(&self.log_dir, self.comment.as_deref())?;
            tracing::debug!(parent: &self.span, log_dir = %self.log_dir.display(), "summary writer opened");
            self.writer = Some(writer);
        }
        Ok(())
    }

    fn on_epoch_end(&mut self, model: &mut dyn ModelHandle, epoch: usize, logs: &Logs) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(CallbackError::WriterNotOpen)?;

        for (key, value) in logs.iter() {
            writer.add_scalar(&parse_key(key), value, epoch)?;
        }
        for group in model.param_groups() {
            writer.add_scalar("learning_rate", group.lr, epoch)?;
        }
        for (name, values) in model.named_parameters() {
            writer.add_histogram(&name, &values, epoch)?;
        }
        Ok(())
    }

    fn on_train_end(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}
