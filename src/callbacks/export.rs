//! Post-training export to the interchange format.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::Span;

use super::{Callback, Logs};
use crate::error::{CallbackError, Result};
use crate::export::{ExportOptions, Exporter, JsonExporter};
use crate::math::tensor::Tensor;
use crate::model::{Device, ModelHandle};

/// Reloads the best saved weights when training ends and exports them next to
/// the checkpoint as `<stem>.onnx`.
pub struct ModelExport {
    saved_model_path: PathBuf,
    export_path: PathBuf,
    input_shape: Vec<usize>,
    options: ExportOptions,
    metadata: Option<BTreeMap<String, String>>,
    verbose: bool,
    exporter: Box<dyn Exporter>,
    span: Span,
    exported: bool,
    metadata_embedded: bool,
}

impl ModelExport {
    pub fn new(saved_model_path: impl Into<PathBuf>, input_shape: &[usize]) -> Self {
        let saved_model_path = saved_model_path.into();
        let export_path = saved_model_path.with_extension("onnx");
        Self {
            saved_model_path,
            export_path,
            input_shape: input_shape.to_vec(),
            options: ExportOptions::default(),
            metadata: None,
            verbose: false,
            exporter: Box::new(JsonExporter),
            span: tracing::info_span!("model_export"),
            exported: false,
            metadata_embedded: false,
        }
    }

    pub fn options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Key/value records embedded into the artifact after export.
    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Whether the artifact was written during the last `on_train_end`.
    pub fn exported(&self) -> bool {
        self.exported
    }

    pub fn metadata_embedded(&self) -> bool {
        self.metadata_embedded
    }
}

impl Callback for ModelExport {
    fn name(&self) -> &str {
        "model_export"
    }

    fn on_train_end(&mut self, model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
        self.exported = false;
        self.metadata_embedded = false;

        model.load_state(&self.saved_model_path)?;
        model.to_device(Device::Cpu)?;
        model.eval();

        let input = Tensor::zeros(&self.input_shape);
        self.exporter.export(model, &input, &self.export_path, &self.options)?;
        self.exported = true;

        if self.verbose {
            tracing::info!(parent: &self.span, path = %self.export_path.display(), "Model saved to {}", self.export_path.display());
        }

        let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        match self.exporter.embed_metadata(&self.export_path, metadata) {
            Ok(()) => {
                self.metadata_embedded = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    parent: &self.span,
                    path = %self.export_path.display(),
                    error = %e,
                    "artifact exported without metadata"
                );
                Err(CallbackError::Metadata {
                    path: self.export_path.clone(),
                    source: Box::new(e),
                })
            }
        }
    }
}
