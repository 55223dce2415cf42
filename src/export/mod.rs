//! Export of a trained model into a portable interchange artifact.

pub mod graph;
pub mod json;

pub use graph::{Dim, Graph, InterchangeModel, MetadataProp};
pub use json::JsonExporter;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CallbackError, Result};
use crate::math::tensor::Tensor;
use crate::model::ModelHandle;

/// Operator-set versions the exporter knows how to describe.
pub const SUPPORTED_OPSETS: std::ops::RangeInclusive<u32> = 7..=21;

/// Flags for a single export call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Bake parameters into the graph as initializers; otherwise they become graph inputs.
    pub export_params: bool,
    pub opset_version: u32,
    pub do_constant_folding: bool,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    /// Value name → (axis → symbolic name) for axes whose length varies at inference.
    pub dynamic_axes: BTreeMap<String, BTreeMap<usize, String>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        let batch_axis = || BTreeMap::from([(0, "batch_size".to_string())]);
        Self {
            export_params: true,
            opset_version: 14,
            do_constant_folding: true,
            input_names: vec!["input".to_string()],
            output_names: vec!["output".to_string()],
            dynamic_axes: BTreeMap::from([
                ("input".to_string(), batch_axis()),
                ("output".to_string(), batch_axis()),
            ]),
        }
    }
}

impl ExportOptions {
    pub fn validate(&self, path: &Path) -> Result<()> {
        if !SUPPORTED_OPSETS.contains(&self.opset_version) {
            return Err(CallbackError::export(
                path,
                format!(
                    "opset {} is outside the supported range {}..={}",
                    self.opset_version,
                    SUPPORTED_OPSETS.start(),
                    SUPPORTED_OPSETS.end()
                ),
            ));
        }
        if self.input_names.is_empty() || self.output_names.is_empty() {
            return Err(CallbackError::export(path, "at least one input and one output name are required"));
        }
        Ok(())
    }
}

/// Turns a model into an interchange artifact and edits its metadata afterwards.
pub trait Exporter {
    /// Traces `model` on `input` and writes the artifact to `path`.
    ///
    /// Either the complete artifact is written or nothing is.
    fn export(&self, model: &mut dyn ModelHandle, input: &Tensor, path: &Path, options: &ExportOptions) -> Result<()>;

    /// Reopens the artifact at `path`, appends `metadata` records and saves it again.
    fn embed_metadata(&self, path: &Path, metadata: &BTreeMap<String, String>) -> Result<()>;
}
