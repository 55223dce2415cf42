use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{CallbackError, Result};
use crate::export::graph::{Dim, Graph, InterchangeModel, MetadataProp, ValueInfo};
use crate::export::{ExportOptions, Exporter};
use crate::math::tensor::Tensor;
use crate::model::ModelHandle;

const IR_VERSION: u32 = 8;
const PRODUCER_NAME: &str = "ferrite-callbacks";

/// Writes [`InterchangeModel`] documents as pretty JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl JsonExporter {
    pub fn load(path: &Path) -> Result<InterchangeModel> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Applies the export flags to a freshly traced graph.
    fn shape_graph(&self, mut graph: Graph, path: &Path, options: &ExportOptions) -> Result<Graph> {
        rename_positional(&mut graph, true, &options.input_names, path)?;
        rename_positional(&mut graph, false, &options.output_names, path)?;

        if options.do_constant_folding {
            fold_identities(&mut graph);
        }

        if !options.export_params {
            let params = std::mem::take(&mut graph.initializers);
            graph
                .inputs
                .extend(params.into_iter().map(|init| ValueInfo::fixed(init.name, &init.dims)));
        }

        for (name, axes) in &options.dynamic_axes {
            let Some(value) = graph.inputs.iter_mut().chain(graph.outputs.iter_mut()).find(|v| v.name == *name) else {
                tracing::warn!(value = %name, "dynamic axes given for a value the graph does not have");
                continue;
            };
            for (&axis, label) in axes {
                let rank = value.shape.len();
                let dim = value.shape.get_mut(axis).ok_or_else(|| {
                    CallbackError::export(path, format!("axis {axis} of `{name}` is out of range for rank {rank}"))
                })?;
                *dim = Dim::Symbolic(label.clone());
            }
        }

        Ok(graph)
    }
}

impl Exporter for JsonExporter {
    fn export(&self, model: &mut dyn ModelHandle, input: &Tensor, path: &Path, options: &ExportOptions) -> Result<()> {
        options.validate(path)?;
        let traced = model
            .trace(input)
            .map_err(|e| CallbackError::export(path, format!("tracing failed: {e}")))?;
        let graph = self.shape_graph(traced, path, options)?;

        let artifact = InterchangeModel {
            ir_version: IR_VERSION,
            producer_name: PRODUCER_NAME.to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            opset_version: options.opset_version,
            graph,
            metadata_props: Vec::new(),
        };
        atomic_write_json(path, &artifact)
            .map_err(|e| CallbackError::export(path, format!("writing artifact failed: {e}")))
    }

    fn embed_metadata(&self, path: &Path, metadata: &BTreeMap<String, String>) -> Result<()> {
        let mut artifact = Self::load(path)?;
        artifact.metadata_props.extend(metadata.iter().map(|(key, value)| MetadataProp {
            key: key.clone(),
            value: value.clone(),
        }));
        atomic_write_json(path, &artifact)
    }
}

/// Renames the traced `input`/`output` values (and any further positional ones) to
/// the caller's names.
fn rename_positional(graph: &mut Graph, inputs: bool, names: &[String], path: &Path) -> Result<()> {
    let values = if inputs { &graph.inputs } else { &graph.outputs };
    let current: Vec<String> = values.iter().map(|v| v.name.clone()).collect();
    if names.len() > current.len() {
        let kind = if inputs { "input" } else { "output" };
        return Err(CallbackError::export(
            path,
            format!("{} {kind} names given but the graph has {} {kind}s", names.len(), current.len()),
        ));
    }
    for (from, to) in current.iter().zip(names) {
        graph.rename_value(from, to);
    }
    Ok(())
}

/// Removes `Identity` nodes, wiring their consumers straight to the producer.
fn fold_identities(graph: &mut Graph) {
    let is_graph_value = |g: &Graph, name: &str| {
        g.inputs.iter().chain(&g.outputs).any(|v| v.name == name)
    };

    while let Some(idx) = graph.nodes.iter().position(|n| {
        n.op_type == "Identity"
            && n.inputs.len() == 1
            && n.outputs.len() == 1
            && !(is_graph_value(graph, &n.inputs[0]) && is_graph_value(graph, &n.outputs[0]))
    }) {
        let node = graph.nodes.remove(idx);
        let (src, dst) = (&node.inputs[0], &node.outputs[0]);
        if graph.outputs.iter().any(|v| v.name == *dst) {
            // keep the public output name, let the producer write it directly
            graph.rename_value(src, dst);
        } else {
            graph.rename_value(dst, src);
        }
    }
}

/// Writes to a `.tmp` sibling, then renames over `path`.
fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    let json = serde_json::to_vec_pretty(value)?;
    let written = fs::write(&tmp, json).and_then(|()| fs::rename(&tmp, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(written?)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::loss::loss_type::LossType;
    use crate::model::Trainable;
    use crate::network::network::Network;
    use crate::optim::sgd::Sgd;

    fn model(hidden: ActivationFunction) -> Trainable {
        let network = Network::new(vec![(3, 2, hidden), (1, 3, ActivationFunction::Identity)]);
        Trainable::new(network, Sgd::new(0.1), LossType::Mse)
    }

    #[test]
    fn default_export_marks_batch_axis_dynamic_and_folds_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        JsonExporter
            .export(&mut model(ActivationFunction::Tanh), &Tensor::zeros(&[1, 2]), &path, &ExportOptions::default())
            .unwrap();

        let artifact = JsonExporter::load(&path).unwrap();
        assert_eq!(artifact.opset_version, 14);
        assert!(artifact.metadata_props.is_empty());
        let graph = artifact.graph;
        assert_eq!(graph.inputs[0].shape, vec![Dim::Symbolic("batch_size".into()), Dim::Fixed(2)]);
        assert_eq!(graph.outputs[0].shape, vec![Dim::Symbolic("batch_size".into()), Dim::Fixed(1)]);

        let ops: Vec<&str> = graph.nodes.iter().map(|n| n.op_type.as_str()).collect();
        assert_eq!(ops, ["Gemm", "Tanh", "Gemm"]);
        assert_eq!(graph.nodes[2].outputs, ["output"]);
        assert_eq!(graph.initializers.len(), 4);
    }

    #[test]
    fn flags_rename_and_lift_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        let options = ExportOptions {
            export_params: false,
            do_constant_folding: false,
            input_names: vec!["features".into()],
            output_names: vec!["score".into()],
            dynamic_axes: BTreeMap::new(),
            ..ExportOptions::default()
        };
        JsonExporter
            .export(&mut model(ActivationFunction::ReLU), &Tensor::zeros(&[4, 2]), &path, &options)
            .unwrap();

        let graph = JsonExporter::load(&path).unwrap().graph;
        assert!(graph.initializers.is_empty());
        let inputs: Vec<&str> = graph.inputs.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(inputs, ["features", "layers.0.weight", "layers.0.bias", "layers.1.weight", "layers.1.bias"]);
        assert_eq!(graph.inputs[0].shape, vec![Dim::Fixed(4), Dim::Fixed(2)]);
        assert_eq!(graph.outputs[0].name, "score");
        assert_eq!(graph.nodes.last().unwrap().op_type, "Identity");
        assert_eq!(graph.nodes[0].inputs[0], "features");
    }

    #[test]
    fn failed_trace_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        let err = JsonExporter
            .export(&mut model(ActivationFunction::ReLU), &Tensor::zeros(&[1, 7]), &path, &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, CallbackError::Export { .. }));
        assert!(!path.exists());
        assert!(!tmp_sibling(&path).exists());
    }

    #[test]
    fn unsupported_opset_is_rejected() {
        let options = ExportOptions { opset_version: 3, ..ExportOptions::default() };
        assert!(options.validate(Path::new("m.onnx")).is_err());
    }

    #[test]
    fn out_of_range_dynamic_axis_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions {
            dynamic_axes: BTreeMap::from([("input".to_string(), BTreeMap::from([(5, "seq".to_string())]))]),
            ..ExportOptions::default()
        };
        let result = JsonExporter.export(
            &mut model(ActivationFunction::ReLU),
            &Tensor::zeros(&[1, 2]),
            &dir.path().join("m.onnx"),
            &options,
        );
        assert!(matches!(result, Err(CallbackError::Export { .. })));
    }

    #[test]
    fn metadata_is_appended_on_resave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        JsonExporter
            .export(&mut model(ActivationFunction::ReLU), &Tensor::zeros(&[1, 2]), &path, &ExportOptions::default())
            .unwrap();
        let metadata = BTreeMap::from([("author".to_string(), "x".to_string())]);
        JsonExporter.embed_metadata(&path, &metadata).unwrap();

        let artifact = JsonExporter::load(&path).unwrap();
        assert_eq!(artifact.metadata("author"), Some("x"));
        assert_eq!(artifact.graph.nodes.len(), 3);
    }
}
