//! Interchange graph: the framework-independent description of a traced model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One axis of a graph input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Fixed(usize),
    /// Axis whose length is only known at inference time, e.g. `batch_size`.
    Symbolic(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub name: String,
    pub shape: Vec<Dim>,
}

impl ValueInfo {
    pub fn fixed(name: impl Into<String>, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            shape: shape.iter().copied().map(Dim::Fixed).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, f64>,
}

/// A constant tensor baked into the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initializer {
    pub name: String,
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
}

/// Result of tracing a model on an example input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    pub nodes: Vec<Node>,
    pub inputs: Vec<ValueInfo>,
    pub outputs: Vec<ValueInfo>,
    #[serde(default)]
    pub initializers: Vec<Initializer>,
}

impl Graph {
    /// Renames a value everywhere it is produced or consumed.
    pub fn rename_value(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let rename = |name: &mut String| {
            if name == from {
                *name = to.to_string();
            }
        };
        for node in &mut self.nodes {
            node.inputs.iter_mut().for_each(rename);
            node.outputs.iter_mut().for_each(rename);
        }
        self.inputs.iter_mut().for_each(|v| rename(&mut v.name));
        self.outputs.iter_mut().for_each(|v| rename(&mut v.name));
        self.initializers.iter_mut().for_each(|i| rename(&mut i.name));
    }
}

/// `key`/`value` record stored alongside the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataProp {
    pub key: String,
    pub value: String,
}

/// The serialized interchange artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeModel {
    pub ir_version: u32,
    pub producer_name: String,
    pub producer_version: String,
    pub opset_version: u32,
    pub graph: Graph,
    #[serde(default)]
    pub metadata_props: Vec<MetadataProp>,
}

impl InterchangeModel {
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata_props
            .iter()
            .rev()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}
