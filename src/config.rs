//! File-driven run configuration.
//!
//! A run is one JSON document: the network architecture, training
//! hyperparameters, the dataset, and an ordered list of observers.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::callbacks::{CallbackList, EarlyStopping, ModelCheckpoint, ModelExport, Monitor, TensorBoard};
use crate::error::{CallbackError, Result};
use crate::export::ExportOptions;
use crate::model::Trainable;
use crate::network::NetworkSpec;
use crate::optim::sgd::Sgd;
use crate::train::{Dataset, TrainConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub network: NetworkSpec,
    #[serde(default)]
    pub train: TrainSettings,
    #[serde(default)]
    pub dataset: DatasetSpec,
    /// Held-out set for `val_*` metrics; omitted means no validation pass.
    #[serde(default)]
    pub validation: Option<DatasetSpec>,
    /// Observers, notified in this order.
    #[serde(default)]
    pub callbacks: Vec<CallbackSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainSettings {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub shuffle: bool,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 4,
            learning_rate: 0.5,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSpec {
    #[default]
    Xor,
    Inline(Dataset),
}

impl DatasetSpec {
    pub fn load(&self) -> Result<Dataset> {
        match self {
            DatasetSpec::Xor => Ok(Dataset::xor()),
            DatasetSpec::Inline(ds) => Dataset::new(ds.inputs.clone(), ds.labels.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackSpec {
    EarlyStopping(EarlyStoppingSpec),
    ModelCheckpoint(CheckpointSpec),
    TensorBoard(TensorBoardSpec),
    ModelExport(ExportSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingSpec {
    pub monitor: String,
    pub min_delta: f64,
    pub patience: usize,
    pub verbose: bool,
    pub mode: String,
}

impl Default for EarlyStoppingSpec {
    fn default() -> Self {
        Self {
            monitor: "val_loss".to_string(),
            min_delta: 0.0,
            patience: 0,
            verbose: false,
            mode: "max_equal".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSpec {
    pub filepath: PathBuf,
    pub monitor: String,
    pub min_delta: f64,
    pub mode: String,
    pub save_best_only: bool,
    pub verbose: bool,
}

impl Default for CheckpointSpec {
    fn default() -> Self {
        Self {
            filepath: PathBuf::from("checkpoints/model.json"),
            monitor: "val_loss".to_string(),
            min_delta: 0.0,
            mode: "min".to_string(),
            save_best_only: true,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensorBoardSpec {
    pub log_dir: PathBuf,
    pub comment: Option<String>,
}

impl Default for TensorBoardSpec {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSpec {
    pub saved_model_path: PathBuf,
    /// Dummy input shape; empty means `[1, <network input size>]`.
    pub input_shape: Vec<usize>,
    pub verbose: bool,
    pub metadata: BTreeMap<String, String>,
    pub export_params: bool,
    pub opset_version: u32,
    pub do_constant_folding: bool,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    /// Value name → (axis → symbolic name). Axis keys are decimal strings in JSON.
    pub dynamic_axes: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ExportSpec {
    fn default() -> Self {
        let options = ExportOptions::default();
        Self {
            saved_model_path: PathBuf::from("checkpoints/model.json"),
            input_shape: Vec::new(),
            verbose: false,
            metadata: BTreeMap::new(),
            export_params: options.export_params,
            opset_version: options.opset_version,
            do_constant_folding: options.do_constant_folding,
            input_names: options.input_names,
            output_names: options.output_names,
            dynamic_axes: options
                .dynamic_axes
                .into_iter()
                .map(|(name, axes)| (name, axes.into_iter().map(|(axis, label)| (axis.to_string(), label)).collect()))
                .collect(),
        }
    }
}

impl ExportSpec {
    pub fn options(&self) -> Result<ExportOptions> {
        let mut dynamic_axes = BTreeMap::new();
        for (name, axes) in &self.dynamic_axes {
            let mut parsed = BTreeMap::new();
            for (axis, label) in axes {
                let axis: usize = axis.parse().map_err(|_| {
                    CallbackError::Config(format!("dynamic axis `{axis}` of `{name}` is not an axis index"))
                })?;
                parsed.insert(axis, label.clone());
            }
            dynamic_axes.insert(name.clone(), parsed);
        }
        Ok(ExportOptions {
            export_params: self.export_params,
            opset_version: self.opset_version,
            do_constant_folding: self.do_constant_folding,
            input_names: self.input_names.clone(),
            output_names: self.output_names.clone(),
            dynamic_axes,
        })
    }
}

impl RunConfig {
    pub fn load_json(path: &Path) -> Result<RunConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: RunConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        if self.train.batch_size == 0 {
            return Err(CallbackError::Config("train.batch_size must be at least 1".into()));
        }
        if self.train.learning_rate.is_nan() || self.train.learning_rate <= 0.0 {
            return Err(CallbackError::Config(format!(
                "train.learning_rate must be positive, got {}",
                self.train.learning_rate
            )));
        }
        if let (Some(first), Some(last)) = (self.network.layers.first(), self.network.layers.last()) {
            for dataset in std::iter::once(&self.dataset).chain(self.validation.as_ref()) {
                dataset.load()?.check_widths(first.input_size, last.size)?;
            }
        }
        Ok(())
    }

    pub fn build_model(&self) -> Result<Trainable> {
        let network = self.network.build()?;
        Ok(Trainable::new(network, Sgd::new(self.train.learning_rate), self.network.loss))
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            epochs: self.train.epochs,
            batch_size: self.train.batch_size,
            shuffle: self.train.shuffle,
        }
    }

    /// Instantiates every configured observer in file order.
    pub fn build_callbacks(&self) -> Result<CallbackList> {
        let mut list = CallbackList::new();
        for spec in &self.callbacks {
            match spec {
                CallbackSpec::EarlyStopping(s) => {
                    let monitor = Monitor::new(&s.monitor, s.mode.parse()?, s.min_delta)?;
                    list.push(EarlyStopping::new(monitor).patience(s.patience).verbose(s.verbose));
                }
                CallbackSpec::ModelCheckpoint(s) => {
                    let monitor = Monitor::new(&s.monitor, s.mode.parse()?, s.min_delta)?;
                    list.push(
                        ModelCheckpoint::new(&s.filepath, monitor)
                            .save_best_only(s.save_best_only)
                            .verbose(s.verbose),
                    );
                }
                CallbackSpec::TensorBoard(s) => {
                    let mut tb = TensorBoard::new(&s.log_dir);
                    if let Some(comment) = &s.comment {
                        tb = tb.comment(comment);
                    }
                    list.push(tb);
                }
                CallbackSpec::ModelExport(s) => {
                    let input_shape = if s.input_shape.is_empty() {
                        vec![1, self.network.layers.first().map_or(0, |l| l.input_size)]
                    } else {
                        s.input_shape.clone()
                    };
                    list.push(
                        ModelExport::new(&s.saved_model_path, &input_shape)
                            .options(s.options()?)
                            .metadata(s.metadata.clone())
                            .verbose(s.verbose),
                    );
                }
            }
        }
        Ok(list)
    }
}
