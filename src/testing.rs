//! Recording doubles shared by the unit tests.

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::error::{CallbackError, Result};
use crate::export::graph::{Graph, ValueInfo};
use crate::math::tensor::Tensor;
use crate::model::{Device, ModelHandle};
use crate::optim::sgd::ParamGroup;
use crate::summary::SummarySink;

/// A `ModelHandle` that records calls instead of touching the filesystem.
pub struct RecordingModel {
    pub training: bool,
    pub stop: bool,
    pub device: Device,
    pub saved_paths: RefCell<Vec<PathBuf>>,
    pub loaded_paths: Vec<PathBuf>,
    pub params: Vec<(String, Vec<f64>)>,
    pub groups: Vec<ParamGroup>,
}

impl Default for RecordingModel {
    fn default() -> Self {
        Self {
            training: true,
            stop: false,
            device: Device::Cpu,
            saved_paths: RefCell::new(Vec::new()),
            loaded_paths: Vec::new(),
            params: vec![
                ("layers.0.weight".to_string(), vec![0.1, -0.2]),
                ("layers.0.bias".to_string(), vec![0.0]),
            ],
            groups: vec![ParamGroup { lr: 0.1, layers: Vec::new() }],
        }
    }
}

impl ModelHandle for RecordingModel {
    fn save(&self, path: &Path) -> Result<()> {
        self.saved_paths.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn load_state(&mut self, path: &Path) -> Result<()> {
        self.loaded_paths.push(path.to_path_buf());
        Ok(())
    }

    fn to_device(&mut self, device: Device) -> Result<()> {
        self.device = device;
        Ok(())
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_stop_training(&mut self, stop: bool) {
        self.stop = stop;
    }

    fn stop_training(&self) -> bool {
        self.stop
    }

    fn named_parameters(&self) -> Vec<(String, Vec<f64>)> {
        self.params.clone()
    }

    fn param_groups(&self) -> Vec<ParamGroup> {
        self.groups.clone()
    }

    fn trace(&mut self, input: &Tensor) -> Result<Graph> {
        let batch = *input
            .shape
            .first()
            .ok_or_else(|| CallbackError::shape_mismatch("a batch axis", "a scalar"))?;
        Ok(Graph {
            name: "recording".into(),
            nodes: Vec::new(),
            inputs: vec![ValueInfo::fixed("input", &input.shape)],
            outputs: vec![ValueInfo::fixed("output", &[batch, 1])],
            initializers: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Scalar(String, f64, usize),
    /// Tag, number of values, step.
    Histogram(String, usize, usize),
    Close,
}

/// A `SummarySink` that appends every call to a shared log.
pub struct RecordingSink {
    events: Rc<RefCell<Vec<SinkEvent>>>,
    closed: bool,
}

impl RecordingSink {
    pub fn new(events: Rc<RefCell<Vec<SinkEvent>>>) -> Self {
        Self { events, closed: false }
    }
}

impl SummarySink for RecordingSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        if self.closed {
            return Err(CallbackError::WriterClosed);
        }
        self.events.borrow_mut().push(SinkEvent::Scalar(tag.to_string(), value, step));
        Ok(())
    }

    fn add_histogram(&mut self, tag: &str, values: &[f64], step: usize) -> Result<()> {
        if self.closed {
            return Err(CallbackError::WriterClosed);
        }
        self.events.borrow_mut().push(SinkEvent::Histogram(tag.to_string(), values.len(), step));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.events.borrow_mut().push(SinkEvent::Close);
        }
        Ok(())
    }
}

/// Shared buffer a test subscriber writes formatted events into.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes `info!` and above on the current thread into a buffer until the guard drops.
///
/// Install it before constructing observers so their spans belong to this subscriber.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
