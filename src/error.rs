//! Error types for ferrite-callbacks.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Device;

/// Errors raised by observers, the reference model and the training loop.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("unknown monitor mode `{0}`, please choose one of min, max, min_equal, max_equal")]
    InvalidMode(String),

    #[error("min_delta must be a non-negative number, got {0}")]
    InvalidMinDelta(f64),

    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: String, found: String },

    #[error("device {0} is not supported by this model")]
    UnsupportedDevice(Device),

    #[error("export to {} failed: {reason}", path.display())]
    Export { path: PathBuf, reason: String },

    /// Raised when re-embedding metadata fails; the exported artifact itself is intact.
    #[error("embedding metadata into {} failed: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: Box<CallbackError>,
    },

    #[error("parameter {0} holds a non-finite value and cannot be saved")]
    NonFiniteParameter(String),

    #[error("summary writer is closed")]
    WriterClosed,

    #[error("summary writer used before on_train_begin")]
    WriterNotOpen,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CallbackError {
    pub fn export(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CallbackError>;
