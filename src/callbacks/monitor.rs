//! The monitored-metric contract shared by the stateful observers.
//!
//! A [`Monitor`] names one scalar in the epoch [`Logs`], a [`Mode`] that says which
//! direction counts as better, and a `min_delta` margin applied on the improving
//! side only:
//!
//! | mode        | improvement iff      |
//! |-------------|----------------------|
//! | `min`       | `current <  best - d` |
//! | `max`       | `current >  best + d` |
//! | `min_equal` | `current <= best - d` |
//! | `max_equal` | `current >= best + d` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Span;

use crate::callbacks::logs::Logs;
use crate::error::{CallbackError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Min,
    Max,
    MinEqual,
    MaxEqual,
}

impl Mode {
    /// Starting best value; guarantees the first observation is an improvement.
    pub fn initial_best(self) -> f64 {
        match self {
            Mode::Min | Mode::MinEqual => f64::INFINITY,
            Mode::Max | Mode::MaxEqual => f64::NEG_INFINITY,
        }
    }

    pub fn is_improvement(self, current: f64, best: f64, min_delta: f64) -> bool {
        match self {
            Mode::Min => current < best - min_delta,
            Mode::Max => current > best + min_delta,
            Mode::MinEqual => current <= best - min_delta,
            Mode::MaxEqual => current >= best + min_delta,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Min => "min",
            Mode::Max => "max",
            Mode::MinEqual => "min_equal",
            Mode::MaxEqual => "max_equal",
        }
    }
}

impl FromStr for Mode {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "min" => Ok(Mode::Min),
            "max" => Ok(Mode::Max),
            "min_equal" => Ok(Mode::MinEqual),
            "max_equal" => Ok(Mode::MaxEqual),
            other => Err(CallbackError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which metric to watch and what counts as an improvement.
#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
    name: String,
    mode: Mode,
    min_delta: f64,
}

impl Monitor {
    pub fn new(name: impl Into<String>, mode: Mode, min_delta: f64) -> Result<Self> {
        if min_delta.is_nan() || min_delta < 0.0 {
            return Err(CallbackError::InvalidMinDelta(min_delta));
        }
        Ok(Self {
            name: name.into(),
            mode,
            min_delta,
        })
    }

    /// Monitor with no improvement margin.
    pub fn with_mode(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            min_delta: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn min_delta(&self) -> f64 {
        self.min_delta
    }

    pub fn initial_best(&self) -> f64 {
        self.mode.initial_best()
    }

    pub fn is_improvement(&self, current: f64, best: f64) -> bool {
        self.mode.is_improvement(current, best, self.min_delta)
    }

    /// Looks the monitored metric up in `logs`.
    ///
    /// A missing metric is not an error: a warning listing the available keys is
    /// emitted under `span` and `None` tells the caller to skip this step.
    pub fn value(&self, logs: &Logs, span: &Span) -> Option<f64> {
        let value = logs.get(&self.name);
        if value.is_none() {
            let available = logs.keys().collect::<Vec<_>>().join(",");
            tracing::warn!(
                parent: span,
                monitor = %self.name,
                available = %available,
                "monitored metric is not available, skipping"
            );
        }
        value
    }
}
