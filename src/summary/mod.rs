//! Visualization sink: scalar series and histograms keyed by step.

pub mod histogram;
pub mod writer;

pub use histogram::Histogram;
pub use writer::{Event, EventValue, EventWriter};

use crate::error::Result;

pub trait SummarySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;

    fn add_histogram(&mut self, tag: &str, values: &[f64], step: usize) -> Result<()>;

    /// Flushes and releases the sink. Writes after this fail.
    fn close(&mut self) -> Result<()>;
}
