use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CallbackError, Result};
use crate::summary::histogram::Histogram;
use crate::summary::SummarySink;

const FILE_VERSION: &str = "ferrite.Event:1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventValue {
    FileVersion(String),
    Scalar(f64),
    Histogram(Histogram),
}

/// One line of an event file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch.
    pub wall_time: f64,
    pub step: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(flatten)]
    pub value: EventValue,
}

/// Writes summary events as JSON lines to
/// `<log_dir>/events.out.<secs>.<pid>[.<n>][.<comment>].jsonl`.
///
/// Every writer gets a file of its own; `<n>` is added when another writer in the
/// same process already claimed the name this second.
pub struct EventWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl EventWriter {
    pub fn create(log_dir: &Path, comment: Option<&str>) -> Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let stem = format!("events.out.{}.{}", Utc::now().timestamp(), std::process::id());
        let suffix = match comment.filter(|c| !c.is_empty()) {
            Some(comment) => format!(".{comment}.jsonl"),
            None => ".jsonl".to_string(),
        };

        let mut attempt = 0u32;
        let (path, file) = loop {
            let name = match attempt {
                0 => format!("{stem}{suffix}"),
                n => format!("{stem}.{n}{suffix}"),
            };
            let path = log_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        };

        let mut writer = Self {
            path,
            out: Some(BufWriter::new(file)),
        };
        writer.write_event(String::new(), 0, EventValue::FileVersion(FILE_VERSION.to_string()))?;
        tracing::debug!(path = %writer.path.display(), "opened event file");
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.out.is_none()
    }

    /// Reads every event back from a file written by an `EventWriter`.
    pub fn read_events(path: &Path) -> Result<Vec<Event>> {
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    fn write_event(&mut self, tag: String, step: usize, value: EventValue) -> Result<()> {
        let out = self.out.as_mut().ok_or(CallbackError::WriterClosed)?;
        let event = Event {
            wall_time: Utc::now().timestamp_millis() as f64 / 1000.0,
            step,
            tag,
            value,
        };
        serde_json::to_writer(&mut *out, &event)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl SummarySink for EventWriter {
    /// NaN and infinities have no JSON form; they are logged and dropped.
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        if !value.is_finite() {
            tracing::warn!(tag, value, step, "skipping non-finite scalar");
            return if self.is_closed() { Err(CallbackError::WriterClosed) } else { Ok(()) };
        }
        self.write_event(tag.to_string(), step, EventValue::Scalar(value))
    }

    fn add_histogram(&mut self, tag: &str, values: &[f64], step: usize) -> Result<()> {
        self.write_event(tag.to_string(), step, EventValue::Histogram(Histogram::from_values(values)))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventWriter {
    fn drop(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
    }
}
