//! Output sink for flushed totals: one `<timestamp>: <hits>/<misses>` line per flush.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Timestamp layout for result lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f %z";

/// Totals for one flush window.
#[derive(Clone, Debug, PartialEq)]
pub struct FlushRecord {
    pub timestamp: DateTime<Local>,
    pub success: u64,
    pub failure: u64,
    /// Final unconditional flush after the last worker reported.
    pub drain: bool,
}

impl FlushRecord {
    pub fn now(success: u64, failure: u64, drain: bool) -> Self {
        Self {
            timestamp: Local::now(),
            success,
            failure,
            drain,
        }
    }

    /// Render as a results line, newline included.
    pub fn to_line(&self) -> String {
        format_result_line(&self.timestamp, self.success, self.failure)
    }
}

/// `<timestamp>: <success>/<failure>\n`
pub fn format_result_line(timestamp: &DateTime<Local>, success: u64, failure: u64) -> String {
    format!(
        "{}: {}/{}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        success,
        failure
    )
}

/// Sequential destination for flushed totals. Only the aggregator writes to it.
/// An `Err` is fatal to the run: totals are never dropped silently.
pub trait ResultSink: Send {
    fn write_flush(&mut self, record: &FlushRecord) -> Result<()>;
}

/// Append-only results file. Created if missing; existing lines are kept.
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open results file {} for appending", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for FileSink {
    fn write_flush(&mut self, record: &FlushRecord) -> Result<()> {
        self.file
            .write_all(record.to_line().as_bytes())
            .and_then(|()| self.file.flush())
            .with_context(|| format!("write results to {}", self.path.display()))
    }
}

/// In-memory sink; keeps every record. Useful when embedding the pipeline.
impl ResultSink for Vec<FlushRecord> {
    fn write_flush(&mut self, record: &FlushRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}
