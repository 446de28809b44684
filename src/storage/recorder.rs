//! Session Recorder.
//!
//! File layout, one row per processed frame:
//!
//! ```text
//! 2024-03-01 14:02:07.113;0.7071;1.4142;V
//! ```
//!
//! Files are named `YYYY-MM-DD-<mode>.csv`. When that name is taken, `-1`, `-2`, ...
//! are appended until an unused name is found. The name is resolved once when the
//! session starts.

use crate::acquisition::scan_config::MeasurementMode;
use crate::acquisition::stats::Reading;
use crate::error::{AppResult, DaqError};
use chrono::{DateTime, Local, NaiveDate};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Row timestamp format, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Field delimiter.
pub const DELIMITER: u8 = b';';

/// File name for a session on `date` in `mode`, with an optional collision suffix.
pub fn session_file_name(date: NaiveDate, mode: MeasurementMode, suffix: Option<u32>) -> String {
    match suffix {
        None => format!("{}-{}.csv", date.format("%Y-%m-%d"), mode.label()),
        Some(n) => format!("{}-{}-{}.csv", date.format("%Y-%m-%d"), mode.label(), n),
    }
}

/// First unused session file path in `dir`.
pub fn resolve_session_path(dir: &Path, date: NaiveDate, mode: MeasurementMode) -> PathBuf {
    let base = dir.join(session_file_name(date, mode, None));
    if !base.exists() {
        return base;
    }
    (1u32..)
        .map(|n| dir.join(session_file_name(date, mode, Some(n))))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Fields of one row, in file order.
pub fn format_row(timestamp: &DateTime<Local>, readings: &[Reading], unit: &str) -> Vec<String> {
    let mut fields = Vec::with_capacity(readings.len() + 2);
    fields.push(timestamp.format(TIMESTAMP_FORMAT).to_string());
    fields.extend(readings.iter().map(|r| r.value.to_string()));
    fields.push(unit.to_string());
    fields
}

/// Appends rows to one session file.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    path: PathBuf,
}

impl SessionRecorder {
    /// Recorder for an already resolved path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve today's file for `mode` in `dir`.
    pub fn for_session(dir: &Path, date: NaiveDate, mode: MeasurementMode) -> Self {
        Self::new(resolve_session_path(dir, date, mode))
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file in append mode, write one row, and close it.
    ///
    /// The file is created on the first row.
    pub fn append(
        &self,
        timestamp: DateTime<Local>,
        readings: &[Reading],
        unit: &str,
    ) -> AppResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.persistence_error(e))?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        writer
            .write_record(format_row(&timestamp, readings, unit))
            .map_err(|e| self.persistence_error(e))?;
        writer.flush().map_err(|e| self.persistence_error(e))?;
        Ok(())
    }

    fn persistence_error(&self, err: impl std::fmt::Display) -> DaqError {
        DaqError::Persistence {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}
