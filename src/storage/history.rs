//! Read-back of recorded session files.

use crate::acquisition::scan_config::MeasurementMode;
use crate::error::{AppResult, DaqError};
use crate::storage::recorder::{DELIMITER, TIMESTAMP_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A session file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    /// Date encoded in the file name.
    pub date: NaiveDate,
    /// Mode encoded in the file name.
    pub mode: MeasurementMode,
    /// Collision suffix, `None` for the first session of the day.
    pub suffix: Option<u32>,
    /// Full path.
    pub path: PathBuf,
}

/// One parsed row.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRow {
    /// Row timestamp (local time, as written).
    pub timestamp: NaiveDateTime,
    /// Reading values in channel order.
    pub readings: Vec<f64>,
    /// Unit field.
    pub unit: String,
}

/// Parse `YYYY-MM-DD-<mode>[-<n>].csv`.
pub fn parse_file_name(name: &str) -> Option<(NaiveDate, MeasurementMode, Option<u32>)> {
    let stem = name.strip_suffix(".csv")?;
    let date = NaiveDate::parse_from_str(stem.get(..10)?, "%Y-%m-%d").ok()?;
    let rest = stem.get(10..)?.strip_prefix('-')?;

    // Mode labels never end in a number, so a trailing `-<digits>` is the suffix.
    let (label, suffix) = match rest.rsplit_once('-') {
        Some((label, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            (label, Some(n.parse().ok()?))
        }
        _ => (rest, None),
    };

    let mode = MeasurementMode::ALL
        .into_iter()
        .find(|mode| mode.label() == label)?;
    Some((date, mode, suffix))
}

/// Session files in `dir`, sorted by date, mode, then suffix.
///
/// Files whose names do not follow the session naming scheme are skipped.
pub fn list_sessions(dir: &Path) -> AppResult<Vec<SessionFile>> {
    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match parse_file_name(name) {
            Some((date, mode, suffix)) => sessions.push(SessionFile {
                date,
                mode,
                suffix,
                path: entry.path(),
            }),
            None => debug!(file = name, "Skipping non-session file"),
        }
    }

    sessions.sort_by(|a, b| {
        (a.date, a.mode.label(), a.suffix).cmp(&(b.date, b.mode.label(), b.suffix))
    });
    Ok(sessions)
}

/// Parse every row of a session file.
pub fn load_session(path: &Path) -> AppResult<Vec<RecordedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| DaqError::History(format!("{}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let record =
            record.map_err(|e| DaqError::History(format!("{} line {}: {}", path.display(), line, e)))?;
        rows.push(parse_row(&record).map_err(|message| {
            DaqError::History(format!("{} line {}: {}", path.display(), line, message))
        })?);
    }
    Ok(rows)
}

fn parse_row(record: &csv::StringRecord) -> Result<RecordedRow, String> {
    if record.len() < 2 {
        return Err(format!("expected at least 2 fields, found {}", record.len()));
    }

    let timestamp = NaiveDateTime::parse_from_str(&record[0], TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp '{}': {}", &record[0], e))?;
    let unit = record[record.len() - 1].to_string();
    let readings = record
        .iter()
        .skip(1)
        .take(record.len() - 2)
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| format!("bad reading '{}'", field))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RecordedRow {
        timestamp,
        readings,
        unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_session_file_names() {
        let (date, mode, suffix) = parse_file_name("2024-03-01-voltage.csv").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(mode, MeasurementMode::Voltage);
        assert_eq!(suffix, None);

        let (_, mode, suffix) = parse_file_name("2024-03-01-angular_velocity-12.csv").unwrap();
        assert_eq!(mode, MeasurementMode::AngularVelocity);
        assert_eq!(suffix, Some(12));
    }

    #[test]
    fn rejects_foreign_names() {
        assert!(parse_file_name("notes.csv").is_none());
        assert!(parse_file_name("2024-03-01-voltage.txt").is_none());
        assert!(parse_file_name("2024-13-01-voltage.csv").is_none());
        assert!(parse_file_name("2024-03-01-volts.csv").is_none());
    }

    #[test]
    fn lists_sessions_in_order() {
        let dir = tempdir().unwrap();
        for name in [
            "2024-03-02-voltage.csv",
            "2024-03-01-voltage-1.csv",
            "2024-03-01-voltage.csv",
            "2024-03-01-current.csv",
            "readme.md",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let names: Vec<String> = list_sessions(dir.path())
            .unwrap()
            .into_iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "2024-03-01-current.csv",
                "2024-03-01-voltage.csv",
                "2024-03-01-voltage-1.csv",
                "2024-03-02-voltage.csv",
            ]
        );
    }

    #[test]
    fn loads_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2024-03-01-power.csv");
        std::fs::write(
            &path,
            "2024-03-01 14:02:07.113;9;4.5;W\n2024-03-01 14:02:07.213;8;W\n",
        )
        .unwrap();

        let rows = load_session(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].readings, vec![9.0, 4.5]);
        assert_eq!(rows[0].unit, "W");
        assert_eq!(rows[1].readings, vec![8.0]);
        assert_eq!(
            rows[0].timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "2024-03-01 14:02:07.113"
        );
    }

    #[test]
    fn malformed_row_names_the_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("2024-03-01-voltage.csv");
        std::fs::write(&path, "2024-03-01 14:02:07.113;1;V\nyesterday;1;V\n").unwrap();

        let err = load_session(&path).unwrap_err();
        assert!(matches!(err, DaqError::History(_)));
        assert!(err.to_string().contains("line 2"));
    }
}
