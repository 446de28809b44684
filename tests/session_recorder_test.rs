//! Session Recorder and history integration tests
//!
//! Writes sessions through the recorder and reads them back through the history API.

use chrono::{Local, NaiveDate, Timelike};
use energy_daq::acquisition::stats::Reading;
use energy_daq::acquisition::MeasurementMode;
use energy_daq::error::DaqError;
use energy_daq::storage::recorder::{resolve_session_path, SessionRecorder};
use energy_daq::storage::{list_sessions, load_session};
use tempfile::tempdir;

fn readings(values: &[f64]) -> Vec<Reading> {
    values
        .iter()
        .enumerate()
        .map(|(channel, &value)| Reading {
            channel: channel as u8,
            value,
        })
        .collect()
}

#[test]
fn recorded_rows_load_back() {
    let dir = tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    let recorder = SessionRecorder::for_session(dir.path(), date, MeasurementMode::Torque);

    let timestamp = Local::now();
    recorder
        .append(timestamp, &readings(&[0.125, -3.5]), MeasurementMode::Torque.unit())
        .unwrap();
    recorder
        .append(timestamp, &readings(&[1e-6, 42.0]), MeasurementMode::Torque.unit())
        .unwrap();

    let rows = load_session(recorder.path()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].readings, vec![0.125, -3.5]);
    assert_eq!(rows[1].readings, vec![1e-6, 42.0]);
    assert_eq!(rows[0].unit, "Nm");

    // Millisecond precision survives the round trip.
    let written = timestamp.naive_local();
    assert_eq!(rows[0].timestamp.date(), written.date());
    assert_eq!(
        rows[0].timestamp.nanosecond() / 1_000_000,
        written.nanosecond() / 1_000_000
    );
}

#[test]
fn sessions_on_the_same_day_are_listed_in_suffix_order() {
    let dir = tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();

    for _ in 0..3 {
        let recorder = SessionRecorder::for_session(dir.path(), date, MeasurementMode::Current);
        recorder.append(Local::now(), &readings(&[1.0]), "A").unwrap();
    }

    let sessions = list_sessions(dir.path()).unwrap();
    let suffixes: Vec<Option<u32>> = sessions.iter().map(|s| s.suffix).collect();
    assert_eq!(suffixes, vec![None, Some(1), Some(2)]);
    assert!(sessions.iter().all(|s| s.mode == MeasurementMode::Current));
    assert!(sessions.iter().all(|s| s.date == date));
}

#[test]
fn path_is_fixed_once_resolved() {
    let dir = tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
    let recorder = SessionRecorder::for_session(dir.path(), date, MeasurementMode::Voltage);

    recorder.append(Local::now(), &readings(&[1.0]), "V").unwrap();
    recorder.append(Local::now(), &readings(&[2.0]), "V").unwrap();

    // The session keeps writing to its own file even though the base name now exists.
    assert!(recorder.path().ends_with("2024-05-17-voltage.csv"));
    assert_eq!(load_session(recorder.path()).unwrap().len(), 2);
    assert!(resolve_session_path(dir.path(), date, MeasurementMode::Voltage)
        .ends_with("2024-05-17-voltage-1.csv"));
}

#[test]
fn unreadable_session_is_a_history_error() {
    let dir = tempdir().unwrap();
    let err = load_session(&dir.path().join("2024-05-17-voltage.csv")).unwrap_err();
    assert!(matches!(err, DaqError::History(_)));
}

#[test]
fn listing_a_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let err = list_sessions(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, DaqError::Io(_)));
}
