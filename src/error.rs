//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the failures that can occur while configuring a scan, reading from the device,
//! and persisting rows.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type mismatches
//!   in the configuration sources.
//! - **`InvalidConfiguration`**: A session was refused before anything was touched. The
//!   concrete reason is carried as a [`ConfigRejection`].
//! - **`HardwareOverrun`** / **`BufferOverrun`**: The device reported data loss. Fatal to the
//!   current session only.
//! - **`EmptyFrame`**: A read returned fewer samples than one complete time step. The loop
//!   treats this as "no data this tick".
//! - **`Persistence`**: A row could not be appended to the session file. Sampling continues.
//! - **`Device`**: Any other failure reported through the device boundary. Handled like an
//!   overrun (hard stop).
//! - **`History`**: A recorded session file could not be parsed back.
//!
//! A crest factor over an all-zero series is *not* an error; it is represented as
//! [`crate::acquisition::stats::Metric::Undefined`].

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(ConfigRejection),

    #[error("Hardware overrun: samples were produced faster than the device could hold them")]
    HardwareOverrun,

    #[error("Buffer overrun: the scan buffer filled before it was read")]
    BufferOverrun,

    #[error("Empty frame: {samples} samples cannot form a time step across {channels} channels")]
    EmptyFrame { samples: usize, channels: usize },

    #[error("Failed to persist row to '{}': {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("Device error: {0}")]
    Device(String),

    #[error("Session history error: {0}")]
    History(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason a session start (or a settings file) was refused.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigRejection {
    #[error("channel mask selects no channels")]
    EmptyMask,

    #[error("sample count {value} outside {min}..={max}")]
    SampleCountOutOfRange { value: u32, min: u32, max: u32 },

    #[error("scan rate {value} Hz outside {min}..={max} Hz")]
    ScanRateOutOfRange { value: f64, min: f64, max: f64 },

    #[error("{name} multiplier must be a positive finite number, got {value}")]
    NonPositiveMultiplier { name: &'static str, value: f64 },

    #[error("power mode needs at least one enabled voltage/current pair (channels 2k and 2k+1), mask is {mask:#010b}")]
    NoPowerPair { mask: u8 },

    #[error("a session is already active")]
    AlreadyActive,

    #[error("{0}")]
    Settings(String),
}

impl From<ConfigRejection> for DaqError {
    fn from(value: ConfigRejection) -> Self {
        DaqError::InvalidConfiguration(value)
    }
}

impl DaqError {
    /// Errors that terminate the running session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DaqError::HardwareOverrun | DaqError::BufferOverrun | DaqError::Device(_)
        )
    }

    /// Errors the acquisition loop reports and then continues past.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DaqError::EmptyFrame { .. } | DaqError::Persistence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overruns_are_fatal() {
        assert!(DaqError::HardwareOverrun.is_fatal());
        assert!(DaqError::BufferOverrun.is_fatal());
        assert!(DaqError::Device("read failed".into()).is_fatal());
        assert!(!DaqError::HardwareOverrun.is_recoverable());
    }

    #[test]
    fn frame_and_persistence_errors_are_recoverable() {
        let empty = DaqError::EmptyFrame {
            samples: 1,
            channels: 2,
        };
        let persist = DaqError::Persistence {
            path: PathBuf::from("2024-01-01-voltage.csv"),
            message: "disk full".into(),
        };
        assert!(empty.is_recoverable());
        assert!(persist.is_recoverable());
        assert!(!persist.is_fatal());
    }

    #[test]
    fn rejection_converts_into_invalid_configuration() {
        let err: DaqError = ConfigRejection::EmptyMask.into();
        assert!(matches!(
            err,
            DaqError::InvalidConfiguration(ConfigRejection::EmptyMask)
        ));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: channel mask selects no channels"
        );
    }

    #[test]
    fn no_power_pair_message_shows_mask_bits() {
        let err = ConfigRejection::NoPowerPair { mask: 0b0000_0101 };
        assert!(err.to_string().contains("0b00000101"));
    }
}
