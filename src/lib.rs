//! # Energy DAQ Core Library
//!
//! Streaming acquisition for multi-channel energy measurements. A scan device samples
//! up to eight analog channels; each read is demultiplexed into per-channel series,
//! reduced to statistics and engineering values, appended to a per-session CSV file,
//! and pushed to a [`acquisition::Reporter`].
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: Channel mask codec, frame demultiplexer, statistics engine,
//!   session state machine and the acquisition loop itself.
//! - **`hardware`**: The [`hardware::ScanDevice`] boundary and simulated devices.
//! - **`storage`**: Session Recorder and read-back of recorded sessions.
//! - **`config`**: Figment-backed settings (TOML file + environment).
//! - **`error`**: The crate-wide `DaqError` enum.
//! - **`tracing_setup`**: Subscriber initialisation.
//! - **`validation`**: Small validators shared by the configuration checks.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hardware;
pub mod storage;
pub mod tracing_setup;
pub mod validation;
