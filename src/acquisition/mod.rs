//! Streaming acquisition pipeline.
//!
//! - [`mask`] decodes the channel selection
//! - [`demux`] splits interleaved reads into per-channel series
//! - [`stats`] computes aggregates and mode-specific readings
//! - [`engine`] runs the session read cycle and owns the [`state`] machine
//! - [`report`] delivers results to the collaborator

pub mod demux;
pub mod engine;
pub mod mask;
pub mod report;
pub mod scan_config;
pub mod state;
pub mod stats;

pub use engine::{AcquisitionLoop, EndReason, LoopSettings, SessionSummary, StopOutcome};
pub use mask::{decode, ChannelMask, EnabledChannelSet};
pub use report::{ChannelReporter, Reporter, SessionEvent, TracingReporter};
pub use scan_config::{MeasurementMode, Multipliers, ScanConfiguration, ScanLimits};
pub use state::SessionPhase;
