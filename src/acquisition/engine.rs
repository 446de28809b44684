//! Acquisition loop.
//!
//! [`AcquisitionLoop::start`] runs a whole session on the calling thread:
//!
//! 1. Validate the configuration and claim the Idle → Running transition
//! 2. Resolve the session file and start the device scan
//! 3. Read, demultiplex, compute, persist, report; repeat until the sample budget is
//!    met, a stop is requested, or the device reports a fault
//! 4. Stop and clean up the scan, report the terminal status, return to Idle
//!
//! Reads are strictly sequential: a frame is fully processed and reported before the
//! next read is issued. [`AcquisitionLoop::stop`] may be called from any thread; it
//! sets a flag that the loop checks before every read.

use crate::acquisition::demux::demux_channels;
use crate::acquisition::mask::EnabledChannelSet;
use crate::acquisition::report::{Reporter, SessionEvent, StatusChange, TickReport};
use crate::acquisition::scan_config::{ScanConfiguration, ScanLimits};
use crate::acquisition::state::{ActiveSession, SessionPhase, SessionState};
use crate::acquisition::stats::{compute_metrics, derive_readings};
use crate::error::{AppResult, ConfigRejection, DaqError};
use crate::hardware::scan_device::{ScanDevice, ScanGuard, ScanOptions};
use crate::storage::recorder::SessionRecorder;
use chrono::Local;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    /// The requested samples per channel were acquired.
    Completed,
    /// `stop()` was observed.
    StopRequested,
    /// The device flagged a hardware overrun.
    HardwareOverrun,
    /// The device flagged a buffer overrun.
    BufferOverrun,
    /// The device failed a call.
    DeviceError(String),
}

impl EndReason {
    /// True for the reasons that pass through the Faulted phase.
    pub fn is_fault(&self) -> bool {
        !matches!(self, EndReason::Completed | EndReason::StopRequested)
    }

    /// The error matching a fault, `None` for a normal end.
    pub fn as_error(&self) -> Option<DaqError> {
        match self {
            EndReason::Completed | EndReason::StopRequested => None,
            EndReason::HardwareOverrun => Some(DaqError::HardwareOverrun),
            EndReason::BufferOverrun => Some(DaqError::BufferOverrun),
            EndReason::DeviceError(message) => Some(DaqError::Device(message.clone())),
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Completed => write!(f, "completed"),
            EndReason::StopRequested => write!(f, "stop requested"),
            EndReason::HardwareOverrun => write!(f, "hardware overrun"),
            EndReason::BufferOverrun => write!(f, "buffer overrun"),
            EndReason::DeviceError(message) => write!(f, "device error: {}", message),
        }
    }
}

/// Counters and outcome of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Why the session ended.
    pub end_reason: EndReason,
    /// Time from start to the terminal status.
    pub elapsed: Duration,
    /// Reads that returned data.
    pub frames: u64,
    /// Demultiplexed samples per channel.
    pub samples_per_channel: u64,
    /// Rows appended to the session file.
    pub rows_written: u64,
    /// Rows that could not be appended.
    pub persistence_failures: u64,
    /// Reads with less than one complete time step.
    pub empty_frames: u64,
    /// Session file.
    pub path: PathBuf,
}

/// Settings that outlive individual sessions.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Accepted sample count and scan rate ranges.
    pub limits: ScanLimits,
    /// Directory session files are created in.
    pub output_dir: PathBuf,
    /// Passed to every `scan_read`; `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            limits: ScanLimits::default(),
            output_dir: PathBuf::from("."),
            read_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Result of a `stop()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The running session will stop before its next read.
    Requested,
    /// No session was running; nothing changed.
    NotRunning,
}

#[derive(Debug, Default)]
struct Tally {
    frames: u64,
    samples_per_channel: u64,
    rows_written: u64,
    persistence_failures: u64,
    empty_frames: u64,
}

/// Drives sessions against one exclusively owned device.
///
/// Share it behind an `Arc` to call [`stop`](Self::stop) from another thread while
/// [`start`](Self::start) blocks.
pub struct AcquisitionLoop<D: ScanDevice> {
    device: Mutex<D>,
    state: Mutex<SessionState>,
    stop_requested: AtomicBool,
    reporter: Arc<dyn Reporter>,
    settings: LoopSettings,
}

impl<D: ScanDevice> AcquisitionLoop<D> {
    /// Take ownership of `device`.
    pub fn new(device: D, reporter: Arc<dyn Reporter>, settings: LoopSettings) -> Self {
        Self {
            device: Mutex::new(device),
            state: Mutex::new(SessionState::Idle),
            stop_requested: AtomicBool::new(false),
            reporter,
            settings,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase()
    }

    /// Samples per channel acquired so far by the running session.
    pub fn samples_acquired(&self) -> Option<u64> {
        self.state.lock().session().map(|s| s.samples_per_channel)
    }

    /// Run one session to completion on the calling thread.
    ///
    /// Device faults end the session but are not errors of this call; they are
    /// reported as the terminal status and carried in [`SessionSummary::end_reason`].
    ///
    /// # Errors
    ///
    /// - [`DaqError::InvalidConfiguration`] when the configuration is rejected or a
    ///   session is already running. Nothing is touched in that case.
    /// - [`DaqError::Device`] when the device refuses to start the scan.
    pub fn start(&self, config: ScanConfiguration) -> AppResult<SessionSummary> {
        let recorder = self.claim_session(&config)?;
        let channels = config.channel_mask.decode();

        info!(
            mask = %config.channel_mask,
            n_channels = channels.count(),
            sample_rate = config.scan_rate_hz,
            samples = config.requested_sample_count,
            mode = %config.mode,
            continuous = config.continuous,
            file = %recorder.path().display(),
            "Session started"
        );
        self.report_status(SessionPhase::Running);

        let options = if config.continuous {
            ScanOptions::CONTINUOUS
        } else {
            ScanOptions::DEFAULT
        };

        let mut device = self.device.lock();
        let mut tally = Tally::default();

        let start_error = 'scan: {
            let mut guard = match ScanGuard::start(
                &mut *device,
                config.channel_mask,
                config.requested_sample_count,
                config.scan_rate_hz,
                options,
            ) {
                Ok(guard) => guard,
                Err(e) => break 'scan e,
            };

            let reason = self.read_cycle(&mut guard, &config, &channels, &recorder, &mut tally);
            if reason.is_fault() {
                self.set_phase(SessionPhase::Faulted);
                self.report_status(SessionPhase::Faulted);
            }
            guard.release();
            drop(device);

            return Ok(self.finish(reason, tally, &recorder));
        };

        error!(error = %start_error, "Failed to start scan");
        drop(device);
        self.set_phase(SessionPhase::Faulted);
        self.report_status(SessionPhase::Faulted);
        let reason = EndReason::DeviceError(start_error.to_string());
        self.finish(reason, tally, &recorder);
        Err(DaqError::Device(start_error.to_string()))
    }

    /// Ask the running session to stop before its next read.
    ///
    /// With no session running this only reports [`SessionEvent::NotRunning`].
    pub fn stop(&self) -> StopOutcome {
        let state = self.state.lock();
        if state.is_running() {
            self.stop_requested.store(true, Ordering::SeqCst);
            drop(state);
            info!("Stop requested");
            StopOutcome::Requested
        } else {
            drop(state);
            self.reporter.report(SessionEvent::NotRunning);
            StopOutcome::NotRunning
        }
    }

    fn claim_session(&self, config: &ScanConfiguration) -> AppResult<SessionRecorder> {
        let mut state = self.state.lock();
        if !state.can_transition_to(SessionPhase::Running) {
            drop(state);
            warn!("Start rejected: a session is already active");
            self.reporter.report(SessionEvent::AlreadyActive);
            return Err(ConfigRejection::AlreadyActive.into());
        }

        if let Err(e) = config.validate(&self.settings.limits) {
            warn!(error = %e, "Start rejected");
            return Err(e);
        }

        let recorder = SessionRecorder::for_session(
            &self.settings.output_dir,
            Local::now().date_naive(),
            config.mode,
        );
        self.stop_requested.store(false, Ordering::SeqCst);
        *state = SessionState::Running(ActiveSession::new(config.channel_mask));
        Ok(recorder)
    }

    fn read_cycle(
        &self,
        guard: &mut ScanGuard<'_, D>,
        config: &ScanConfiguration,
        channels: &EnabledChannelSet,
        recorder: &SessionRecorder,
        tally: &mut Tally,
    ) -> EndReason {
        let budget = u64::from(config.requested_sample_count);

        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                return EndReason::StopRequested;
            }

            let read = match guard.read(self.settings.read_timeout) {
                Ok(read) => read,
                Err(e) => {
                    error!(error = %e, "Scan read failed");
                    return EndReason::DeviceError(e.to_string());
                }
            };

            if read.hardware_overrun {
                error!(samples = tally.samples_per_channel, "Hardware overrun");
                return EndReason::HardwareOverrun;
            }
            if read.buffer_overrun {
                error!(samples = tally.samples_per_channel, "Buffer overrun");
                return EndReason::BufferOverrun;
            }
            if read.data.is_empty() {
                trace!("Read returned no data");
                continue;
            }

            tally.frames += 1;
            if let Err(e) = self.process_frame(&read.data, config, channels, recorder, tally) {
                error!(error = %e, "Frame processing failed");
                return EndReason::DeviceError(e.to_string());
            }

            if !config.continuous && tally.samples_per_channel >= budget {
                return EndReason::Completed;
            }
        }
    }

    fn process_frame(
        &self,
        data: &[f64],
        config: &ScanConfiguration,
        channels: &EnabledChannelSet,
        recorder: &SessionRecorder,
        tally: &mut Tally,
    ) -> AppResult<()> {
        let series = match demux_channels(data, channels) {
            Ok(series) => series,
            Err(DaqError::EmptyFrame { samples, channels }) => {
                debug!(samples, channels, "Frame holds no complete time step");
                tally.empty_frames += 1;
                self.reporter
                    .report(SessionEvent::EmptyFrame { samples, channels });
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let steps = series.first().map_or(0, |s| s.len()) as u64;
        let metrics = series
            .iter()
            .map(|s| compute_metrics(s.channel, &s.samples))
            .collect();
        let readings = derive_readings(&series, config.mode, &config.multipliers);
        let unit = config.mode.unit();
        let timestamp = Local::now();

        match recorder.append(timestamp, &readings, unit) {
            Ok(()) => tally.rows_written += 1,
            Err(e) => {
                warn!(error = %e, "Row not persisted, continuing");
                tally.persistence_failures += 1;
                let message = match e {
                    DaqError::Persistence { message, .. } => message,
                    other => other.to_string(),
                };
                self.reporter.report(SessionEvent::PersistenceFailed {
                    path: recorder.path().to_path_buf(),
                    message,
                });
            }
        }

        tally.samples_per_channel += steps;
        if let SessionState::Running(session) = &mut *self.state.lock() {
            session.samples_per_channel = tally.samples_per_channel;
        }
        trace!(
            steps,
            total = tally.samples_per_channel,
            "Frame processed"
        );

        self.reporter.report(SessionEvent::Tick(TickReport {
            timestamp,
            metrics,
            readings,
            unit,
        }));
        Ok(())
    }

    fn finish(
        &self,
        end_reason: EndReason,
        tally: Tally,
        recorder: &SessionRecorder,
    ) -> SessionSummary {
        let summary = SessionSummary {
            end_reason,
            elapsed: self.session_elapsed(),
            frames: tally.frames,
            samples_per_channel: tally.samples_per_channel,
            rows_written: tally.rows_written,
            persistence_failures: tally.persistence_failures,
            empty_frames: tally.empty_frames,
            path: recorder.path().to_path_buf(),
        };

        self.set_phase(SessionPhase::Idle);
        info!(
            end_reason = %summary.end_reason,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            frames = summary.frames,
            samples = summary.samples_per_channel,
            rows = summary.rows_written,
            persistence_failures = summary.persistence_failures,
            "Session ended"
        );
        self.reporter.report(SessionEvent::Status(StatusChange {
            phase: SessionPhase::Idle,
            elapsed: summary.elapsed,
            summary: Some(summary.clone()),
        }));
        summary
    }

    fn set_phase(&self, target: SessionPhase) {
        let mut state = self.state.lock();
        if !state.can_transition_to(target) {
            debug!(from = %state.phase(), to = %target, "Ignoring transition");
            return;
        }
        *state = match (std::mem::take(&mut *state), target) {
            (SessionState::Running(session), SessionPhase::Faulted) => {
                SessionState::Faulted(session)
            }
            (_, SessionPhase::Idle) => SessionState::Idle,
            (current, _) => current,
        };
    }

    fn session_elapsed(&self) -> Duration {
        self.state
            .lock()
            .session()
            .map_or(Duration::ZERO, ActiveSession::elapsed)
    }

    fn report_status(&self, phase: SessionPhase) {
        self.reporter.report(SessionEvent::Status(StatusChange {
            phase,
            elapsed: self.session_elapsed(),
            summary: None,
        }));
    }
}
