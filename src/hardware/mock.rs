//! Mock Scan Devices
//!
//! Simulated hardware for running sessions without a board attached.
//!
//! # Available Mocks
//!
//! - `SimulatedScanDevice` - Sine wave per channel, optional real-time pacing, optional
//!   injected overrun after a fixed number of reads
//! - `ScriptedScanDevice` - Replays a fixed sequence of reads; used by tests to drive the
//!   acquisition loop through exact scenarios
//!
//! Both share a [`DeviceCalls`] counter that tests keep a handle to after the device
//! has been moved into the loop.

use anyhow::{anyhow, bail, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::acquisition::mask::ChannelMask;
use crate::hardware::scan_device::{ScanDevice, ScanOptions, ScanRead};

/// Arguments of the most recent `scan_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartArgs {
    /// Mask the scan was started with.
    pub mask: ChannelMask,
    /// Requested samples per channel.
    pub samples_per_channel: u32,
    /// Requested rate in Hz.
    pub scan_rate_hz: f64,
    /// Scan options.
    pub options: ScanOptions,
}

/// Call counters shared between a mock device and its observers.
#[derive(Debug, Default)]
pub struct DeviceCalls {
    starts: AtomicUsize,
    reads: AtomicUsize,
    stops: AtomicUsize,
    cleanups: AtomicUsize,
    last_start: Mutex<Option<StartArgs>>,
}

impl DeviceCalls {
    /// Number of `scan_start` calls.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `scan_read` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `scan_stop` calls.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Number of `scan_cleanup` calls.
    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent `scan_start`, if any.
    pub fn last_start(&self) -> Option<StartArgs> {
        *self.last_start.lock()
    }

    fn record_start(&self, args: StartArgs) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last_start.lock() = Some(args);
    }
}

// =============================================================================
// SimulatedScanDevice - Sine generator
// =============================================================================

/// Simulated multi-channel board producing one sine wave per channel.
///
/// Channel `i` carries `amplitude * (i + 1) * sin(2π f t)` so that channels are
/// distinguishable in recorded files. Each read returns `scans_per_read` time steps.
///
/// # Example
///
/// ```rust,ignore
/// let device = SimulatedScanDevice::new()
///     .with_scans_per_read(50)
///     .with_real_time(true);
/// ```
pub struct SimulatedScanDevice {
    amplitude: f64,
    signal_hz: f64,
    scans_per_read: usize,
    real_time: bool,
    overrun_after: Option<usize>,
    active: Option<StartArgs>,
    sample_index: u64,
    reads_since_start: usize,
    calls: Arc<DeviceCalls>,
}

impl SimulatedScanDevice {
    /// 1 V amplitude, 50 Hz signal, 10 scans per read, no pacing.
    pub fn new() -> Self {
        Self {
            amplitude: 1.0,
            signal_hz: 50.0,
            scans_per_read: 10,
            real_time: false,
            overrun_after: None,
            active: None,
            sample_index: 0,
            reads_since_start: 0,
            calls: Arc::new(DeviceCalls::default()),
        }
    }

    /// Peak amplitude of channel 0.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Frequency of the generated signal.
    pub fn with_signal_hz(mut self, signal_hz: f64) -> Self {
        self.signal_hz = signal_hz;
        self
    }

    /// Time steps returned by each read (at least 1).
    pub fn with_scans_per_read(mut self, scans: usize) -> Self {
        self.scans_per_read = scans.max(1);
        self
    }

    /// Sleep for the duration a real board would need to fill each read.
    pub fn with_real_time(mut self, real_time: bool) -> Self {
        self.real_time = real_time;
        self
    }

    /// Flag a hardware overrun on the read after `reads` successful ones.
    pub fn with_overrun_after(mut self, reads: usize) -> Self {
        self.overrun_after = Some(reads);
        self
    }

    /// Shared call counters.
    pub fn calls(&self) -> Arc<DeviceCalls> {
        Arc::clone(&self.calls)
    }
}

impl Default for SimulatedScanDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanDevice for SimulatedScanDevice {
    fn scan_start(
        &mut self,
        mask: ChannelMask,
        samples_per_channel: u32,
        scan_rate_hz: f64,
        options: ScanOptions,
    ) -> Result<()> {
        if self.active.is_some() {
            bail!("scan already running");
        }
        if mask.is_empty() {
            bail!("no channels selected");
        }
        if scan_rate_hz.is_nan() || scan_rate_hz <= 0.0 {
            bail!("invalid scan rate {scan_rate_hz}");
        }

        let args = StartArgs {
            mask,
            samples_per_channel,
            scan_rate_hz,
            options,
        };
        self.calls.record_start(args);
        self.active = Some(args);
        self.sample_index = 0;
        self.reads_since_start = 0;
        Ok(())
    }

    fn scan_read(&mut self, _timeout: Option<Duration>) -> Result<ScanRead> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        let args = self.active.ok_or_else(|| anyhow!("scan not started"))?;

        if self.overrun_after == Some(self.reads_since_start) {
            return Ok(ScanRead::hardware_overrun());
        }
        self.reads_since_start += 1;

        if self.real_time {
            let fill_time = self.scans_per_read as f64 / args.scan_rate_hz;
            std::thread::sleep(Duration::from_secs_f64(fill_time));
        }

        let channels = args.mask.decode();
        let mut data = Vec::with_capacity(self.scans_per_read * channels.count());
        for _ in 0..self.scans_per_read {
            let t = self.sample_index as f64 / args.scan_rate_hz;
            let phase = (TAU * self.signal_hz * t).sin();
            for &ch in channels.indices() {
                data.push(self.amplitude * f64::from(ch + 1) * phase);
            }
            self.sample_index += 1;
        }

        Ok(ScanRead::samples(data))
    }

    fn scan_stop(&mut self) -> Result<()> {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        self.active = None;
        Ok(())
    }

    fn scan_cleanup(&mut self) -> Result<()> {
        self.calls.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// ScriptedScanDevice - Fixed replay
// =============================================================================

/// One scripted outcome of `scan_read`.
#[derive(Debug, Clone)]
pub enum ScriptedRead {
    /// Return this read.
    Read(ScanRead),
    /// Fail the read with this message.
    Fail(String),
}

/// Device that replays a fixed sequence of reads.
///
/// Once the script is exhausted every read waits 1 ms and returns no data, which the
/// loop treats as an idle tick. Tests use that to hold a session open until `stop()`.
pub struct ScriptedScanDevice {
    script: VecDeque<ScriptedRead>,
    start_error: Option<String>,
    stop_error: Option<String>,
    calls: Arc<DeviceCalls>,
}

impl ScriptedScanDevice {
    /// Replay `reads` in order.
    pub fn new(reads: Vec<ScanRead>) -> Self {
        Self::from_script(reads.into_iter().map(ScriptedRead::Read).collect())
    }

    /// Replay a script that may include failures.
    pub fn from_script(script: Vec<ScriptedRead>) -> Self {
        Self {
            script: script.into(),
            start_error: None,
            stop_error: None,
            calls: Arc::new(DeviceCalls::default()),
        }
    }

    /// Make `scan_start` fail.
    pub fn fail_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    /// Make `scan_stop` fail (cleanup still succeeds).
    pub fn fail_stop(mut self, message: &str) -> Self {
        self.stop_error = Some(message.to_string());
        self
    }

    /// Shared call counters.
    pub fn calls(&self) -> Arc<DeviceCalls> {
        Arc::clone(&self.calls)
    }
}

impl ScanDevice for ScriptedScanDevice {
    fn scan_start(
        &mut self,
        mask: ChannelMask,
        samples_per_channel: u32,
        scan_rate_hz: f64,
        options: ScanOptions,
    ) -> Result<()> {
        if let Some(message) = &self.start_error {
            bail!("{message}");
        }
        self.calls.record_start(StartArgs {
            mask,
            samples_per_channel,
            scan_rate_hz,
            options,
        });
        Ok(())
    }

    fn scan_read(&mut self, _timeout: Option<Duration>) -> Result<ScanRead> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(ScriptedRead::Read(read)) => Ok(read),
            Some(ScriptedRead::Fail(message)) => Err(anyhow!(message)),
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Ok(ScanRead::default())
            }
        }
    }

    fn scan_stop(&mut self) -> Result<()> {
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        match &self.stop_error {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    fn scan_cleanup(&mut self) -> Result<()> {
        self.calls.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
