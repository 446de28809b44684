//! Scan device capability.
//!
//! A scan device samples a set of analog channels at a fixed rate into an internal
//! buffer. The four calls mirror the lifecycle of a hardware-timed scan:
//!
//! - `scan_start` configures channels, rate and options and begins sampling
//! - `scan_read` blocks until data is available (or the timeout expires) and returns
//!   it interleaved sample-major, together with the overrun flags
//! - `scan_stop` halts sampling
//! - `scan_cleanup` releases the scan buffer and any driver resources
//!
//! # Design Philosophy
//!
//! - Blocking, like the underlying drivers; the caller decides which thread reads
//! - Uses `anyhow::Result` for errors, as the other capability traits do
//! - [`ScanGuard`] makes the stop/cleanup pair run exactly once on every exit path

use crate::acquisition::mask::ChannelMask;
use anyhow::Result;
use bitflags::bitflags;
use std::time::Duration;
use tracing::{debug, warn};

bitflags! {
    /// Options forwarded to `scan_start`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScanOptions: u32 {
        /// Default scan: internal clock, software start, finite length.
        const DEFAULT = 0;
        /// Wait for an external trigger edge before sampling.
        const EXT_TRIGGER = 1 << 1;
        /// Pace scans from an external clock input.
        const EXT_CLOCK = 1 << 2;
        /// Scan until stopped; the sample count only sizes the buffer.
        const CONTINUOUS = 1 << 3;
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions::DEFAULT
    }
}

/// Result of one blocking read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanRead {
    /// Samples, sample-major: `[t0_ch0, t0_ch1, ..., t1_ch0, ...]`.
    pub data: Vec<f64>,
    /// The device produced samples faster than it could hold them.
    pub hardware_overrun: bool,
    /// The scan buffer filled before it was read.
    pub buffer_overrun: bool,
}

impl ScanRead {
    /// A read without fault flags.
    pub fn samples(data: Vec<f64>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    /// A read flagged with a hardware overrun.
    pub fn hardware_overrun() -> Self {
        Self {
            hardware_overrun: true,
            ..Default::default()
        }
    }

    /// A read flagged with a buffer overrun.
    pub fn buffer_overrun() -> Self {
        Self {
            buffer_overrun: true,
            ..Default::default()
        }
    }
}

/// Capability: hardware-timed multi-channel analog scan.
///
/// # Contract
/// - `scan_read` returns whole samples only; a partial trailing time step is allowed
/// - `scan_stop` and `scan_cleanup` are called once each after a successful `scan_start`
/// - Implementations are owned exclusively by one acquisition loop at a time
pub trait ScanDevice: Send {
    /// Configure and start a scan.
    ///
    /// # Arguments
    /// * `mask` - Channels to sample
    /// * `samples_per_channel` - Scan length (buffer size hint when continuous)
    /// * `scan_rate_hz` - Per-channel sample rate
    /// * `options` - Trigger/clock/continuous flags
    fn scan_start(
        &mut self,
        mask: ChannelMask,
        samples_per_channel: u32,
        scan_rate_hz: f64,
        options: ScanOptions,
    ) -> Result<()>;

    /// Block until data is available and return it.
    ///
    /// `None` waits indefinitely.
    fn scan_read(&mut self, timeout: Option<Duration>) -> Result<ScanRead>;

    /// Stop sampling.
    fn scan_stop(&mut self) -> Result<()>;

    /// Release scan resources.
    fn scan_cleanup(&mut self) -> Result<()>;
}

impl<D: ScanDevice + ?Sized> ScanDevice for Box<D> {
    fn scan_start(
        &mut self,
        mask: ChannelMask,
        samples_per_channel: u32,
        scan_rate_hz: f64,
        options: ScanOptions,
    ) -> Result<()> {
        (**self).scan_start(mask, samples_per_channel, scan_rate_hz, options)
    }

    fn scan_read(&mut self, timeout: Option<Duration>) -> Result<ScanRead> {
        (**self).scan_read(timeout)
    }

    fn scan_stop(&mut self) -> Result<()> {
        (**self).scan_stop()
    }

    fn scan_cleanup(&mut self) -> Result<()> {
        (**self).scan_cleanup()
    }
}

/// A started scan that is stopped and cleaned up when released or dropped.
pub struct ScanGuard<'a, D: ScanDevice + ?Sized> {
    device: &'a mut D,
    released: bool,
}

impl<'a, D: ScanDevice + ?Sized> ScanGuard<'a, D> {
    /// Start a scan and take responsibility for stopping it.
    pub fn start(
        device: &'a mut D,
        mask: ChannelMask,
        samples_per_channel: u32,
        scan_rate_hz: f64,
        options: ScanOptions,
    ) -> Result<Self> {
        device.scan_start(mask, samples_per_channel, scan_rate_hz, options)?;
        Ok(Self {
            device,
            released: false,
        })
    }

    /// Forward to [`ScanDevice::scan_read`].
    pub fn read(&mut self, timeout: Option<Duration>) -> Result<ScanRead> {
        self.device.scan_read(timeout)
    }

    /// Stop and clean up now. Failures are logged; cleanup runs even if stop fails.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self.device.scan_stop() {
            warn!(error = %e, "Error stopping scan");
        }
        if let Err(e) = self.device.scan_cleanup() {
            warn!(error = %e, "Error cleaning up scan");
        }
        debug!("Scan stopped and cleaned up");
    }
}

impl<D: ScanDevice + ?Sized> Drop for ScanGuard<'_, D> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
