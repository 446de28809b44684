//! Frame demultiplexer.
//!
//! Device reads return samples sample-major: for `N` enabled channels, samples
//! `[0..N)` are the first time step, `[N..2N)` the second, and so on. This module
//! splits such a buffer into one series per channel.
//!
//! A trailing partial time step (`len % N` samples) is dropped. It cannot be
//! attributed to a complete scan and the next read starts on a fresh scan boundary.

use crate::acquisition::mask::EnabledChannelSet;
use crate::error::{AppResult, ConfigRejection, DaqError};

/// Samples of one enabled channel across all complete time steps of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    /// Physical channel index (0-7).
    pub channel: u8,
    /// Samples in acquisition order.
    pub samples: Vec<f64>,
}

impl ChannelSeries {
    /// Number of samples in the series.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// First sample of the series, used for per-tick derived values.
    pub fn first(&self) -> Option<f64> {
        self.samples.first().copied()
    }
}

/// Number of complete time steps in a frame of `len` samples.
pub fn complete_steps(len: usize, channel_count: usize) -> usize {
    if channel_count == 0 {
        0
    } else {
        len / channel_count
    }
}

/// Split `frame` into `channel_count` series.
///
/// Series `i` holds `frame[i + k * channel_count]` for every complete step `k`.
/// Every series has length `floor(len / channel_count)`.
///
/// # Errors
///
/// - [`DaqError::EmptyFrame`] when the frame does not contain a single complete step.
/// - [`DaqError::InvalidConfiguration`] when `channel_count` is zero.
pub fn demux(frame: &[f64], channel_count: usize) -> AppResult<Vec<Vec<f64>>> {
    if channel_count == 0 {
        return Err(ConfigRejection::EmptyMask.into());
    }

    let steps = complete_steps(frame.len(), channel_count);
    if steps == 0 {
        return Err(DaqError::EmptyFrame {
            samples: frame.len(),
            channels: channel_count,
        });
    }

    let mut series = vec![Vec::with_capacity(steps); channel_count];
    for scan in frame.chunks_exact(channel_count) {
        for (channel, &sample) in series.iter_mut().zip(scan) {
            channel.push(sample);
        }
    }

    Ok(series)
}

/// Demultiplex and label each series with its physical channel index.
pub fn demux_channels(frame: &[f64], channels: &EnabledChannelSet) -> AppResult<Vec<ChannelSeries>> {
    let series = demux(frame, channels.count())?;
    Ok(channels
        .indices()
        .iter()
        .zip(series)
        .map(|(&channel, samples)| ChannelSeries { channel, samples })
        .collect())
}
