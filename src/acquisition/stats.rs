//! Statistics engine.
//!
//! Two independent computations run over each demultiplexed series:
//!
//! - [`compute_metrics`] aggregates the whole series into mean, RMS, peak and crest factor.
//! - [`derive_readings`] turns the *first* sample of each series into the mode's
//!   engineering quantity (V, A, W, Nm, rad/s). This matches the one-row-per-read
//!   granularity of the recorder.

use crate::acquisition::demux::ChannelSeries;
use crate::acquisition::mask::decode;
use crate::acquisition::scan_config::{power_pairs, MeasurementMode, Multipliers};
use std::fmt;

/// One statistic of a series.
///
/// `Undefined` and `NoData` are distinct from any real value, including `0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    /// A computed value.
    Value(f64),
    /// The statistic has no meaning for this series (crest factor at zero RMS).
    Undefined,
    /// The series was empty.
    NoData,
}

impl Metric {
    /// True for [`Metric::Undefined`].
    pub fn is_undefined(self) -> bool {
        matches!(self, Metric::Undefined)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{:.3}", v),
            Metric::Undefined => f.write_str("undefined"),
            Metric::NoData => f.write_str("no data"),
        }
    }
}

/// Aggregate statistics of one channel series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMetrics {
    /// Physical channel index.
    pub channel: u8,
    /// Arithmetic mean.
    pub mean: Metric,
    /// Root mean square.
    pub urms: Metric,
    /// Largest absolute sample.
    pub upeak: Metric,
    /// `upeak / urms`.
    pub crest_factor: Metric,
}

/// Compute mean, RMS, peak and crest factor of `samples`.
pub fn compute_metrics(channel: u8, samples: &[f64]) -> ChannelMetrics {
    if samples.is_empty() {
        return ChannelMetrics {
            channel,
            mean: Metric::NoData,
            urms: Metric::NoData,
            upeak: Metric::NoData,
            crest_factor: Metric::NoData,
        };
    }

    let m = samples.len() as f64;
    let peak = samples.iter().fold(0.0f64, |p, &x| p.max(x.abs()));
    let sum: f64 = samples.iter().sum();

    // Squares are taken relative to the peak so large finite samples cannot overflow.
    let urms = if peak > 0.0 && peak.is_finite() {
        let sum_sq: f64 = samples.iter().map(|&x| (x / peak) * (x / peak)).sum();
        peak * (sum_sq / m).sqrt()
    } else {
        let sum_sq: f64 = samples.iter().map(|&x| x * x).sum();
        (sum_sq / m).sqrt()
    };
    let crest_factor = if urms == 0.0 {
        Metric::Undefined
    } else {
        Metric::Value(peak / urms)
    };

    ChannelMetrics {
        channel,
        mean: Metric::Value(sum / m),
        urms: Metric::Value(urms),
        upeak: Metric::Value(peak),
        crest_factor,
    }
}

/// A derived engineering value for one output channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Channel the value is attributed to (the voltage channel in power mode).
    pub channel: u8,
    /// Value in the mode's unit.
    pub value: f64,
}

/// Derive one reading per output channel from the first sample of each series.
///
/// In power mode only voltage channels with an enabled current partner produce a
/// reading; every other mode produces one reading per non-empty series.
pub fn derive_readings(
    series: &[ChannelSeries],
    mode: MeasurementMode,
    multipliers: &Multipliers,
) -> Vec<Reading> {
    let scale = match mode {
        MeasurementMode::Voltage => 1.0,
        MeasurementMode::Current => multipliers.current,
        MeasurementMode::Torque => multipliers.torque,
        MeasurementMode::AngularVelocity => multipliers.angular_velocity,
        MeasurementMode::Power => return derive_power(series, multipliers.current),
    };

    series
        .iter()
        .filter_map(|s| {
            s.first().map(|sample| Reading {
                channel: s.channel,
                value: sample * scale,
            })
        })
        .collect()
}

fn derive_power(series: &[ChannelSeries], current_multiplier: f64) -> Vec<Reading> {
    let first_of = |channel: u8| {
        series
            .iter()
            .find(|s| s.channel == channel)
            .and_then(ChannelSeries::first)
    };

    let mask = series.iter().fold(0u8, |acc, s| acc | (1 << s.channel));
    power_pairs(&decode(mask))
        .into_iter()
        .filter_map(|pair| {
            let voltage = first_of(pair.voltage_channel)?;
            let current = first_of(pair.current_channel)?;
            Some(Reading {
                channel: pair.voltage_channel,
                value: power(voltage, current, current_multiplier),
            })
        })
        .collect()
}

/// `voltage * (current * multiplier)`.
pub fn power(voltage: f64, current: f64, current_multiplier: f64) -> f64 {
    voltage * (current * current_multiplier)
}
