//! Session configuration supplied by the collaborator.
//!
//! A [`ScanConfiguration`] is handed to the acquisition loop by value and is not
//! touched again until the session ends. Bounds on sample count and scan rate are
//! policy, not core logic, and live in [`ScanLimits`] so each deployment can tune them.

use crate::acquisition::mask::{ChannelMask, EnabledChannelSet};
use crate::error::{AppResult, ConfigRejection};
use crate::validation::{is_in_range, is_positive_finite};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quantity derived from each channel's first sample per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementMode {
    /// Raw sample in volts.
    #[default]
    Voltage,
    /// Sample scaled by the current multiplier.
    Current,
    /// Voltage channel times its paired current channel.
    Power,
    /// Sample scaled by the torque multiplier.
    Torque,
    /// Sample scaled by the angular velocity multiplier.
    AngularVelocity,
}

impl MeasurementMode {
    /// All modes, in display order.
    pub const ALL: [MeasurementMode; 5] = [
        MeasurementMode::Voltage,
        MeasurementMode::Current,
        MeasurementMode::Power,
        MeasurementMode::Torque,
        MeasurementMode::AngularVelocity,
    ];

    /// Unit string written with every row.
    pub fn unit(self) -> &'static str {
        match self {
            MeasurementMode::Voltage => "V",
            MeasurementMode::Current => "A",
            MeasurementMode::Power => "W",
            MeasurementMode::Torque => "Nm",
            MeasurementMode::AngularVelocity => "rad/s",
        }
    }

    /// Label used in session file names.
    pub fn label(self) -> &'static str {
        match self {
            MeasurementMode::Voltage => "voltage",
            MeasurementMode::Current => "current",
            MeasurementMode::Power => "power",
            MeasurementMode::Torque => "torque",
            MeasurementMode::AngularVelocity => "angular_velocity",
        }
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MeasurementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        MeasurementMode::ALL
            .into_iter()
            .find(|mode| mode.label() == normalized)
            .ok_or_else(|| {
                format!(
                    "Invalid mode '{}'. Must be one of: voltage, current, power, torque, angular_velocity",
                    s
                )
            })
    }
}

/// Scale factors applied to raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Multipliers {
    /// Current mode, and the current side of power mode.
    #[serde(default = "unity")]
    pub current: f64,
    /// Torque mode.
    #[serde(default = "unity")]
    pub torque: f64,
    /// Angular velocity mode.
    #[serde(default = "unity")]
    pub angular_velocity: f64,
}

fn unity() -> f64 {
    1.0
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            current: 1.0,
            torque: 1.0,
            angular_velocity: 1.0,
        }
    }
}

impl Multipliers {
    /// Reject zero, negative, and non-finite factors.
    pub fn validate(&self) -> Result<(), ConfigRejection> {
        for (name, value) in [
            ("current", self.current),
            ("torque", self.torque),
            ("angular velocity", self.angular_velocity),
        ] {
            is_positive_finite(value)
                .map_err(|_| ConfigRejection::NonPositiveMultiplier { name, value })?;
        }
        Ok(())
    }
}

/// Accepted ranges for the tunable scan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanLimits {
    /// Smallest accepted sample count per channel.
    #[serde(default = "default_min_samples")]
    pub min_samples: u32,
    /// Largest accepted sample count per channel.
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,
    /// Lowest accepted scan rate in Hz.
    #[serde(default = "default_min_scan_rate")]
    pub min_scan_rate_hz: f64,
    /// Highest accepted scan rate in Hz.
    #[serde(default = "default_max_scan_rate")]
    pub max_scan_rate_hz: f64,
}

fn default_min_samples() -> u32 {
    1
}

fn default_max_samples() -> u32 {
    10_000
}

fn default_min_scan_rate() -> f64 {
    10.0
}

fn default_max_scan_rate() -> f64 {
    5_000.0
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            max_samples: default_max_samples(),
            min_scan_rate_hz: default_min_scan_rate(),
            max_scan_rate_hz: default_max_scan_rate(),
        }
    }
}

/// Everything a session needs from the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfiguration {
    /// Channels to sample.
    pub channel_mask: ChannelMask,
    /// Samples per channel to acquire before the session completes.
    pub requested_sample_count: u32,
    /// Per-channel scan rate in Hz.
    pub scan_rate_hz: f64,
    /// Derived quantity reported per tick.
    pub mode: MeasurementMode,
    /// Scale factors for the scaled modes.
    #[serde(default)]
    pub multipliers: Multipliers,
    /// Keep scanning past the sample budget until stopped.
    #[serde(default)]
    pub continuous: bool,
}

impl ScanConfiguration {
    /// Voltage-mode configuration with default multipliers.
    pub fn new(channel_mask: u8, requested_sample_count: u32, scan_rate_hz: f64) -> Self {
        Self {
            channel_mask: ChannelMask::new(channel_mask),
            requested_sample_count,
            scan_rate_hz,
            mode: MeasurementMode::Voltage,
            multipliers: Multipliers::default(),
            continuous: false,
        }
    }

    /// Set the measurement mode.
    pub fn with_mode(mut self, mode: MeasurementMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the current multiplier.
    pub fn with_current_multiplier(mut self, multiplier: f64) -> Self {
        self.multipliers.current = multiplier;
        self
    }

    /// Enable or disable continuous scanning.
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// Check the configuration against `limits` before any resource is touched.
    pub fn validate(&self, limits: &ScanLimits) -> AppResult<()> {
        if self.channel_mask.is_empty() {
            return Err(ConfigRejection::EmptyMask.into());
        }

        is_in_range(
            self.requested_sample_count,
            limits.min_samples..=limits.max_samples,
        )
        .map_err(|_| ConfigRejection::SampleCountOutOfRange {
            value: self.requested_sample_count,
            min: limits.min_samples,
            max: limits.max_samples,
        })?;

        // NaN fails the range check as well.
        is_in_range(
            self.scan_rate_hz,
            limits.min_scan_rate_hz..=limits.max_scan_rate_hz,
        )
        .map_err(|_| ConfigRejection::ScanRateOutOfRange {
            value: self.scan_rate_hz,
            min: limits.min_scan_rate_hz,
            max: limits.max_scan_rate_hz,
        })?;

        self.multipliers.validate()?;

        if self.mode == MeasurementMode::Power
            && power_pairs(&self.channel_mask.decode()).is_empty()
        {
            return Err(ConfigRejection::NoPowerPair {
                mask: self.channel_mask.bits(),
            }
            .into());
        }

        Ok(())
    }
}

/// A voltage channel and the current channel it is multiplied with in power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerPair {
    /// Even channel carrying the voltage signal.
    pub voltage_channel: u8,
    /// Odd channel right after it carrying the current signal.
    pub current_channel: u8,
}

/// Resolve the power pairs present in `channels`.
///
/// Pairing is fixed: voltage on channel `2k`, current on channel `2k + 1`. A channel
/// whose partner is not enabled produces no power reading.
pub fn power_pairs(channels: &EnabledChannelSet) -> Vec<PowerPair> {
    channels
        .indices()
        .iter()
        .filter(|&&ch| ch % 2 == 0)
        .filter(|&&ch| channels.position_of(ch + 1).is_some())
        .map(|&ch| PowerPair {
            voltage_channel: ch,
            current_channel: ch + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::mask::decode;
    use crate::error::DaqError;

    fn rejection(config: &ScanConfiguration) -> ConfigRejection {
        match config.validate(&ScanLimits::default()) {
            Err(DaqError::InvalidConfiguration(reason)) => reason,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn valid_configuration_passes() {
        let config = ScanConfiguration::new(0b11, 10, 1000.0);
        assert!(config.validate(&ScanLimits::default()).is_ok());
    }

    #[test]
    fn empty_mask_is_rejected() {
        let config = ScanConfiguration::new(0, 10, 1000.0);
        assert_eq!(rejection(&config), ConfigRejection::EmptyMask);
    }

    #[test]
    fn sample_count_bounds_are_inclusive() {
        let limits = ScanLimits::default();
        assert!(ScanConfiguration::new(1, 1, 1000.0).validate(&limits).is_ok());
        assert!(ScanConfiguration::new(1, 10_000, 1000.0).validate(&limits).is_ok());
        assert!(matches!(
            rejection(&ScanConfiguration::new(1, 0, 1000.0)),
            ConfigRejection::SampleCountOutOfRange { value: 0, .. }
        ));
        assert!(matches!(
            rejection(&ScanConfiguration::new(1, 10_001, 1000.0)),
            ConfigRejection::SampleCountOutOfRange { .. }
        ));
    }

    #[test]
    fn scan_rate_outside_limits_or_nan_is_rejected() {
        for rate in [0.0, 9.99, 5000.5, f64::NAN] {
            assert!(matches!(
                rejection(&ScanConfiguration::new(1, 10, rate)),
                ConfigRejection::ScanRateOutOfRange { .. }
            ));
        }
    }

    #[test]
    fn tuned_limits_apply() {
        let limits = ScanLimits {
            max_samples: 1000,
            ..ScanLimits::default()
        };
        assert!(ScanConfiguration::new(1, 5000, 1000.0).validate(&limits).is_err());
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let config = ScanConfiguration::new(1, 10, 100.0).with_current_multiplier(0.0);
        assert!(matches!(
            rejection(&config),
            ConfigRejection::NonPositiveMultiplier { name: "current", .. }
        ));
    }

    #[test]
    fn power_mode_needs_a_pair() {
        let config = ScanConfiguration::new(0b0000_0101, 10, 100.0).with_mode(MeasurementMode::Power);
        assert_eq!(
            rejection(&config),
            ConfigRejection::NoPowerPair { mask: 0b0000_0101 }
        );

        let config = ScanConfiguration::new(0b0000_0011, 10, 100.0).with_mode(MeasurementMode::Power);
        assert!(config.validate(&ScanLimits::default()).is_ok());
    }

    #[test]
    fn pairs_are_even_then_odd() {
        let pairs = power_pairs(&decode(0b0011_0111));
        assert_eq!(
            pairs,
            vec![
                PowerPair {
                    voltage_channel: 0,
                    current_channel: 1
                },
                PowerPair {
                    voltage_channel: 4,
                    current_channel: 5
                },
            ]
        );
    }

    #[test]
    fn mode_parsing_accepts_labels_and_variants() {
        assert_eq!("Power".parse::<MeasurementMode>(), Ok(MeasurementMode::Power));
        assert_eq!(
            "angular-velocity".parse::<MeasurementMode>(),
            Ok(MeasurementMode::AngularVelocity)
        );
        assert!("frequency".parse::<MeasurementMode>().is_err());
        assert_eq!(MeasurementMode::Torque.unit(), "Nm");
    }
}
