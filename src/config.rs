//! Configuration System using Figment
//!
//! Settings are loaded from, in increasing priority:
//! 1. Built-in defaults
//! 2. `config/energy_daq.toml`
//! 3. Environment variables prefixed with `ENERGY_DAQ_`, nested keys separated by `__`
//!
//! # Example
//! ```no_run
//! use energy_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("Writing sessions to {}", settings.storage.output_dir.display());
//! # Ok::<(), energy_daq::error::DaqError>(())
//! ```

use crate::acquisition::engine::LoopSettings;
use crate::acquisition::mask::ChannelMask;
use crate::acquisition::scan_config::{MeasurementMode, Multipliers, ScanConfiguration, ScanLimits};
use crate::error::{AppResult, ConfigRejection};
use crate::validation::{is_in_range, is_not_empty, is_ordered, is_positive_finite, is_valid_path};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/energy_daq.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ENERGY_DAQ_";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Accepted sample count and scan rate ranges
    #[serde(default)]
    pub limits: ScanLimits,
    /// Defaults for sessions started without explicit parameters
    #[serde(default)]
    pub acquisition: AcquisitionDefaults,
    /// Session file location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Session defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionDefaults {
    /// Channel mask, bit `i` selects channel `i`
    #[serde(default = "default_channel_mask")]
    pub channel_mask: u8,
    /// Samples per channel
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
    /// Per-channel scan rate in Hz
    #[serde(default = "default_scan_rate")]
    pub scan_rate_hz: f64,
    /// Measurement mode
    #[serde(default)]
    pub mode: MeasurementMode,
    /// Scan until stopped
    #[serde(default)]
    pub continuous: bool,
    /// Device read timeout in seconds (0 = wait indefinitely)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: f64,
    /// Scale factors
    #[serde(default)]
    pub multipliers: Multipliers,
}

impl Default for AcquisitionDefaults {
    fn default() -> Self {
        Self {
            channel_mask: default_channel_mask(),
            sample_count: default_sample_count(),
            scan_rate_hz: default_scan_rate(),
            mode: MeasurementMode::default(),
            continuous: false,
            read_timeout_secs: default_read_timeout(),
            multipliers: Multipliers::default(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory session files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

// Default value functions
fn default_name() -> String {
    "Energy DAQ".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_channel_mask() -> u8 {
    0b0000_0011
}

fn default_sample_count() -> u32 {
    1000
}

fn default_scan_rate() -> f64 {
    1000.0
}

fn default_read_timeout() -> f64 {
    5.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Settings {
    /// Load from `config/energy_daq.toml` and the environment.
    ///
    /// Environment variables override file values, e.g.
    /// `ENERGY_DAQ_LIMITS__MAX_SAMPLES=1000`.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path. A missing file leaves the defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Validate settings after loading.
    pub fn validate(&self) -> AppResult<()> {
        let reject = |message: String| ConfigRejection::Settings(message);

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(reject(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ))
            .into());
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(reject(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ))
            .into());
        }

        is_not_empty(&self.application.name)
            .map_err(|e| reject(format!("application.name: {}", e)))?;

        let limits = &self.limits;
        if limits.min_samples == 0 {
            return Err(reject("limits.min_samples must be at least 1".to_string()).into());
        }
        is_ordered(limits.min_samples, limits.max_samples)
            .map_err(|e| reject(format!("limits samples: {}", e)))?;
        is_positive_finite(limits.min_scan_rate_hz)
            .map_err(|e| reject(format!("limits.min_scan_rate_hz: {}", e)))?;
        is_positive_finite(limits.max_scan_rate_hz)
            .map_err(|e| reject(format!("limits.max_scan_rate_hz: {}", e)))?;
        is_ordered(limits.min_scan_rate_hz, limits.max_scan_rate_hz)
            .map_err(|e| reject(format!("limits scan rate: {}", e)))?;

        let acq = &self.acquisition;
        if acq.read_timeout_secs != 0.0 {
            is_positive_finite(acq.read_timeout_secs)
                .map_err(|e| reject(format!("acquisition.read_timeout_secs: {}", e)))?;
        }
        is_in_range(acq.sample_count, limits.min_samples..=limits.max_samples).map_err(|e| {
            reject(format!(
                "acquisition.sample_count {}: {}",
                acq.sample_count, e
            ))
        })?;

        // Full session checks (mask, rate, multipliers, power pairs).
        self.scan_configuration().validate(limits)?;

        is_valid_path(&self.storage.output_dir.to_string_lossy())
            .map_err(|e| reject(format!("storage.output_dir: {}", e)))?;

        Ok(())
    }

    /// The session configuration described by `[acquisition]`.
    pub fn scan_configuration(&self) -> ScanConfiguration {
        let acq = &self.acquisition;
        ScanConfiguration {
            channel_mask: ChannelMask::new(acq.channel_mask),
            requested_sample_count: acq.sample_count,
            scan_rate_hz: acq.scan_rate_hz,
            mode: acq.mode,
            multipliers: acq.multipliers,
            continuous: acq.continuous,
        }
    }

    /// Device read timeout, `None` when disabled.
    pub fn read_timeout(&self) -> Option<Duration> {
        let secs = self.acquisition.read_timeout_secs;
        (secs > 0.0 && secs.is_finite()).then(|| Duration::from_secs_f64(secs))
    }

    /// Settings for the acquisition loop.
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            limits: self.limits,
            output_dir: self.storage.output_dir.clone(),
            read_timeout: self.read_timeout(),
        }
    }

    /// Effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
