//! Tests for settings loading and validation.

use energy_daq::acquisition::MeasurementMode;
use energy_daq::config::Settings;
use energy_daq::error::{ConfigRejection, DaqError};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("ENERGY_DAQ_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    clear_env();
    let settings = Settings::load_from("does/not/exist.toml").unwrap();
    assert_eq!(settings, Settings::default());
    assert!(settings.validate().is_ok());
}

#[test]
#[serial]
fn test_file_values_override_defaults() {
    clear_env();
    let file = write_config(
        r#"
[application]
log_level = "debug"

[limits]
max_samples = 1000

[acquisition]
channel_mask = 15
sample_count = 500
mode = "power"
read_timeout_secs = 0

[acquisition.multipliers]
current = 2.5
"#,
    );

    let settings = Settings::load_from(file.path()).unwrap();
    assert_eq!(settings.application.log_level, "debug");
    assert_eq!(settings.limits.max_samples, 1000);
    assert_eq!(settings.limits.min_samples, 1);
    assert_eq!(settings.acquisition.channel_mask, 0b1111);
    assert_eq!(settings.acquisition.mode, MeasurementMode::Power);
    assert_eq!(settings.acquisition.multipliers.current, 2.5);
    assert_eq!(settings.acquisition.multipliers.torque, 1.0);
    assert_eq!(settings.read_timeout(), None);
    assert!(settings.validate().is_ok());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let file = write_config("[acquisition]\nscan_rate_hz = 500.0\n");
    std::env::set_var("ENERGY_DAQ_ACQUISITION__SCAN_RATE_HZ", "2000");
    std::env::set_var("ENERGY_DAQ_STORAGE__OUTPUT_DIR", "/tmp/sessions");

    let result = Settings::load_from(file.path());
    clear_env();

    let settings = result.unwrap();
    assert_eq!(settings.acquisition.scan_rate_hz, 2000.0);
    assert_eq!(
        settings.storage.output_dir,
        std::path::PathBuf::from("/tmp/sessions")
    );
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    clear_env();
    let file = write_config("[acquisition]\nsample_count = \"many\"\n");
    let err = Settings::load_from(file.path()).unwrap_err();
    assert!(matches!(err, DaqError::Config(_)));
}

#[test]
fn test_default_scan_rate_outside_limits_rejected() {
    let mut settings = Settings::default();
    settings.acquisition.scan_rate_hz = 9000.0;
    let err = settings.validate().unwrap_err();
    assert!(matches!(
        err,
        DaqError::InvalidConfiguration(ConfigRejection::ScanRateOutOfRange { .. })
    ));
}

#[test]
fn test_default_power_mode_without_pair_rejected() {
    let mut settings = Settings::default();
    settings.acquisition.channel_mask = 0b0000_0001;
    settings.acquisition.mode = MeasurementMode::Power;
    let err = settings.validate().unwrap_err();
    assert!(matches!(
        err,
        DaqError::InvalidConfiguration(ConfigRejection::NoPowerPair { mask: 1 })
    ));
}

#[test]
fn test_nan_multiplier_rejected() {
    let mut settings = Settings::default();
    settings.acquisition.multipliers.torque = f64::NAN;
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("torque multiplier"));
}

#[test]
fn test_invalid_log_format_rejected() {
    let mut settings = Settings::default();
    settings.application.log_format = "xml".to_string();
    assert!(settings.validate().is_err());
}

#[test]
fn test_loop_settings_follow_storage_and_limits() {
    let mut settings = Settings::default();
    settings.limits.max_scan_rate_hz = 2000.0;
    settings.acquisition.read_timeout_secs = 0.5;
    settings.storage.output_dir = "data".into();

    let loop_settings = settings.loop_settings();
    assert_eq!(loop_settings.limits.max_scan_rate_hz, 2000.0);
    assert_eq!(loop_settings.read_timeout, Some(Duration::from_millis(500)));
    assert_eq!(loop_settings.output_dir, std::path::PathBuf::from("data"));
}

#[test]
#[serial]
fn test_rendered_toml_loads_back() {
    clear_env();
    let mut settings = Settings::default();
    settings.acquisition.mode = MeasurementMode::AngularVelocity;
    settings.acquisition.multipliers.angular_velocity = 0.25;

    let file = write_config(&settings.to_toml().unwrap());
    let loaded = Settings::load_from(file.path()).unwrap();
    assert_eq!(loaded.acquisition, settings.acquisition);
}
