//! CLI Entry Point for energy-daq
//!
//! Provides command-line interface for:
//! - Running one acquisition session against the simulated device
//! - Listing recorded sessions
//! - Printing the effective settings
//!
//! # Usage
//!
//! ```bash
//! energy-daq run --mask 0b11 --samples 2000 --rate 1000 --mode power
//! energy-daq sessions
//! energy-daq config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use energy_daq::acquisition::{
    AcquisitionLoop, ChannelReporter, MeasurementMode, SessionEvent, SessionPhase,
};
use energy_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use energy_daq::hardware::mock::SimulatedScanDevice;
use energy_daq::storage::{list_sessions, load_session};
use energy_daq::tracing_setup;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "energy-daq")]
#[command(about = "Multi-channel energy acquisition", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one session against the simulated device (Ctrl+C stops it)
    Run(RunArgs),

    /// List recorded sessions
    Sessions {
        /// Directory to scan (defaults to storage.output_dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print the effective settings as TOML
    Config,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Channel mask, decimal or 0b/0x prefixed
    #[arg(long, value_parser = parse_mask)]
    mask: Option<u8>,

    /// Samples per channel
    #[arg(long)]
    samples: Option<u32>,

    /// Scan rate in Hz
    #[arg(long)]
    rate: Option<f64>,

    /// voltage, current, power, torque or angular_velocity
    #[arg(long)]
    mode: Option<MeasurementMode>,

    #[arg(long)]
    current_multiplier: Option<f64>,

    #[arg(long)]
    torque_multiplier: Option<f64>,

    #[arg(long)]
    angular_velocity_multiplier: Option<f64>,

    /// Scan until stopped
    #[arg(long)]
    continuous: bool,

    /// Directory for the session file
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn parse_mask(s: &str) -> Result<u8, String> {
    let parsed = if let Some(bits) = s.strip_prefix("0b") {
        u8::from_str_radix(bits, 2)
    } else if let Some(hex) = s.strip_prefix("0x") {
        u8::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid channel mask '{}': {}", s, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Run(args) => {
            apply_overrides(&mut settings, args);
            settings.validate()?;
            tracing_setup::init_from_settings(&settings).map_err(anyhow::Error::msg)?;
            run_session(settings).await
        }
        Commands::Sessions { dir } => {
            let dir = dir.unwrap_or_else(|| settings.storage.output_dir.clone());
            print_sessions(&dir)
        }
        Commands::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

fn apply_overrides(settings: &mut Settings, args: RunArgs) {
    let acq = &mut settings.acquisition;
    if let Some(mask) = args.mask {
        acq.channel_mask = mask;
    }
    if let Some(samples) = args.samples {
        acq.sample_count = samples;
    }
    if let Some(rate) = args.rate {
        acq.scan_rate_hz = rate;
    }
    if let Some(mode) = args.mode {
        acq.mode = mode;
    }
    if let Some(m) = args.current_multiplier {
        acq.multipliers.current = m;
    }
    if let Some(m) = args.torque_multiplier {
        acq.multipliers.torque = m;
    }
    if let Some(m) = args.angular_velocity_multiplier {
        acq.multipliers.angular_velocity = m;
    }
    acq.continuous |= args.continuous;
    if let Some(dir) = args.output_dir {
        settings.storage.output_dir = dir;
    }
}

async fn run_session(settings: Settings) -> Result<()> {
    let config = settings.scan_configuration();
    let (reporter, events) = ChannelReporter::new();
    let device = SimulatedScanDevice::new()
        .with_scans_per_read(100)
        .with_real_time(true);
    let acq = Arc::new(AcquisitionLoop::new(
        device,
        Arc::new(reporter),
        settings.loop_settings(),
    ));

    println!(
        "Session: mask {} ({} channels), {} samples @ {} Hz, mode {}",
        config.channel_mask,
        config.channel_mask.count(),
        config.requested_sample_count,
        config.scan_rate_hz,
        config.mode
    );
    println!("Press Ctrl+C to stop");

    let printer = tokio::spawn(print_events(events));

    let worker = Arc::clone(&acq);
    let mut session = tokio::task::spawn_blocking(move || worker.start(config));

    let result = tokio::select! {
        joined = &mut session => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received");
            acq.stop();
            session.await
        }
    };

    // Dropping the loop drops the reporter and closes the event channel.
    drop(acq);
    let summary = result.context("acquisition task panicked")??;
    printer.await.context("event printer panicked")?;

    println!();
    println!("Session ended: {}", summary.end_reason);
    println!("   Elapsed: {:.3} s", summary.elapsed.as_secs_f64());
    println!("   Samples per channel: {}", summary.samples_per_channel);
    println!(
        "   Rows: {} written, {} failed",
        summary.rows_written, summary.persistence_failures
    );
    println!("   File: {}", summary.path.display());

    match summary.end_reason.as_error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

async fn print_events(mut events: UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Tick(tick) => {
                let line: Vec<String> = tick
                    .metrics
                    .iter()
                    .map(|m| format!("ch{} rms={} peak={} cf={}", m.channel, m.urms, m.upeak, m.crest_factor))
                    .collect();
                let values: Vec<String> = tick
                    .readings
                    .iter()
                    .map(|r| format!("{:.4} {}", r.value, tick.unit))
                    .collect();
                println!(
                    "{}  {}  |  {}",
                    tick.timestamp.format("%H:%M:%S%.3f"),
                    values.join("  "),
                    line.join("  ")
                );
            }
            SessionEvent::Status(change) if change.phase == SessionPhase::Faulted => {
                eprintln!("Session faulted after {:.3} s", change.elapsed.as_secs_f64());
            }
            SessionEvent::PersistenceFailed { path, message } => {
                warn!(path = %path.display(), error = %message, "Row not persisted");
            }
            _ => {}
        }
    }
}

fn print_sessions(dir: &std::path::Path) -> Result<()> {
    let sessions = list_sessions(dir).with_context(|| format!("reading {}", dir.display()))?;
    if sessions.is_empty() {
        println!("No sessions in {}", dir.display());
        return Ok(());
    }

    for session in sessions {
        match load_session(&session.path) {
            Ok(rows) => {
                let unit = rows.first().map(|r| r.unit.as_str()).unwrap_or("-");
                println!(
                    "{}  {:<16} {:>6} rows  [{}]  {}",
                    session.date,
                    session.mode,
                    rows.len(),
                    unit,
                    session.path.display()
                );
            }
            Err(e) => println!("{}  {:<16} unreadable: {}", session.date, session.mode, e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_parser_accepts_prefixes() {
        assert_eq!(parse_mask("3"), Ok(3));
        assert_eq!(parse_mask("0b1010"), Ok(0b1010));
        assert_eq!(parse_mask("0xff"), Ok(255));
        assert!(parse_mask("256").is_err());
        assert!(parse_mask("0b2").is_err());
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut settings = Settings::default();
        let cli = Cli::parse_from([
            "energy-daq",
            "run",
            "--mask",
            "0b1111",
            "--mode",
            "power",
            "--current-multiplier",
            "1.5",
            "--continuous",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        apply_overrides(&mut settings, args);

        assert_eq!(settings.acquisition.channel_mask, 0b1111);
        assert_eq!(settings.acquisition.mode, MeasurementMode::Power);
        assert_eq!(settings.acquisition.multipliers.current, 1.5);
        assert!(settings.acquisition.continuous);
        assert!(settings.validate().is_ok());
    }
}
