//! Push-based reporting to the collaborator.
//!
//! The acquisition loop calls [`Reporter::report`] synchronously after each frame and on
//! every status change. Delivery gates the next device read, so implementations must
//! return quickly; forward to a channel when the consumer is slow.

use crate::acquisition::engine::SessionSummary;
use crate::acquisition::state::SessionPhase;
use crate::acquisition::stats::{ChannelMetrics, Reading};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Session lifecycle change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    /// Phase entered.
    pub phase: SessionPhase,
    /// Time since the session started.
    pub elapsed: Duration,
    /// Present on the terminal transition back to Idle.
    pub summary: Option<SessionSummary>,
}

/// Values computed for one processed frame.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Wall-clock time the frame was processed; also the row timestamp.
    pub timestamp: DateTime<Local>,
    /// Per-channel aggregate statistics.
    pub metrics: Vec<ChannelMetrics>,
    /// Mode-specific derived values.
    pub readings: Vec<Reading>,
    /// Unit of `readings`.
    pub unit: &'static str,
}

/// Everything the loop tells the collaborator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session changed phase.
    Status(StatusChange),
    /// A frame was processed.
    Tick(TickReport),
    /// A row could not be written; sampling continues.
    PersistenceFailed {
        /// Session file.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },
    /// A read returned less than one complete time step.
    EmptyFrame {
        /// Samples in the read.
        samples: usize,
        /// Enabled channels.
        channels: usize,
    },
    /// `stop()` was called with no session running.
    NotRunning,
    /// `start()` was called while a session was running.
    AlreadyActive,
}

/// Receiver of session events.
pub trait Reporter: Send + Sync {
    /// Deliver one event.
    fn report(&self, event: SessionEvent);
}

impl<F> Reporter for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn report(&self, event: SessionEvent) {
        self(event)
    }
}

/// Forwards events into a tokio unbounded channel.
///
/// Sending never blocks, so the loop is never gated on an async consumer.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            trace!("Event receiver dropped");
        }
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: SessionEvent) {
        match event {
            SessionEvent::Status(change) => match change.summary {
                Some(summary) => info!(
                    phase = %change.phase,
                    elapsed_ms = change.elapsed.as_millis() as u64,
                    end_reason = %summary.end_reason,
                    rows = summary.rows_written,
                    "Session status"
                ),
                None => info!(
                    phase = %change.phase,
                    elapsed_ms = change.elapsed.as_millis() as u64,
                    "Session status"
                ),
            },
            SessionEvent::Tick(tick) => {
                let values: Vec<String> = tick
                    .readings
                    .iter()
                    .map(|r| format!("ch{}={:.4}", r.channel, r.value))
                    .collect();
                debug!(unit = tick.unit, readings = %values.join(" "), "Tick");
            }
            SessionEvent::PersistenceFailed { path, message } => {
                warn!(path = %path.display(), error = %message, "Row not persisted")
            }
            SessionEvent::EmptyFrame { samples, channels } => {
                debug!(samples, channels, "Empty frame")
            }
            SessionEvent::NotRunning => info!("Stop requested but no session is running"),
            SessionEvent::AlreadyActive => warn!("Start requested but a session is already active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn closures_are_reporters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = move |event: SessionEvent| sink.lock().push(event);

        reporter.report(SessionEvent::NotRunning);
        reporter.report(SessionEvent::AlreadyActive);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], SessionEvent::NotRunning));
    }

    #[tokio::test]
    async fn channel_reporter_forwards_events() {
        let (reporter, mut rx) = ChannelReporter::new();
        reporter.report(SessionEvent::EmptyFrame {
            samples: 1,
            channels: 2,
        });

        match rx.recv().await {
            Some(SessionEvent::EmptyFrame { samples, channels }) => {
                assert_eq!((samples, channels), (1, 2));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn tracing_reporter_accepts_every_event() {
        let reporter = TracingReporter;
        reporter.report(SessionEvent::Status(StatusChange {
            phase: SessionPhase::Running,
            elapsed: Duration::ZERO,
            summary: None,
        }));
        reporter.report(SessionEvent::Tick(TickReport {
            timestamp: Local::now(),
            metrics: vec![],
            readings: vec![Reading {
                channel: 0,
                value: 1.5,
            }],
            unit: "V",
        }));
        reporter.report(SessionEvent::PersistenceFailed {
            path: PathBuf::from("x.csv"),
            message: "read-only".into(),
        });
        reporter.report(SessionEvent::NotRunning);
    }

    #[test]
    fn channel_reporter_tolerates_dropped_receiver() {
        let (reporter, rx) = ChannelReporter::new();
        drop(rx);
        reporter.report(SessionEvent::NotRunning);
    }
}
