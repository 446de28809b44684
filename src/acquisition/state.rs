//! Session lifecycle state.
//!
//! ```text
//! Idle ──start──> Running ──budget reached / stop──> Idle
//!                    │
//!                 overrun / device error
//!                    ▼
//!                 Faulted ──cleanup──> Idle
//! ```

use crate::acquisition::mask::ChannelMask;
use std::fmt;
use std::time::{Duration, Instant};

/// Coarse lifecycle phase, as reported to the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No session.
    Idle,
    /// Read cycle in progress.
    Running,
    /// A fatal device condition ended the session; cleanup pending.
    Faulted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "Idle"),
            SessionPhase::Running => write!(f, "Running"),
            SessionPhase::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Bookkeeping owned by a running session.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// Mask the device was started with.
    pub mask: ChannelMask,
    /// Monotonic start time.
    pub started_at: Instant,
    /// Cumulative demultiplexed samples per channel.
    pub samples_per_channel: u64,
}

impl ActiveSession {
    /// Fresh session bookkeeping starting now.
    pub fn new(mask: ChannelMask) -> Self {
        Self {
            mask,
            started_at: Instant::now(),
            samples_per_channel: 0,
        }
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Full session state held by the acquisition loop.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// No session.
    #[default]
    Idle,
    /// Session in progress.
    Running(ActiveSession),
    /// Session aborted by a fatal device condition.
    Faulted(ActiveSession),
}

impl SessionState {
    /// Coarse phase of this state.
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Running(_) => SessionPhase::Running,
            SessionState::Faulted(_) => SessionPhase::Faulted,
        }
    }

    /// Session bookkeeping, when one exists.
    pub fn session(&self) -> Option<&ActiveSession> {
        match self {
            SessionState::Idle => None,
            SessionState::Running(s) | SessionState::Faulted(s) => Some(s),
        }
    }

    /// True while the read cycle is active.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running(_))
    }

    /// Whether the lifecycle permits moving from `self` to `target`.
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        matches!(
            (self.phase(), target),
            (SessionPhase::Idle, SessionPhase::Running)
                | (SessionPhase::Running, SessionPhase::Idle)
                | (SessionPhase::Running, SessionPhase::Faulted)
                | (SessionPhase::Faulted, SessionPhase::Idle)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        let idle = SessionState::Idle;
        let running = SessionState::Running(ActiveSession::new(ChannelMask::new(1)));
        let faulted = SessionState::Faulted(ActiveSession::new(ChannelMask::new(1)));

        assert!(idle.can_transition_to(SessionPhase::Running));
        assert!(running.can_transition_to(SessionPhase::Idle));
        assert!(running.can_transition_to(SessionPhase::Faulted));
        assert!(faulted.can_transition_to(SessionPhase::Idle));
    }

    #[test]
    fn invalid_transitions() {
        let idle = SessionState::Idle;
        let faulted = SessionState::Faulted(ActiveSession::new(ChannelMask::new(1)));

        assert!(!idle.can_transition_to(SessionPhase::Faulted));
        assert!(!idle.can_transition_to(SessionPhase::Idle));
        assert!(!faulted.can_transition_to(SessionPhase::Running));
    }

    #[test]
    fn session_is_visible_while_running_or_faulted() {
        assert!(SessionState::Idle.session().is_none());
        let state = SessionState::Running(ActiveSession::new(ChannelMask::new(0b11)));
        assert_eq!(state.session().map(|s| s.mask.bits()), Some(0b11));
        assert!(state.is_running());
    }
}
