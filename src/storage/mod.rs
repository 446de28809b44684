//! Session persistence.
//!
//! [`recorder`] appends one `;`-delimited row per processed frame to a per-session
//! file; [`history`] reads those files back.

pub mod history;
pub mod recorder;

pub use history::{list_sessions, load_session, RecordedRow, SessionFile};
pub use recorder::{resolve_session_path, SessionRecorder};
