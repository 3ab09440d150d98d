//! Tracker lifecycle states.
//!
//! ```text
//!   Idle / Stopped / Failed
//!           │ start
//!           ▼
//!       Starting ──activate err──► Failed(kind)
//!           │ activate ok
//!           ▼
//!        Active ◄──resume──┐
//!           │ suspend      │
//!           └────────► Suspended
//!
//!   any ──stop──► Stopped
//! ```

use std::fmt;

use crate::event::ErrorKind;

/// Current lifecycle state of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackerState {
    /// Never started.
    #[default]
    Idle,
    /// Source activation in flight.
    Starting,
    /// Source active, fixes flowing to subscribers.
    Active,
    /// Source released, subscriptions kept, waiting for resume.
    Suspended,
    /// Stopped by request.
    Stopped,
    /// Stopped by an error.
    Failed(ErrorKind),
}

impl TrackerState {
    /// A new `start()` is accepted from these states.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            TrackerState::Idle | TrackerState::Stopped | TrackerState::Failed(_)
        )
    }

    /// The source is (or is being) held.
    pub fn is_running(&self) -> bool {
        matches!(self, TrackerState::Starting | TrackerState::Active)
    }

    /// Stopped or Failed: nothing happens until the next start.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackerState::Stopped | TrackerState::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::Starting => "starting",
            TrackerState::Active => "active",
            TrackerState::Suspended => "suspended",
            TrackerState::Stopped => "stopped",
            TrackerState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Failed(kind) => write!(f, "failed({})", kind),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_allowed_from_rest_states() {
        assert!(TrackerState::Idle.can_start());
        assert!(TrackerState::Stopped.can_start());
        assert!(TrackerState::Failed(ErrorKind::Timeout).can_start());
        assert!(!TrackerState::Starting.can_start());
        assert!(!TrackerState::Active.can_start());
        assert!(!TrackerState::Suspended.can_start());
    }

    #[test]
    fn test_display() {
        assert_eq!(TrackerState::Active.to_string(), "active");
        assert_eq!(
            TrackerState::Failed(ErrorKind::PermissionDenied).to_string(),
            "failed(PERMISSION_DENIED)"
        );
    }
}
