//! Events delivered to subscribers.

use std::fmt;

use crate::fix::LocationFix;
use crate::state::TrackerState;

/// Classification of every failure the tracker can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Tracking configuration rejected before any side effect.
    Config,
    /// The user or OS denied location access.
    PermissionDenied,
    /// No positioning hardware or service available.
    HardwareUnavailable,
    /// No fix (or no activation result) within the configured timeout.
    Timeout,
    /// Opaque platform failure with its native code.
    Platform(i32),
}

impl ErrorKind {
    /// Stable upper-case identifier, as used in host error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::HardwareUnavailable => "HARDWARE_UNAVAILABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Platform(_) => "PLATFORM_ERROR",
        }
    }

    /// Numeric code for hosts that key errors by number.
    ///
    /// Platform errors keep their native code.
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::PermissionDenied => 1,
            ErrorKind::HardwareUnavailable => 2,
            ErrorKind::Timeout => 3,
            ErrorKind::Config => 4,
            ErrorKind::Platform(code) => *code,
        }
    }

    /// Whether the failure may clear up without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Platform(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Platform(code) => write!(f, "{}({})", self.as_str(), code),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Everything a subscriber can observe.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// A raw fix passed the filter.
    FixAccepted(LocationFix),
    /// The tracker entered a new lifecycle state.
    StateChanged(TrackerState),
    /// A failure was classified; always precedes the matching `StateChanged(Failed)`.
    Error { kind: ErrorKind, message: String },
}

impl TrackingEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        TrackingEvent::Error {
            kind,
            message: message.into(),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            TrackingEvent::FixAccepted(_) => "fix_accepted",
            TrackingEvent::StateChanged(_) => "state_changed",
            TrackingEvent::Error { .. } => "error",
        }
    }
}
