//! State shared between the tracker actor and its handle.
//!
//! ```text
//! Actor ──writes──► SharedStatus ──reads──► Tracker::current_state / last_known_fix
//!   │                                        Tracker::status
//!   └──counts──► TrackerMetrics ──snapshot──► MetricsSnapshot
//! ```
//!
//! Only the actor writes. Locks are held for a copy, never across an await
//! or a subscriber callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::fix::LocationFix;
use crate::history::FixHistory;
use crate::source::AuthorizationStatus;
use crate::state::TrackerState;

/// Lock-free counters for one tracker instance.
///
/// All operations use `Relaxed` ordering; the counters are independent
/// measurements.
#[derive(Debug)]
pub struct TrackerMetrics {
    start_time: Instant,

    // === Fix metrics ===
    /// Raw fixes received from the source (current epoch)
    fixes_received: AtomicU64,
    /// Fixes that passed the filter
    fixes_accepted: AtomicU64,
    /// Fixes rejected by the filter or as implausible
    fixes_rejected: AtomicU64,
    /// Reports from a previous activation, discarded
    stale_reports: AtomicU64,

    // === Lifecycle metrics ===
    /// Errors reported by the source
    source_errors: AtomicU64,
    /// StateChanged events emitted
    state_transitions: AtomicU64,
    /// Successful activations (start or resume)
    activations: AtomicU64,
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            fixes_received: AtomicU64::new(0),
            fixes_accepted: AtomicU64::new(0),
            fixes_rejected: AtomicU64::new(0),
            stale_reports: AtomicU64::new(0),
            source_errors: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
            activations: AtomicU64::new(0),
        }
    }

    pub fn fix_received(&self) {
        self.fixes_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fix_accepted(&self) {
        self.fixes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fix_rejected(&self) {
        self.fixes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_report(&self) {
        self.stale_reports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn state_transition(&self) {
        self.state_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            fixes_received: self.fixes_received.load(Ordering::Relaxed),
            fixes_accepted: self.fixes_accepted.load(Ordering::Relaxed),
            fixes_rejected: self.fixes_rejected.load(Ordering::Relaxed),
            stale_reports: self.stale_reports.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
            activations: self.activations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`TrackerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    #[serde(serialize_with = "serialize_millis")]
    pub uptime: Duration,
    pub fixes_received: u64,
    pub fixes_accepted: u64,
    pub fixes_rejected: u64,
    pub stale_reports: u64,
    pub source_errors: u64,
    pub state_transitions: u64,
    pub activations: u64,
}

impl MetricsSnapshot {
    /// Share of received fixes that were accepted (0.0 with no fixes).
    pub fn acceptance_rate(&self) -> f64 {
        if self.fixes_received == 0 {
            0.0
        } else {
            self.fixes_accepted as f64 / self.fixes_received as f64
        }
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Answer to [`Tracker::status`](super::Tracker::status).
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStatus {
    pub state: TrackerState,
    /// Starting or Active.
    pub is_running: bool,
    pub authorization: AuthorizationStatus,
    /// Name of the fix source.
    pub source: String,
    pub last_fix: Option<LocationFix>,
    pub course_deg: Option<f64>,
    pub subscribers: usize,
    pub metrics: MetricsSnapshot,
}

/// State published by the actor for synchronous reads.
#[derive(Debug)]
pub(crate) struct SharedStatus {
    state: RwLock<TrackerState>,
    history: RwLock<FixHistory>,
    pub(crate) metrics: TrackerMetrics,
}

impl SharedStatus {
    pub(crate) fn new(history_size: usize) -> Self {
        Self {
            state: RwLock::new(TrackerState::Idle),
            history: RwLock::new(FixHistory::new(history_size)),
            metrics: TrackerMetrics::new(),
        }
    }

    pub(crate) fn state(&self) -> TrackerState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: TrackerState) {
        *self.state.write() = state;
    }

    pub(crate) fn record_fix(&self, fix: LocationFix) {
        self.history.write().push(fix);
    }

    pub(crate) fn last_fix(&self) -> Option<LocationFix> {
        self.history.read().latest().copied()
    }

    pub(crate) fn recent_fixes(&self) -> Vec<LocationFix> {
        self.history.read().to_vec()
    }

    pub(crate) fn course_deg(&self) -> Option<f64> {
        self.history.read().course_deg()
    }
}
