//! Bridge-style event emitter.
//!
//! Maps [`TrackingEvent`]s onto the named events a scripting host listens
//! for, with camelCase JSON payloads:
//!
//! | Event            | Name             | Payload                                   |
//! |------------------|------------------|-------------------------------------------|
//! | `FixAccepted`    | `"location"`     | [`LocationPayload`]                       |
//! | `Error`          | `"error"`        | [`ErrorPayload`] (`code`, `kind`, `message`) |
//! | `StateChanged`   | `"stateChanged"` | [`StatePayload`] (`state`, `reason?`)      |

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::EventChannel;
use crate::event::TrackingEvent;
use crate::fix::LocationFix;
use crate::state::TrackerState;

pub const LOCATION_EVENT: &str = "location";
pub const ERROR_EVENT: &str = "error";
pub const STATE_CHANGED_EVENT: &str = "stateChanged";

/// Host-side emitter the payloads are handed to.
pub trait HostSink: Send + Sync + 'static {
    fn emit(&self, name: &str, payload: Value);
}

impl<F> HostSink for F
where
    F: Fn(&str, Value) + Send + Sync + 'static,
{
    fn emit(&self, name: &str, payload: Value) {
        self(name, payload)
    }
}

/// `"location"` payload.
///
/// Optional fix fields are reported as `0` when absent, the way mobile
/// location APIs fill them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub bearing: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub is_new_location: bool,
}

impl From<&LocationFix> for LocationPayload {
    fn from(fix: &LocationFix) -> Self {
        Self {
            latitude: fix.latitude(),
            longitude: fix.longitude(),
            altitude: fix.altitude_m().unwrap_or(0.0),
            accuracy: fix.horizontal_accuracy_m(),
            speed: fix.speed_mps().unwrap_or(0.0),
            bearing: fix.heading_deg().unwrap_or(0.0),
            timestamp: fix.timestamp().epoch_millis(),
            is_new_location: true,
        }
    }
}

/// `"error"` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
}

/// `"stateChanged"` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatePayload {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl From<TrackerState> for StatePayload {
    fn from(state: TrackerState) -> Self {
        let reason = match state {
            TrackerState::Failed(kind) => Some(kind.as_str()),
            _ => None,
        };
        Self {
            state: state.as_str(),
            reason,
        }
    }
}

/// [`EventChannel`] adapter emitting named JSON events into a [`HostSink`].
pub struct HostEmitter<S> {
    sink: S,
}

impl<S: HostSink> HostEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

/// Event name and JSON payload for `event`.
pub fn render_event(event: &TrackingEvent) -> Result<(&'static str, Value), serde_json::Error> {
    match event {
        TrackingEvent::FixAccepted(fix) => Ok((
            LOCATION_EVENT,
            serde_json::to_value(LocationPayload::from(fix))?,
        )),
        TrackingEvent::Error { kind, message } => Ok((
            ERROR_EVENT,
            serde_json::to_value(ErrorPayload {
                code: kind.code(),
                kind: kind.as_str(),
                message: message.clone(),
            })?,
        )),
        TrackingEvent::StateChanged(state) => Ok((
            STATE_CHANGED_EVENT,
            serde_json::to_value(StatePayload::from(*state))?,
        )),
    }
}

impl<S: HostSink> EventChannel for HostEmitter<S> {
    fn deliver(&self, event: &TrackingEvent) {
        match render_event(event) {
            Ok((name, payload)) => self.sink.emit(name, payload),
            Err(e) => warn!(event = event.name(), error = %e, "Failed to render host event"),
        }
    }
}
