//! Outward event delivery.
//!
//! An [`EventChannel`] is what a subscriber hands to the tracker: the
//! registry calls [`deliver`](EventChannel::deliver) once per event, from
//! the tracker's own worker context. Adapters decide how the event crosses
//! into the host:
//!
//! - [`QueueChannel`] - forwards into a tokio queue for an async consumer
//! - [`HostEmitter`] - renders bridge-style named events with JSON payloads
//! - any `Fn(&TrackingEvent) + Send + Sync` closure

mod host;
mod queue;

pub use host::{
    render_event, ErrorPayload, HostEmitter, HostSink, LocationPayload, StatePayload, ERROR_EVENT,
    LOCATION_EVENT, STATE_CHANGED_EVENT,
};
pub use queue::QueueChannel;

use crate::event::TrackingEvent;

/// Receiver side of a subscription.
///
/// Implementations must not assume which thread calls them and should
/// return quickly; slow work belongs on the host's own executor.
pub trait EventChannel: Send + Sync + 'static {
    fn deliver(&self, event: &TrackingEvent);
}

impl<F> EventChannel for F
where
    F: Fn(&TrackingEvent) + Send + Sync + 'static,
{
    fn deliver(&self, event: &TrackingEvent) {
        self(event)
    }
}
