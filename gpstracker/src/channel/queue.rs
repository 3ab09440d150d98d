use tokio::sync::mpsc;
use tracing::trace;

use super::EventChannel;
use crate::event::TrackingEvent;

/// Forwards every event into an unbounded tokio queue.
///
/// Delivery never blocks the tracker. Once the receiver is dropped events
/// are discarded.
#[derive(Debug, Clone)]
pub struct QueueChannel {
    tx: mpsc::UnboundedSender<TrackingEvent>,
}

impl QueueChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TrackingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventChannel for QueueChannel {
    fn deliver(&self, event: &TrackingEvent) {
        if self.tx.send(event.clone()).is_err() {
            trace!(event = event.name(), "Queue receiver dropped, event discarded");
        }
    }
}
