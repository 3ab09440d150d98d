//! Tracker handle and lifecycle.
//!
//! [`Tracker::spawn`] starts one actor task that owns the state machine. The
//! handle talks to it over a command channel; lifecycle calls return a
//! [`Completion`] resolving to the state the tracker settled in, and
//! synchronous reads (`current_state`, `last_known_fix`, `status`) come from
//! state the actor publishes before notifying subscribers.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gpstracker::{ScriptedSource, Tracker, TrackerSettings, TrackingConfig, TrackingEvent};
//!
//! # async fn run() -> Result<(), gpstracker::TrackerError> {
//! let (source, _handle) = ScriptedSource::new();
//! let tracker = Tracker::spawn(Arc::new(source), TrackerSettings::default())?;
//!
//! tracker.subscribe(|event: &TrackingEvent| println!("{}", event.name()));
//! let state = tracker.start(TrackingConfig::default())?.await?;
//! println!("tracker is {}", state);
//!
//! tracker.stop().await?;
//! tracker.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod actor;
mod machine;
mod status;

pub use status::{MetricsSnapshot, TrackerMetrics, TrackerStatus};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::channel::EventChannel;
use crate::config::{TrackerSettings, TrackingConfig};
use crate::error::TrackerError;
use crate::fix::LocationFix;
use crate::registry::{Subscription, SubscriptionId, SubscriptionRegistry};
use crate::source::FixSource;
use crate::state::TrackerState;
use actor::{Command, TrackerActor};
use machine::{Lifecycle, Machine, Request};
use status::SharedStatus;

/// Settles with the tracker state once a lifecycle request has been applied.
///
/// Dropping it does not cancel the request.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<TrackerState>,
}

impl Future for Completion {
    type Output = Result<TrackerState, TrackerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| TrackerError::ShutDown))
    }
}

/// Handle to one location tracker.
///
/// Each tracker is independent; there is no process-wide instance. Dropping
/// the handle tears the tracker down: the source is released and all
/// subscriptions are dropped.
pub struct Tracker {
    commands: mpsc::UnboundedSender<Command>,
    registry: Arc<SubscriptionRegistry>,
    shared: Arc<SharedStatus>,
    source: Arc<dyn FixSource>,
    configured: Mutex<TrackingConfig>,
    shutdown: CancellationToken,
}

impl Tracker {
    /// Validate `settings` and spawn the tracker on the current tokio runtime.
    pub fn spawn(
        source: Arc<dyn FixSource>,
        settings: TrackerSettings,
    ) -> Result<Self, TrackerError> {
        settings.validate()?;
        let runtime = Handle::try_current().map_err(|_| TrackerError::NoRuntime)?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let shared = Arc::new(SharedStatus::new(settings.history_size));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        info!(
            source = source.name(),
            history_size = settings.history_size,
            platform_error_retries = settings.platform_error_retries,
            "Spawning tracker"
        );

        let machine = Machine::new(
            Arc::clone(&source),
            settings,
            Arc::clone(&registry),
            Arc::clone(&shared),
            report_tx,
        );
        let actor = TrackerActor::new(machine, command_rx, report_rx);
        runtime.spawn(actor.run(shutdown.clone()));

        Ok(Self {
            commands: command_tx,
            registry,
            shared,
            source,
            configured: Mutex::new(TrackingConfig::default()),
            shutdown,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Begin a tracking session.
    ///
    /// An invalid `config` is rejected here and the state is left unchanged.
    /// Starting while already Starting, Active or Suspended settles with the
    /// current state.
    pub fn start(&self, config: TrackingConfig) -> Result<Completion, TrackerError> {
        config.validate()?;
        Ok(self.request(Lifecycle::Start(config)))
    }

    /// Stop tracking and release the source. Idempotent.
    pub fn stop(&self) -> Completion {
        self.request(Lifecycle::Stop)
    }

    /// Release the source but keep the session. No-op unless Active.
    pub fn suspend(&self) -> Completion {
        self.request(Lifecycle::Suspend)
    }

    /// Re-activate a suspended session. No-op unless Suspended.
    pub fn resume(&self) -> Completion {
        self.request(Lifecycle::Resume)
    }

    /// Store a configuration for [`start_configured`](Self::start_configured).
    pub fn configure(&self, config: TrackingConfig) -> Result<(), TrackerError> {
        config.validate()?;
        *self.configured.lock() = config;
        Ok(())
    }

    /// Configuration stored by [`configure`](Self::configure).
    pub fn configured(&self) -> TrackingConfig {
        self.configured.lock().clone()
    }

    /// Start with the stored configuration.
    pub fn start_configured(&self) -> Result<Completion, TrackerError> {
        let config = self.configured();
        self.start(config)
    }

    fn request(&self, op: Lifecycle) -> Completion {
        let (reply, rx) = oneshot::channel();
        // A closed channel drops the reply; the completion reports ShutDown
        let _ = self
            .commands
            .send(Command::Lifecycle(Request { op, reply }));
        Completion { rx }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Receive every event emitted from now on.
    pub fn subscribe(&self, channel: impl EventChannel) -> SubscriptionId {
        self.registry.subscribe(channel)
    }

    /// Stop delivery to `id`. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.subscriptions()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn current_state(&self) -> TrackerState {
        self.shared.state()
    }

    /// Most recently accepted fix, kept across sessions.
    pub fn last_known_fix(&self) -> Option<LocationFix> {
        self.shared.last_fix()
    }

    /// Accepted fixes still in the history, oldest first.
    pub fn recent_fixes(&self) -> Vec<LocationFix> {
        self.shared.recent_fixes()
    }

    /// Course over ground from the latest heading or the fix history.
    pub fn course_deg(&self) -> Option<f64> {
        self.shared.course_deg()
    }

    /// The cached fix, or the next accepted one within `wait`.
    ///
    /// Fails with [`TrackerError::NoLocation`] when nothing is cached and the
    /// tracker is not running, or when `wait` elapses.
    pub async fn current_location(&self, wait: Duration) -> Result<LocationFix, TrackerError> {
        if let Some(fix) = self.last_known_fix() {
            return Ok(fix);
        }
        if !self.current_state().is_running() {
            return Err(TrackerError::NoLocation);
        }

        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::NextFix(reply))
            .map_err(|_| TrackerError::ShutDown)?;

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(fix)) => Ok(fix),
            _ => Err(TrackerError::NoLocation),
        }
    }

    pub fn status(&self) -> TrackerStatus {
        let state = self.current_state();
        TrackerStatus {
            state,
            is_running: state.is_running(),
            authorization: self.source.authorization(),
            source: self.source.name().to_string(),
            last_fix: self.last_known_fix(),
            course_deg: self.course_deg(),
            subscribers: self.registry.len(),
            metrics: self.shared.metrics.snapshot(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop the tracker for good and wait until the source is released.
    ///
    /// Pending lifecycle requests settle with the final state; later ones
    /// fail with [`TrackerError::ShutDown`].
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(reply)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Whether the actor has stopped.
    pub fn is_shut_down(&self) -> bool {
        self.commands.is_closed()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("source", &self.source.name())
            .field("state", &self.current_state())
            .field("subscribers", &self.registry.len())
            .finish()
    }
}
