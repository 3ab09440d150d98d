//! Deterministic in-process fix source.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{AuthorizationStatus, BoxFuture, FixSink, FixSource, FixSourceError};
use crate::config::TrackingConfig;
use crate::fix::LocationFix;

/// How the next `activate` call settles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActivationOutcome {
    #[default]
    Succeed,
    Fail(FixSourceError),
    /// Never settles; exercises activation timeouts.
    Hang,
}

#[derive(Default)]
struct Inner {
    outcome: ActivationOutcome,
    delay: Duration,
    authorization: AuthorizationStatus,
    sink: Option<FixSink>,
    last_sink: Option<FixSink>,
    activate_calls: usize,
    deactivate_calls: usize,
}

struct Shared {
    inner: Mutex<Inner>,
    activated: Notify,
}

/// Fix source whose behavior is scripted through a [`ScriptedHandle`].
///
/// Hosts that already receive positions from their own platform callback
/// can use it as the bridge into the tracker: hand the source to
/// [`Tracker::spawn`](crate::tracker::Tracker::spawn) and push fixes through
/// the handle. Tests use the call counters and activation controls.
pub struct ScriptedSource {
    shared: Arc<Shared>,
}

/// Control side of a [`ScriptedSource`].
#[derive(Clone)]
pub struct ScriptedHandle {
    shared: Arc<Shared>,
}

impl ScriptedSource {
    pub fn new() -> (Self, ScriptedHandle) {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                authorization: AuthorizationStatus::AuthorizedWhenInUse,
                ..Inner::default()
            }),
            activated: Notify::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ScriptedHandle { shared },
        )
    }
}

impl FixSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn activate<'a>(
        &'a self,
        _config: &'a TrackingConfig,
        sink: FixSink,
    ) -> BoxFuture<'a, Result<(), FixSourceError>> {
        Box::pin(async move {
            let (delay, outcome) = {
                let mut inner = self.shared.inner.lock();
                inner.activate_calls += 1;
                if inner.sink.is_some() {
                    return Ok(());
                }
                (inner.delay, inner.outcome.clone())
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match outcome {
                ActivationOutcome::Succeed => {
                    {
                        let mut inner = self.shared.inner.lock();
                        inner.last_sink = Some(sink.clone());
                        inner.sink = Some(sink);
                    }
                    self.shared.activated.notify_waiters();
                    Ok(())
                }
                ActivationOutcome::Fail(error) => Err(error),
                ActivationOutcome::Hang => std::future::pending().await,
            }
        })
    }

    fn deactivate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.shared.inner.lock();
            inner.deactivate_calls += 1;
            inner.sink = None;
        })
    }

    fn authorization(&self) -> AuthorizationStatus {
        self.shared.inner.lock().authorization
    }
}

impl ScriptedHandle {
    /// Push a fix into the active sink. `false` when not active.
    pub fn push_fix(&self, fix: LocationFix) -> bool {
        self.push(Ok(fix))
    }

    /// Push a failure into the active sink. `false` when not active.
    pub fn push_error(&self, error: FixSourceError) -> bool {
        self.push(Err(error))
    }

    fn push(&self, item: Result<LocationFix, FixSourceError>) -> bool {
        // Clone out so the lock is not held while sending
        let sink = self.shared.inner.lock().sink.clone();
        sink.map_or(false, |sink| sink.push(item))
    }

    /// Sink of the most recent successful activation, even after deactivation.
    pub fn last_sink(&self) -> Option<FixSink> {
        self.shared.inner.lock().last_sink.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shared.inner.lock().sink.is_some()
    }

    /// Wait until an activation has succeeded.
    pub async fn wait_active(&self) {
        loop {
            let notified = self.shared.activated.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_active() {
                return;
            }
            notified.await;
        }
    }

    pub fn set_outcome(&self, outcome: ActivationOutcome) {
        self.shared.inner.lock().outcome = outcome;
    }

    pub fn set_activation_delay(&self, delay: Duration) {
        self.shared.inner.lock().delay = delay;
    }

    pub fn set_authorization(&self, status: AuthorizationStatus) {
        self.shared.inner.lock().authorization = status;
    }

    pub fn activate_calls(&self) -> usize {
        self.shared.inner.lock().activate_calls
    }

    pub fn deactivate_calls(&self) -> usize {
        self.shared.inner.lock().deactivate_calls
    }
}
