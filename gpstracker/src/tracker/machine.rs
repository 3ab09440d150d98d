//! Lifecycle state machine.
//!
//! [`Machine`] holds every piece of mutable tracker state and is only ever
//! touched by the actor task, so all transitions are serialized. Handlers
//! are synchronous: anything that has to wait on the source (activation,
//! deactivation) is returned to the actor as an [`Operation`] future, and
//! its result comes back through [`Machine::on_operation_complete`].
//!
//! At most one operation is in flight. Requests arriving meanwhile are
//! either coalesced into it (same transition) or deferred and replayed in
//! arrival order once it settles. The one exception is `stop` during an
//! activation, which takes effect immediately; the activation is marked
//! cancelled and the source is released as soon as it settles.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::status::SharedStatus;
use crate::config::{TrackerSettings, TrackingConfig};
use crate::event::{ErrorKind, TrackingEvent};
use crate::filter::FixFilter;
use crate::fix::LocationFix;
use crate::registry::SubscriptionRegistry;
use crate::source::{BoxFuture, FixSink, FixSource, FixSourceError, SourceLease, SourceReport};
use crate::state::TrackerState;

/// Resolves a caller's [`Completion`](super::Completion).
pub(crate) type Reply = oneshot::Sender<TrackerState>;

/// Source work running outside the machine.
pub(crate) type Operation = BoxFuture<'static, OpOutcome>;

pub(crate) enum OpOutcome {
    Activated(Result<(), FixSourceError>),
    Released,
}

/// Lifecycle transition requested by a caller.
#[derive(Debug)]
pub(crate) enum Lifecycle {
    Start(TrackingConfig),
    Stop,
    Suspend,
    Resume,
}

#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) op: Lifecycle,
    pub(crate) reply: Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReleaseReason {
    Stop,
    Suspend,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Activating { resume: bool },
    Releasing(ReleaseReason),
}

struct InFlight {
    kind: OpKind,
    /// Stop arrived while activating; the result is ignored.
    cancelled: bool,
    waiters: Vec<Reply>,
}

pub(crate) struct Machine {
    source: Arc<dyn FixSource>,
    settings: TrackerSettings,
    registry: Arc<SubscriptionRegistry>,
    shared: Arc<SharedStatus>,
    report_tx: mpsc::UnboundedSender<SourceReport>,

    state: TrackerState,
    /// Session thresholds; `None` outside a session.
    filter: Option<FixFilter>,
    lease: Option<SourceLease>,
    epoch: u64,
    /// Last fix accepted in the current session.
    last_accepted: Option<LocationFix>,
    platform_error_streak: u32,
    watchdog: Option<Instant>,
    in_flight: Option<InFlight>,
    deferred: VecDeque<Request>,
    fix_waiters: Vec<oneshot::Sender<LocationFix>>,
}

impl Machine {
    pub(crate) fn new(
        source: Arc<dyn FixSource>,
        settings: TrackerSettings,
        registry: Arc<SubscriptionRegistry>,
        shared: Arc<SharedStatus>,
        report_tx: mpsc::UnboundedSender<SourceReport>,
    ) -> Self {
        Self {
            source,
            settings,
            registry,
            shared,
            report_tx,
            state: TrackerState::Idle,
            filter: None,
            lease: None,
            epoch: 0,
            last_accepted: None,
            platform_error_streak: 0,
            watchdog: None,
            in_flight: None,
            deferred: VecDeque::new(),
            fix_waiters: Vec::new(),
        }
    }

    /// Deadline of the no-fix watchdog, if it is armed.
    pub(crate) fn watchdog_deadline(&self) -> Option<Instant> {
        if self.state == TrackerState::Active && self.in_flight.is_none() {
            self.watchdog
        } else {
            None
        }
    }

    pub(crate) fn is_releasing(&self) -> bool {
        matches!(
            self.in_flight,
            Some(InFlight {
                kind: OpKind::Releasing(_),
                ..
            })
        )
    }

    // =========================================================================
    // Requests
    // =========================================================================

    pub(crate) fn handle_request(&mut self, request: Request) -> Option<Operation> {
        if self.in_flight.is_some() {
            self.handle_while_busy(request);
            return None;
        }
        self.dispatch(request)
    }

    /// Register for the next accepted fix of the running session.
    pub(crate) fn wait_for_fix(&mut self, reply: oneshot::Sender<LocationFix>) {
        let resuming = matches!(
            self.in_flight,
            Some(InFlight {
                kind: OpKind::Activating { resume: true },
                cancelled: false,
                ..
            })
        );
        if self.state.is_running() || resuming {
            self.fix_waiters.push(reply);
        }
        // Otherwise the reply is dropped and the caller sees no location
    }

    fn dispatch(&mut self, request: Request) -> Option<Operation> {
        let Request { op, reply } = request;
        match op {
            Lifecycle::Start(config) => self.start(config, reply),
            Lifecycle::Stop => self.stop(reply),
            Lifecycle::Suspend => self.suspend(reply),
            Lifecycle::Resume => self.resume(reply),
        }
    }

    fn handle_while_busy(&mut self, request: Request) {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return;
        };

        let coalesce = match (&request.op, in_flight.kind) {
            (Lifecycle::Start(_), OpKind::Activating { resume: false }) => !in_flight.cancelled,
            (Lifecycle::Resume, OpKind::Activating { resume: true }) => !in_flight.cancelled,
            (Lifecycle::Stop, OpKind::Activating { .. }) => true,
            (Lifecycle::Stop, OpKind::Releasing(ReleaseReason::Stop)) => true,
            (Lifecycle::Suspend, OpKind::Releasing(ReleaseReason::Suspend)) => true,
            _ => false,
        };

        if !coalesce {
            debug!(request = ?request.op, "Operation in flight, request deferred");
            self.deferred.push_back(request);
            return;
        }

        in_flight.waiters.push(request.reply);
        let cancel = matches!(request.op, Lifecycle::Stop)
            && matches!(in_flight.kind, OpKind::Activating { .. })
            && !in_flight.cancelled;

        if cancel {
            in_flight.cancelled = true;
            info!(epoch = self.epoch, "Stop during activation, cancelling");
            self.enter_stopped();
        } else {
            debug!(request = ?request.op, "Request coalesced with operation in flight");
        }
    }

    fn start(&mut self, config: TrackingConfig, reply: Reply) -> Option<Operation> {
        if !self.state.can_start() {
            debug!(state = %self.state, "Start ignored, already running");
            let _ = reply.send(self.state);
            return None;
        }

        info!(
            min_distance_m = config.min_distance_m,
            min_interval_ms = config.min_interval.as_millis() as u64,
            desired_accuracy_m = config.desired_accuracy_m,
            timeout_ms = config.timeout.map(|t| t.as_millis() as u64),
            "Starting tracking session"
        );
        self.filter = Some(FixFilter::new(config));
        self.last_accepted = None;
        self.platform_error_streak = 0;
        self.transition(TrackerState::Starting);
        self.begin_activation(false, vec![reply])
    }

    fn stop(&mut self, reply: Reply) -> Option<Operation> {
        if self.state == TrackerState::Stopped {
            debug!("Stop ignored, already stopped");
            let _ = reply.send(self.state);
            return None;
        }

        self.enter_stopped();
        match self.lease.take() {
            Some(lease) => Some(self.begin_release(lease, ReleaseReason::Stop, vec![reply])),
            None => {
                let _ = reply.send(self.state);
                None
            }
        }
    }

    fn suspend(&mut self, reply: Reply) -> Option<Operation> {
        if self.state != TrackerState::Active {
            debug!(state = %self.state, "Suspend ignored, not active");
            let _ = reply.send(self.state);
            return None;
        }

        self.watchdog = None;
        self.fix_waiters.clear();
        self.transition(TrackerState::Suspended);
        match self.lease.take() {
            Some(lease) => Some(self.begin_release(lease, ReleaseReason::Suspend, vec![reply])),
            None => {
                let _ = reply.send(self.state);
                None
            }
        }
    }

    fn resume(&mut self, reply: Reply) -> Option<Operation> {
        if self.state != TrackerState::Suspended || self.filter.is_none() {
            debug!(state = %self.state, "Resume ignored, not suspended");
            let _ = reply.send(self.state);
            return None;
        }

        info!("Resuming tracking session");
        self.begin_activation(true, vec![reply])
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn begin_activation(&mut self, resume: bool, waiters: Vec<Reply>) -> Option<Operation> {
        let Some(config) = self.filter.as_ref().map(|f| f.config().clone()) else {
            resolve(waiters, self.state);
            return None;
        };

        self.epoch += 1;
        let epoch = self.epoch;
        self.lease = Some(SourceLease::acquire(Arc::clone(&self.source), epoch));
        self.in_flight = Some(InFlight {
            kind: OpKind::Activating { resume },
            cancelled: false,
            waiters,
        });

        let source = Arc::clone(&self.source);
        let sink = FixSink::new(epoch, self.report_tx.clone());
        let bound = config.timeout.unwrap_or(self.settings.activation_timeout);
        debug!(
            source = source.name(),
            epoch,
            timeout_ms = bound.as_millis() as u64,
            "Activating source"
        );

        Some(Box::pin(async move {
            let result = match tokio::time::timeout(bound, source.activate(&config, sink)).await {
                Ok(result) => result,
                Err(_) => Err(FixSourceError::Timeout),
            };
            OpOutcome::Activated(result)
        }))
    }

    fn begin_release(
        &mut self,
        lease: SourceLease,
        reason: ReleaseReason,
        waiters: Vec<Reply>,
    ) -> Operation {
        debug!(epoch = lease.epoch(), reason = ?reason, "Releasing source");
        self.in_flight = Some(InFlight {
            kind: OpKind::Releasing(reason),
            cancelled: false,
            waiters,
        });
        let release = lease.release();
        Box::pin(async move {
            release.await;
            OpOutcome::Released
        })
    }

    pub(crate) fn on_operation_complete(&mut self, outcome: OpOutcome) -> Option<Operation> {
        let Some(in_flight) = self.in_flight.take() else {
            return self.drain_deferred();
        };

        match outcome {
            OpOutcome::Activated(result) if in_flight.cancelled => {
                if let Err(e) = &result {
                    debug!(error = %e, "Cancelled activation failed");
                }
                if let Some(lease) = self.lease.take() {
                    return Some(self.begin_release(lease, ReleaseReason::Stop, in_flight.waiters));
                }
                resolve(in_flight.waiters, self.state);
            }
            OpOutcome::Activated(Ok(())) => {
                self.shared.metrics.activation();
                self.transition(TrackerState::Active);
                self.arm_watchdog();
                resolve(in_flight.waiters, self.state);
            }
            OpOutcome::Activated(Err(e)) => {
                if let Some(op) = self.fail(e.kind(), e.to_string(), in_flight.waiters) {
                    return Some(op);
                }
            }
            OpOutcome::Released => {
                resolve(in_flight.waiters, self.state);
            }
        }

        self.drain_deferred()
    }

    fn drain_deferred(&mut self) -> Option<Operation> {
        while let Some(request) = self.deferred.pop_front() {
            if let Some(op) = self.dispatch(request) {
                return Some(op);
            }
        }
        None
    }

    // =========================================================================
    // Source reports
    // =========================================================================

    pub(crate) fn on_report(&mut self, report: SourceReport) -> Option<Operation> {
        if report.epoch() != self.epoch {
            trace!(
                epoch = report.epoch(),
                current = self.epoch,
                "Stale source report discarded"
            );
            self.shared.metrics.stale_report();
            return None;
        }
        if self.state != TrackerState::Active {
            trace!(state = %self.state, "Source report outside active session discarded");
            return None;
        }

        match report.into_item() {
            Ok(fix) => {
                self.on_fix(fix);
                None
            }
            Err(e) => self.on_source_error(e),
        }
    }

    fn on_fix(&mut self, fix: LocationFix) {
        self.shared.metrics.fix_received();
        self.arm_watchdog();

        if !fix.is_plausible() {
            warn!(fix = %fix, "Implausible fix dropped");
            self.shared.metrics.fix_rejected();
            return;
        }
        self.platform_error_streak = 0;

        let Some(filter) = self.filter.as_ref() else {
            return;
        };
        let verdict = filter.evaluate(self.last_accepted.as_ref(), &fix);
        debug!(
            verdict = %verdict,
            lat = fix.latitude(),
            lon = fix.longitude(),
            accuracy_m = fix.horizontal_accuracy_m(),
            "Fix evaluated"
        );

        if !verdict.is_accepted() {
            self.shared.metrics.fix_rejected();
            return;
        }

        self.shared.metrics.fix_accepted();
        self.last_accepted = Some(fix);
        self.shared.record_fix(fix);
        self.registry.notify(TrackingEvent::FixAccepted(fix));
        for waiter in self.fix_waiters.drain(..) {
            let _ = waiter.send(fix);
        }
    }

    fn on_source_error(&mut self, error: FixSourceError) -> Option<Operation> {
        self.shared.metrics.source_error();
        let kind = error.kind();

        if kind.is_transient() && self.platform_error_streak < self.settings.platform_error_retries
        {
            self.platform_error_streak += 1;
            warn!(
                error = %error,
                streak = self.platform_error_streak,
                limit = self.settings.platform_error_retries,
                "Transient source error tolerated"
            );
            self.registry
                .notify(TrackingEvent::error(kind, error.to_string()));
            return None;
        }

        self.fail(kind, error.to_string(), Vec::new())
    }

    /// No fix arrived within the session timeout.
    pub(crate) fn on_watchdog(&mut self) -> Option<Operation> {
        self.watchdog = None;
        if self.state != TrackerState::Active {
            return None;
        }

        let timeout_ms = self
            .filter
            .as_ref()
            .and_then(|f| f.config().timeout)
            .map_or(0, |t| t.as_millis());
        self.fail(
            ErrorKind::Timeout,
            format!("no location fix within {} ms", timeout_ms),
            Vec::new(),
        )
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Publish the new state, then tell subscribers.
    fn transition(&mut self, next: TrackerState) {
        let previous = self.state;
        self.state = next;
        self.shared.set_state(next);
        self.shared.metrics.state_transition();
        info!(from = %previous, to = %next, "Tracker state changed");
        self.registry.notify(TrackingEvent::StateChanged(next));
    }

    fn enter_stopped(&mut self) {
        self.watchdog = None;
        self.fix_waiters.clear();
        self.filter = None;
        self.transition(TrackerState::Stopped);
    }

    /// Emit `Error`, enter `Failed(kind)` and release the source.
    fn fail(&mut self, kind: ErrorKind, message: String, waiters: Vec<Reply>) -> Option<Operation> {
        warn!(kind = %kind, message = %message, "Tracking failed");
        self.registry
            .notify(TrackingEvent::error(kind, message));
        self.watchdog = None;
        self.fix_waiters.clear();
        self.filter = None;
        self.transition(TrackerState::Failed(kind));

        match self.lease.take() {
            Some(lease) => Some(self.begin_release(lease, ReleaseReason::Failure, waiters)),
            None => {
                resolve(waiters, self.state);
                None
            }
        }
    }

    /// A deadline past the clock's range means the watchdog never fires.
    fn arm_watchdog(&mut self) {
        self.watchdog = self
            .filter
            .as_ref()
            .and_then(|f| f.config().timeout)
            .and_then(|timeout| Instant::now().checked_add(timeout));
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Release everything. Any in-flight activation must already be dropped.
    pub(crate) async fn shutdown(mut self) {
        if matches!(
            self.state,
            TrackerState::Starting | TrackerState::Active | TrackerState::Suspended
        ) {
            self.enter_stopped();
        }
        if let Some(lease) = self.lease.take() {
            lease.release().await;
        }

        let state = self.state;
        if let Some(in_flight) = self.in_flight.take() {
            resolve(in_flight.waiters, state);
        }
        for request in self.deferred.drain(..) {
            let _ = request.reply.send(state);
        }
        self.fix_waiters.clear();
        self.registry.clear();
        info!(state = %state, "Tracker shut down");
    }
}

fn resolve(waiters: Vec<Reply>, state: TrackerState) {
    for waiter in waiters {
        let _ = waiter.send(state);
    }
}
