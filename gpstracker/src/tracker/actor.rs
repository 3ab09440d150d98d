//! Actor task driving the [`Machine`].
//!
//! ```text
//! Tracker ──Command──►┐
//! FixSink ──Report───►├─► select! ──► Machine ──► SubscriptionRegistry
//! operation future ──►│
//! watchdog ──────────►┘
//! ```
//!
//! Priority: shutdown, then a settling operation, then commands, then
//! source reports, then the watchdog. Reports are not polled while an
//! operation is in flight, so a resumed session only sees reports once it
//! is Active.

use std::future::pending;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::machine::{Machine, OpOutcome, Operation, Request};
use crate::fix::LocationFix;
use crate::source::SourceReport;

/// Messages from the [`Tracker`](super::Tracker) handle.
pub(crate) enum Command {
    Lifecycle(Request),
    NextFix(oneshot::Sender<LocationFix>),
    Shutdown(oneshot::Sender<()>),
}

pub(crate) struct TrackerActor {
    machine: Machine,
    commands: mpsc::UnboundedReceiver<Command>,
    reports: mpsc::UnboundedReceiver<SourceReport>,
}

impl TrackerActor {
    pub(crate) fn new(
        machine: Machine,
        commands: mpsc::UnboundedReceiver<Command>,
        reports: mpsc::UnboundedReceiver<SourceReport>,
    ) -> Self {
        Self {
            machine,
            commands,
            reports,
        }
    }

    pub(crate) async fn run(self, shutdown: CancellationToken) {
        let Self {
            mut machine,
            mut commands,
            mut reports,
        } = self;
        let mut operation: Option<Operation> = None;
        let mut shutdown_reply = None;

        loop {
            let busy = operation.is_some();
            let deadline = machine.watchdog_deadline();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Tracker cancelled");
                    break;
                }

                outcome = settle(&mut operation), if busy => {
                    operation = machine.on_operation_complete(outcome);
                }

                command = commands.recv() => match command {
                    Some(Command::Lifecycle(request)) => {
                        if let Some(op) = machine.handle_request(request) {
                            operation = Some(op);
                        }
                    }
                    Some(Command::NextFix(reply)) => machine.wait_for_fix(reply),
                    Some(Command::Shutdown(reply)) => {
                        shutdown_reply = Some(reply);
                        break;
                    }
                    None => {
                        debug!("Tracker handle dropped");
                        break;
                    }
                },

                Some(report) = reports.recv(), if !busy => {
                    operation = machine.on_report(report);
                }

                _ = watchdog(deadline), if deadline.is_some() => {
                    operation = machine.on_watchdog();
                }
            }
        }

        // Let a deactivation finish; an unsettled activation is dropped and
        // its lease released by the machine.
        if let Some(op) = operation.take() {
            if machine.is_releasing() {
                op.await;
            }
        }
        machine.shutdown().await;
        drop(commands);
        drop(reports);

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }
}

async fn settle(operation: &mut Option<Operation>) -> OpOutcome {
    match operation {
        Some(op) => op.await,
        None => pending().await,
    }
}

async fn watchdog(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
