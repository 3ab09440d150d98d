//! Positioning sources.
//!
//! A [`FixSource`] wraps the OS positioning service (or a stand-in for it).
//! The tracker activates it with a [`FixSink`]; the source then pushes raw
//! fixes and failures into the sink from whatever thread its platform
//! callbacks run on. Everything pushed is processed by the tracker's actor
//! strictly in arrival order.
//!
//! # Implementations
//!
//! - [`ScriptedSource`] - deterministic in-process source driven by a handle
//! - [`ReplaySource`] - replays a recorded track on a timer

mod lease;
mod replay;
mod scripted;

pub use lease::SourceLease;
pub use replay::{ReplaySource, TrackPoint, PLAYBACK_OUT_OF_RANGE};
pub use scripted::{ActivationOutcome, ScriptedHandle, ScriptedSource};

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::TrackingConfig;
use crate::event::ErrorKind;
use crate::fix::LocationFix;

/// Boxed future used by the dyn-compatible [`FixSource`] trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failures reported by a fix source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixSourceError {
    #[error("location permission not granted")]
    PermissionDenied,

    #[error("location hardware unavailable")]
    HardwareUnavailable,

    #[error("location source timed out")]
    Timeout,

    #[error("platform error {code}: {message}")]
    PlatformError { code: i32, message: String },
}

impl FixSourceError {
    pub fn platform(code: i32, message: impl Into<String>) -> Self {
        FixSourceError::PlatformError {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FixSourceError::PermissionDenied => ErrorKind::PermissionDenied,
            FixSourceError::HardwareUnavailable => ErrorKind::HardwareUnavailable,
            FixSourceError::Timeout => ErrorKind::Timeout,
            FixSourceError::PlatformError { code, .. } => ErrorKind::Platform(*code),
        }
    }
}

/// Location authorization as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    AuthorizedAlways,
    AuthorizedWhenInUse,
    Denied,
    Restricted,
    #[default]
    NotDetermined,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedAlways | AuthorizationStatus::AuthorizedWhenInUse
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::AuthorizedAlways => "authorizedAlways",
            AuthorizationStatus::AuthorizedWhenInUse => "authorizedWhenInUse",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Restricted => "restricted",
            AuthorizationStatus::NotDetermined => "notDetermined",
        }
    }
}

/// One item pushed by a source, tagged with the activation it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    epoch: u64,
    item: Result<LocationFix, FixSourceError>,
}

impl SourceReport {
    /// Activation epoch the sink was issued for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn item(&self) -> &Result<LocationFix, FixSourceError> {
        &self.item
    }

    pub fn into_item(self) -> Result<LocationFix, FixSourceError> {
        self.item
    }
}

/// Push handle given to a source on activation.
///
/// Cheap to clone and safe to use from any thread. Every activation gets a
/// sink with a fresh epoch, so reports from a previous activation that
/// arrive late are recognized and discarded by the tracker.
#[derive(Debug, Clone)]
pub struct FixSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<SourceReport>,
}

impl FixSink {
    /// Create a sink and the receiving end of its queue.
    pub fn channel(epoch: u64) -> (Self, mpsc::UnboundedReceiver<SourceReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { epoch, tx }, rx)
    }

    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<SourceReport>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Push a fix or failure. Returns `false` once the tracker is gone.
    pub fn push(&self, item: Result<LocationFix, FixSourceError>) -> bool {
        self.tx
            .send(SourceReport {
                epoch: self.epoch,
                item,
            })
            .is_ok()
    }

    pub fn fix(&self, fix: LocationFix) -> bool {
        self.push(Ok(fix))
    }

    pub fn error(&self, error: FixSourceError) -> bool {
        self.push(Err(error))
    }

    /// `true` once the receiving tracker has shut down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Abstraction over a positioning service.
///
/// Contract:
/// - `activate` while already active is a no-op returning `Ok(())`
/// - `deactivate` while inactive is a no-op
/// - after `deactivate` returns, the source no longer pushes into the sink
///   it was activated with
///
/// Methods take `&self`; implementations keep their mutable state behind a
/// lock so one source can be shared between the tracker and its owner.
pub trait FixSource: Send + Sync + 'static {
    /// Short identifier for logs and status.
    fn name(&self) -> &str;

    /// Acquire the positioning resource and begin pushing into `sink`.
    fn activate<'a>(
        &'a self,
        config: &'a TrackingConfig,
        sink: FixSink,
    ) -> BoxFuture<'a, Result<(), FixSourceError>>;

    /// Stop pushing and release the positioning resource.
    fn deactivate(&self) -> BoxFuture<'_, ()>;

    /// Current authorization, if the platform exposes it.
    fn authorization(&self) -> AuthorizationStatus {
        AuthorizationStatus::NotDetermined
    }
}
