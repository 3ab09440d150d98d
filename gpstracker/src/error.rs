//! Errors returned by the [`Tracker`](crate::tracker::Tracker) handle.

use thiserror::Error;

use crate::config::ConfigError;

/// Failures of tracker handle operations.
///
/// Source failures are never returned here; they reach subscribers as
/// `Error` events followed by a `Failed` state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// Rejected configuration. The tracker state is unchanged.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The tracker's worker has shut down.
    #[error("tracker has shut down")]
    ShutDown,

    /// No fix is cached and none arrived in time.
    #[error("no location available")]
    NoLocation,

    /// The tracker must be spawned from within a tokio runtime.
    #[error("no tokio runtime available to run the tracker")]
    NoRuntime,
}
