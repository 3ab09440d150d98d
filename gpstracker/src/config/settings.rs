//! Tracker-wide settings that outlive individual tracking sessions.

use std::time::Duration;

use super::tracking::ConfigError;

/// Default number of accepted fixes kept in memory.
pub const DEFAULT_HISTORY_SIZE: usize = 1;

/// Largest accepted history capacity.
pub const MAX_HISTORY_SIZE: usize = 100_000;

/// Default number of consecutive transient platform errors tolerated.
///
/// Retry policy belongs to the caller; the core fails on the first one.
pub const DEFAULT_PLATFORM_ERROR_RETRIES: u32 = 0;

/// Default bound on source activation when the session sets no timeout.
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings applied to a [`Tracker`](crate::tracker::Tracker) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    /// Capacity of the last-N accepted fix buffer (1..=[`MAX_HISTORY_SIZE`]).
    pub history_size: usize,

    /// Consecutive `PlatformError`s tolerated while active before failing.
    pub platform_error_retries: u32,

    /// Upper bound on `FixSource::activate` when the session has no timeout.
    pub activation_timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            platform_error_retries: DEFAULT_PLATFORM_ERROR_RETRIES,
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
        }
    }
}

impl TrackerSettings {
    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    pub fn with_platform_error_retries(mut self, retries: u32) -> Self {
        self.platform_error_retries = retries;
        self
    }

    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_size == 0 {
            return Err(ConfigError::EmptyHistory);
        }
        if self.history_size > MAX_HISTORY_SIZE {
            return Err(ConfigError::HistoryTooLarge {
                got: self.history_size,
                max: MAX_HISTORY_SIZE,
            });
        }
        if self.activation_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("activation_timeout"));
        }
        Ok(())
    }
}
