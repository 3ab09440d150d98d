//! Per-session tracking configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default minimum displacement between accepted fixes (0 = interval only).
pub const DEFAULT_MIN_DISTANCE_M: f64 = 0.0;

/// Default minimum time between accepted fixes (1Hz).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Errors raised when validating configuration values.
///
/// These are always reported synchronously to the caller; an invalid config
/// never reaches the fix source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Minimum distance is negative or not finite.
    #[error("min_distance_m must be a finite value >= 0 (got {0})")]
    InvalidMinDistance(f64),

    /// Desired accuracy is zero, negative or not finite.
    #[error("desired_accuracy_m must be a finite value > 0 (got {0})")]
    InvalidDesiredAccuracy(f64),

    /// A timeout of zero would fail every session immediately.
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    /// The fix history must hold at least the last accepted fix.
    #[error("history_size must be at least 1")]
    EmptyHistory,

    /// History larger than [`MAX_HISTORY_SIZE`](crate::config::MAX_HISTORY_SIZE).
    #[error("history_size must be at most {max} (got {got})")]
    HistoryTooLarge { got: usize, max: usize },

    /// Accuracy preset name not recognized.
    #[error("unknown accuracy preset '{0}' (expected high, medium or low)")]
    UnknownPreset(String),
}

/// Named accuracy levels, mirroring the host API's `desiredAccuracy` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyPreset {
    /// Best available (GPS lock), fixes within 20m.
    High,
    /// Balanced power, fixes within 50m.
    Medium,
    /// Low power (cell/Wi-Fi), fixes within 100m.
    Low,
}

impl AccuracyPreset {
    /// Accuracy threshold in meters for this preset.
    pub fn meters(self) -> f64 {
        match self {
            AccuracyPreset::High => 20.0,
            AccuracyPreset::Medium => 50.0,
            AccuracyPreset::Low => 100.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccuracyPreset::High => "high",
            AccuracyPreset::Medium => "medium",
            AccuracyPreset::Low => "low",
        }
    }
}

impl FromStr for AccuracyPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(AccuracyPreset::High),
            "medium" => Ok(AccuracyPreset::Medium),
            "low" => Ok(AccuracyPreset::Low),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

impl fmt::Display for AccuracyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds supplied with each `start()` call.
///
/// Created per tracking session and discarded when the session stops or
/// fails. All values are checked by [`validate`](Self::validate) before the
/// tracker touches the fix source.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gpstracker::config::{AccuracyPreset, TrackingConfig};
///
/// let config = TrackingConfig::default()
///     .with_min_distance(10.0)
///     .with_min_interval(Duration::from_secs(1))
///     .with_preset(AccuracyPreset::Medium)
///     .with_timeout(Duration::from_secs(30));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.desired_accuracy_m, 50.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Minimum great-circle distance between accepted fixes.
    pub min_distance_m: f64,

    /// Minimum wall-clock time between accepted fixes.
    pub min_interval: Duration,

    /// Fixes with a worse horizontal accuracy are rejected.
    pub desired_accuracy_m: f64,

    /// Maximum time without any raw fix before the session fails.
    ///
    /// Also bounds source activation. `None` disables the no-fix watchdog
    /// and falls back to the tracker's default activation timeout.
    pub timeout: Option<Duration>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
            min_interval: DEFAULT_MIN_INTERVAL,
            desired_accuracy_m: AccuracyPreset::High.meters(),
            timeout: None,
        }
    }
}

impl TrackingConfig {
    pub fn with_min_distance(mut self, meters: f64) -> Self {
        self.min_distance_m = meters;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_desired_accuracy(mut self, meters: f64) -> Self {
        self.desired_accuracy_m = meters;
        self
    }

    /// Set the desired accuracy from a named preset.
    pub fn with_preset(mut self, preset: AccuracyPreset) -> Self {
        self.desired_accuracy_m = preset.meters();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check every numeric field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_distance_m.is_finite() || self.min_distance_m < 0.0 {
            return Err(ConfigError::InvalidMinDistance(self.min_distance_m));
        }
        if !self.desired_accuracy_m.is_finite() || self.desired_accuracy_m <= 0.0 {
            return Err(ConfigError::InvalidDesiredAccuracy(self.desired_accuracy_m));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout("timeout"));
        }
        Ok(())
    }
}
