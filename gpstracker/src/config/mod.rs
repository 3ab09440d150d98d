//! Configuration for tracking sessions and tracker instances.
//!
//! - [`TrackingConfig`] - thresholds passed with each `start()`
//! - [`TrackerSettings`] - instance-wide policy (history, retries, timeouts)
//! - [`ConfigFile`] - both of the above loaded from an INI file

mod file;
mod settings;
mod tracking;

pub use file::{ConfigFile, ConfigFileError};
pub use settings::{
    TrackerSettings, DEFAULT_ACTIVATION_TIMEOUT, DEFAULT_HISTORY_SIZE,
    DEFAULT_PLATFORM_ERROR_RETRIES, MAX_HISTORY_SIZE,
};
pub use tracking::{
    AccuracyPreset, ConfigError, TrackingConfig, DEFAULT_MIN_DISTANCE_M, DEFAULT_MIN_INTERVAL,
};
