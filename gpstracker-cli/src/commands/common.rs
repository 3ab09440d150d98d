//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gpstracker::{
    AccuracyPreset, ConfigFile, FixSource, QueueChannel, ReplaySource, Tracker, TrackerSettings,
    TrackerState, TrackerStatus, TrackingConfig, TrackingEvent,
};

use super::output::EventPrinter;
use crate::error::CliError;

/// Directory under the home directory holding config and logs.
const APP_DIR: &str = ".gpstracker";

/// Default configuration file: `~/.gpstracker/config.ini`.
pub fn default_config_path() -> PathBuf {
    app_dir().join("config.ini")
}

/// Default log directory: `~/.gpstracker/logs`.
pub fn default_log_dir() -> PathBuf {
    app_dir().join("logs")
}

fn app_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(APP_DIR))
}

/// Load the config file, falling back to defaults when it does not exist.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    Ok(ConfigFile::load_from(&path)?)
}

/// Extra time after the last point before the session is stopped.
const END_GRACE: Duration = Duration::from_secs(1);

/// How long to run a replay session before stopping it.
pub fn session_length(source: &ReplaySource, rate: f64) -> Result<Duration, CliError> {
    source
        .playback_duration()
        .and_then(|playback| playback.checked_add(END_GRACE))
        .ok_or_else(|| {
            CliError::Config(format!(
                "--rate {} is too slow to play {} ms of track",
                rate,
                source.duration().as_millis()
            ))
        })
}

/// Tracking thresholds that override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct TrackingArgs {
    /// Minimum distance between accepted fixes, in meters
    #[arg(long)]
    pub min_distance: Option<f64>,

    /// Minimum time between accepted fixes, in milliseconds
    #[arg(long)]
    pub min_interval_ms: Option<u64>,

    /// Desired accuracy: high, medium, low or a value in meters
    #[arg(long)]
    pub accuracy: Option<String>,

    /// Fail when no fix arrives for this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl TrackingArgs {
    /// Apply the overrides to `config` and validate the result.
    pub fn apply(&self, mut config: TrackingConfig) -> Result<TrackingConfig, CliError> {
        if let Some(meters) = self.min_distance {
            config = config.with_min_distance(meters);
        }
        if let Some(ms) = self.min_interval_ms {
            config = config.with_min_interval(Duration::from_millis(ms));
        }
        if let Some(accuracy) = &self.accuracy {
            config = match accuracy.parse::<AccuracyPreset>() {
                Ok(preset) => config.with_preset(preset),
                Err(_) => {
                    let meters: f64 = accuracy.trim().parse().map_err(|_| {
                        CliError::Config(format!(
                            "--accuracy '{}' is not a preset (high, medium, low) or a number of meters",
                            accuracy
                        ))
                    })?;
                    config.with_desired_accuracy(meters)
                }
            };
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }

        config
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(config)
    }
}

/// Run one tracking session against `source` and print its events.
///
/// The session ends after `run_for`, on Ctrl-C, or when the tracker fails.
pub async fn track(
    source: Arc<dyn FixSource>,
    settings: TrackerSettings,
    config: TrackingConfig,
    run_for: Duration,
    printer: &EventPrinter,
    cancel: CancellationToken,
) -> Result<TrackerStatus, CliError> {
    let tracker = Tracker::spawn(source, settings)?;
    let (channel, mut events) = QueueChannel::new();
    tracker.subscribe(channel);
    tracker.start(config)?;

    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);
    let mut failure = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Interrupted, stopping");
                break;
            }
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => {
                    printer.print(&event);
                    if let TrackingEvent::StateChanged(TrackerState::Failed(kind)) = event {
                        failure = Some(kind);
                        break;
                    }
                }
                None => break,
            },
        }
    }

    tracker.stop().await?;
    while let Ok(event) = events.try_recv() {
        printer.print(&event);
    }
    let status = tracker.status();
    tracker.shutdown().await;

    match failure {
        Some(kind) => Err(CliError::TrackingFailed(kind)),
        None => Ok(status),
    }
}
