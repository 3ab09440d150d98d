//! `replay` - play a recorded track through the tracker.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gpstracker::{ConfigFile, ReplaySource};

use super::common::{session_length, track, TrackingArgs};
use super::output::EventPrinter;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON track file (array of {latitude, longitude, accuracy, offsetMs, ...})
    pub track: PathBuf,

    /// Playback rate; 2 plays twice as fast
    #[arg(long, default_value = "1.0")]
    pub rate: f64,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

/// Read and parse a track file.
pub fn load_track(path: &Path) -> Result<ReplaySource, CliError> {
    let display = path.display().to_string();
    let json = fs::read_to_string(path).map_err(|error| CliError::TrackRead {
        path: display.clone(),
        error,
    })?;
    ReplaySource::from_json(&json).map_err(|error| CliError::TrackParse {
        path: display,
        error,
    })
}

pub async fn run(
    args: ReplayArgs,
    config: ConfigFile,
    printer: EventPrinter,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    if !(args.rate.is_finite() && args.rate > 0.0) {
        return Err(CliError::Config(format!(
            "--rate must be greater than zero (got {})",
            args.rate
        )));
    }

    let tracking = args.tracking.apply(config.tracking)?;
    let source = load_track(&args.track)?.with_rate(args.rate);
    let run_for = session_length(&source, args.rate)?;
    info!(
        track = %args.track.display(),
        points = source.len(),
        rate = args.rate,
        "Replaying track"
    );

    let status = track(
        Arc::new(source),
        config.tracker,
        tracking,
        run_for,
        &printer,
        cancel,
    )
    .await?;
    printer.summary(&status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_track() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("track.json");
        fs::write(
            &path,
            r#"[
                {"latitude": 37.5, "longitude": 127.0, "accuracy": 5.0, "offsetMs": 1000},
                {"latitude": 37.6, "longitude": 127.0, "accuracy": 5.0, "offsetMs": 0, "speed": 3.0}
            ]"#,
        )
        .unwrap();

        let source = load_track(&path).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_track_errors() {
        let temp = TempDir::new().unwrap();

        let missing = load_track(&temp.path().join("missing.json"));
        assert!(matches!(missing, Err(CliError::TrackRead { .. })));

        let path = temp.path().join("bad.json");
        fs::write(&path, r#"{"latitude": 1}"#).unwrap();
        assert!(matches!(load_track(&path), Err(CliError::TrackParse { .. })));
    }
}
