//! `simulate` - drive a synthetic straight-line track.

use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gpstracker::geo;
use gpstracker::source::TrackPoint;
use gpstracker::{ConfigFile, ReplaySource};

use super::common::{session_length, track, TrackingArgs};
use super::output::EventPrinter;
use crate::error::CliError;

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Start latitude in decimal degrees
    #[arg(long, default_value = "37.5665", allow_hyphen_values = true)]
    pub lat: f64,

    /// Start longitude in decimal degrees
    #[arg(long, default_value = "126.9780", allow_hyphen_values = true)]
    pub lon: f64,

    /// Ground speed in meters per second
    #[arg(long, default_value = "5.0")]
    pub speed: f64,

    /// Course in degrees clockwise from north
    #[arg(long, default_value = "90.0")]
    pub bearing: f64,

    /// Reported horizontal accuracy in meters
    #[arg(long, default_value = "8.0")]
    pub fix_accuracy: f64,

    /// Time between raw fixes, in milliseconds
    #[arg(long, default_value = "500")]
    pub step_ms: u64,

    /// Number of raw fixes to generate
    #[arg(long, default_value = "20")]
    pub count: u32,

    /// Playback rate; 2 plays twice as fast
    #[arg(long, default_value = "1.0")]
    pub rate: f64,

    #[command(flatten)]
    pub tracking: TrackingArgs,
}

impl SimulateArgs {
    fn validate(&self) -> Result<(), CliError> {
        if !geo::is_valid_position(self.lat, self.lon) {
            return Err(CliError::Config(format!(
                "start position {}, {} is out of range",
                self.lat, self.lon
            )));
        }
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(CliError::Config("--speed must be >= 0".to_string()));
        }
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(CliError::Config("--rate must be greater than zero".to_string()));
        }
        if self.step_ms == 0 {
            return Err(CliError::Config("--step-ms must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Points along a great circle from the start position at constant speed.
pub fn synthesize(args: &SimulateArgs) -> Vec<TrackPoint> {
    (0..u64::from(args.count))
        .map(|i| {
            let offset_ms = i * args.step_ms;
            let travelled = args.speed * offset_ms as f64 / 1000.0;
            let (latitude, longitude) =
                geo::destination((args.lat, args.lon), args.bearing, travelled);
            TrackPoint {
                latitude,
                longitude,
                altitude: None,
                accuracy: args.fix_accuracy,
                speed: Some(args.speed),
                bearing: Some(args.bearing),
                offset_ms,
            }
        })
        .collect()
}

pub async fn run(
    args: SimulateArgs,
    config: ConfigFile,
    printer: EventPrinter,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    args.validate()?;
    let tracking = args.tracking.apply(config.tracking)?;

    let source = ReplaySource::new(synthesize(&args)).with_rate(args.rate);
    let run_for = session_length(&source, args.rate)?;
    info!(
        points = source.len(),
        speed_mps = args.speed,
        bearing_deg = args.bearing,
        "Simulating track"
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

    fn args() -> SimulateArgs {
        SimulateArgs {
            lat: 0.0,
            lon: 0.0,
            speed: 10.0,
            bearing: 0.0,
            fix_accuracy: 5.0,
            step_ms: 1000,
            count: 4,
            rate: 1.0,
            tracking: TrackingArgs::default(),
        }
    }

    #[test]
    fn test_synthesize_spacing() {
        let points = synthesize(&args());

        assert_eq!(points.len(), 4);
        assert_eq!(points[3].offset_ms, 3000);
        let d = geo::distance_m(
            (points[0].latitude, points[0].longitude),
            (points[3].latitude, points[3].longitude),
        );
        assert!((d - 30.0).abs() < 0.01, "distance was {}", d);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(args().validate().is_ok());
        assert!(SimulateArgs { lat: 95.0, ..args() }.validate().is_err());
        assert!(SimulateArgs { rate: 0.0, ..args() }.validate().is_err());
        assert!(SimulateArgs { step_ms: 0, ..args() }.validate().is_err());
    }
}
