//! Replays a recorded track as a live source.
//!
//! Fixes are re-stamped relative to the moment of activation, keeping the
//! recorded spacing. The playback rate only changes how fast they are
//! delivered, not their timestamps, so the filter sees the same track at
//! any rate.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AuthorizationStatus, BoxFuture, FixSink, FixSource, FixSourceError};
use crate::config::TrackingConfig;
use crate::fix::{FixTimestamp, LocationFix};

/// One recorded sample, in the host package's field naming.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    pub accuracy: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub bearing: Option<f64>,
    /// Milliseconds since the start of the recording.
    pub offset_ms: u64,
}

impl TrackPoint {
    fn to_fix(&self, base: FixTimestamp) -> LocationFix {
        let mut fix = LocationFix::new(
            self.latitude,
            self.longitude,
            self.accuracy,
            base.offset(Duration::from_millis(self.offset_ms)),
        );
        if let Some(altitude) = self.altitude {
            fix = fix.with_altitude(altitude);
        }
        if let Some(speed) = self.speed {
            fix = fix.with_speed(speed);
        }
        if let Some(bearing) = self.bearing {
            fix = fix.with_heading(bearing);
        }
        fix
    }
}

struct Playback {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Source that plays back a fixed list of [`TrackPoint`]s.
pub struct ReplaySource {
    points: Arc<[TrackPoint]>,
    rate: f64,
    playback: Mutex<Option<Playback>>,
}

impl ReplaySource {
    /// Create a replay source. Points are sorted by offset.
    pub fn new(mut points: Vec<TrackPoint>) -> Self {
        points.sort_by_key(|p| p.offset_ms);
        Self {
            points: points.into(),
            rate: 1.0,
            playback: Mutex::new(None),
        }
    }

    /// Parse a JSON array of track points.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let points: Vec<TrackPoint> = serde_json::from_str(json)?;
        Ok(Self::new(points))
    }

    /// Playback rate; `2.0` delivers twice as fast. Non-positive values are ignored.
    pub fn with_rate(mut self, rate: f64) -> Self {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Recorded duration of the track.
    pub fn duration(&self) -> Duration {
        self.points
            .last()
            .map(|p| Duration::from_millis(p.offset_ms))
            .unwrap_or_default()
    }

    /// Time needed to play the whole track at the configured rate.
    ///
    /// `None` when the rate stretches the track past what a [`Duration`]
    /// can hold; playback then fails with [`PLAYBACK_OUT_OF_RANGE`].
    pub fn playback_duration(&self) -> Option<Duration> {
        scaled(self.duration(), self.rate)
    }
}

/// Platform error code pushed when a point cannot be scheduled.
pub const PLAYBACK_OUT_OF_RANGE: i32 = -1;

fn scaled(offset: Duration, rate: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(offset.as_secs_f64() / rate).ok()
}

impl FixSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn activate<'a>(
        &'a self,
        _config: &'a TrackingConfig,
        sink: FixSink,
    ) -> BoxFuture<'a, Result<(), FixSourceError>> {
        Box::pin(async move {
            if self.points.is_empty() {
                return Err(FixSourceError::HardwareUnavailable);
            }

            let mut playback = self.playback.lock();
            if playback.as_ref().is_some_and(|p| !p.task.is_finished()) {
                return Ok(());
            }

            let cancel = CancellationToken::new();
            let task = tokio::spawn(play(
                Arc::clone(&self.points),
                self.rate,
                sink,
                cancel.clone(),
            ));
            info!(points = self.points.len(), rate = self.rate, "Replay started");
            *playback = Some(Playback { cancel, task });
            Ok(())
        })
    }

    fn deactivate(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let playback = self.playback.lock().take();
            if let Some(Playback { cancel, task }) = playback {
                cancel.cancel();
                if let Err(e) = task.await {
                    warn!(error = %e, "Replay task ended abnormally");
                }
                debug!("Replay stopped");
            }
        })
    }

    fn authorization(&self) -> AuthorizationStatus {
        AuthorizationStatus::AuthorizedAlways
    }
}

async fn play(points: Arc<[TrackPoint]>, rate: f64, sink: FixSink, cancel: CancellationToken) {
    let started = tokio::time::Instant::now();
    let base = FixTimestamp::now();

    for point in points.iter() {
        let Some(due) = scaled(Duration::from_millis(point.offset_ms), rate)
            .and_then(|delay| started.checked_add(delay))
        else {
            warn!(offset_ms = point.offset_ms, rate, "Replay point cannot be scheduled");
            sink.error(FixSourceError::platform(
                PLAYBACK_OUT_OF_RANGE,
                format!(
                    "point at {} ms cannot be scheduled at rate {}",
                    point.offset_ms, rate
                ),
            ));
            return;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep_until(due) => {}
        }
        if !sink.fix(point.to_fix(base)) {
            return;
        }
    }

    debug!(points = points.len(), "Replay reached end of track");
}
