//! Location fix model.
//!
//! A [`LocationFix`] is a single position sample reported by a
//! [`FixSource`](crate::source::FixSource). Fixes are immutable once built:
//! fields are private and only readable through accessors, and the builder
//! methods consume `self` so a fix cannot change after it has been handed to
//! the tracker.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::geo;

/// Paired monotonic and wall-clock timestamp of a fix.
///
/// The monotonic half orders fixes within one process; the wall-clock half
/// is what the fix filter measures intervals with and what hosts display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixTimestamp {
    monotonic: Instant,
    wall: DateTime<Utc>,
}

impl FixTimestamp {
    /// Create a timestamp from explicit parts.
    pub fn new(monotonic: Instant, wall: DateTime<Utc>) -> Self {
        Self { monotonic, wall }
    }

    /// Capture the current instant on both clocks.
    pub fn now() -> Self {
        Self {
            monotonic: Instant::now(),
            wall: Utc::now(),
        }
    }

    /// Monotonic instant the fix was recorded at.
    pub fn monotonic(&self) -> Instant {
        self.monotonic
    }

    /// Wall-clock time the fix was taken at.
    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    /// Wall-clock time as milliseconds since the Unix epoch.
    pub fn epoch_millis(&self) -> i64 {
        self.wall.timestamp_millis()
    }

    /// Shift both clocks forward by `delta`.
    ///
    /// Handy for synthesizing sample sequences with a known spacing.
    pub fn offset(&self, delta: Duration) -> Self {
        let wall_delta =
            chrono::Duration::nanoseconds(i64::try_from(delta.as_nanos()).unwrap_or(i64::MAX));
        Self {
            monotonic: self.monotonic + delta,
            wall: self.wall + wall_delta,
        }
    }

    /// Wall-clock time elapsed since `earlier`.
    ///
    /// Returns `None` when `earlier` is actually later (clock went
    /// backwards or fixes arrived out of order).
    pub fn wall_elapsed_since(&self, earlier: &FixTimestamp) -> Option<Duration> {
        self.wall.signed_duration_since(earlier.wall).to_std().ok()
    }
}

/// A single reported GPS/location sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    latitude: f64,
    longitude: f64,
    altitude_m: Option<f64>,
    horizontal_accuracy_m: f64,
    speed_mps: Option<f64>,
    heading_deg: Option<f64>,
    timestamp: FixTimestamp,
}

impl LocationFix {
    /// Create a fix with the mandatory fields.
    ///
    /// # Arguments
    ///
    /// * `latitude` / `longitude` - WGS-84 degrees
    /// * `horizontal_accuracy_m` - 68% confidence radius reported by the source
    /// * `timestamp` - when the fix was taken
    pub fn new(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy_m: f64,
        timestamp: FixTimestamp,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: None,
            horizontal_accuracy_m,
            speed_mps: None,
            heading_deg: None,
            timestamp,
        }
    }

    /// Attach an altitude above the WGS-84 ellipsoid in meters.
    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    /// Attach ground speed in meters per second.
    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Attach course over ground in degrees (0 = North).
    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    /// Same sample, stamped with a different time (replayed tracks).
    pub fn with_timestamp(mut self, timestamp: FixTimestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Position as `(latitude, longitude)`.
    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    pub fn altitude_m(&self) -> Option<f64> {
        self.altitude_m
    }

    pub fn horizontal_accuracy_m(&self) -> f64 {
        self.horizontal_accuracy_m
    }

    pub fn speed_mps(&self) -> Option<f64> {
        self.speed_mps
    }

    /// Ground speed in km/h, if the source reported speed.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|s| s * 3.6)
    }

    pub fn heading_deg(&self) -> Option<f64> {
        self.heading_deg
    }

    pub fn timestamp(&self) -> FixTimestamp {
        self.timestamp
    }

    /// Great-circle distance to another fix in meters.
    pub fn distance_to(&self, other: &LocationFix) -> f64 {
        geo::distance_m(self.position(), other.position())
    }

    /// Check the fix is physically meaningful.
    ///
    /// Sources occasionally emit NaN accuracy or out-of-range coordinates
    /// while the receiver is still converging; the tracker drops those
    /// before they reach the filter.
    pub fn is_plausible(&self) -> bool {
        let optional_finite = |v: Option<f64>| v.map_or(true, f64::is_finite);

        geo::is_valid_position(self.latitude, self.longitude)
            && self.horizontal_accuracy_m.is_finite()
            && self.horizontal_accuracy_m >= 0.0
            && optional_finite(self.altitude_m)
            && optional_finite(self.speed_mps)
            && self.speed_mps.map_or(true, |s| s >= 0.0)
            && optional_finite(self.heading_deg)
    }
}

impl fmt::Display for LocationFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}) ±{:.1}m @ {}",
            self.latitude,
            self.longitude,
            self.horizontal_accuracy_m,
            self.timestamp.wall.format("%H:%M:%S%.3f")
        )
    }
}
