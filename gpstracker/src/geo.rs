//! Great-circle helpers for WGS-84 positions.
//!
//! All functions take positions as `(latitude, longitude)` tuples in degrees,
//! the same shape used by [`LocationFix::position`](crate::fix::LocationFix::position).
//!
//! # Accuracy
//!
//! Distances use the haversine formula on a sphere with the IUGG mean Earth
//! radius (6 371 008.8 m). Against the WGS-84 ellipsoid the spherical model
//! is off by at most ~0.5% for distances under 1000 km (typically well under
//! 0.3%), which is far below GPS noise for the thresholds the filter uses.

/// IUGG mean Earth radius in meters.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Great-circle distance between two positions in meters (haversine).
///
/// # Example
///
/// ```
/// use gpstracker::geo::distance_m;
///
/// // One degree of latitude is ~111.2 km
/// let d = distance_m((0.0, 0.0), (1.0, 0.0));
/// assert!((d - 111_195.0).abs() < 10.0);
/// ```
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Clamp guards against a > 1.0 from rounding on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_MEAN_RADIUS_M * c
}

/// Initial great-circle bearing from `from` to `to`.
///
/// Returns degrees in `[0, 360)`, where 0 = North, 90 = East.
pub fn initial_bearing_deg(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Position reached by travelling `distance_m` along `bearing_deg` from `from`.
///
/// Used to synthesize tracks (CLI `simulate`, tests).
pub fn destination(from: (f64, f64), bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let (lat, lon) = from;
    let angular = distance_m / EARTH_MEAN_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Normalize longitude to [-180, 180)
    let lon2_deg = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;
    (lat2.to_degrees(), lon2_deg)
}

/// Check that a coordinate pair is finite and within WGS-84 bounds.
pub fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && LATITUDE_RANGE.contains(&latitude)
        && LONGITUDE_RANGE.contains(&longitude)
}

fn normalize_bearing(deg: f64) -> f64 {
    let normalized = deg % 360.0;
    if normalized < 0.0 {
        normalized + 360.0
    } else {
        normalized
    }
}
