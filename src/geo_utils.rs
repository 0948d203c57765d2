//! Geographic utilities: distance, interpolation, and bounds calculations.
//!
//! `haversine_distance` is the single distance primitive for the whole crate.
//! Every other module routes distance computation through it, so splits,
//! segments, checkpoints, progress, and replay can never drift apart
//! numerically.

use crate::{Bounds, GpsPoint};

/// Mean Earth radius in meters, used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two GPS points in meters.
///
/// NaN or out-of-range coordinates are a precondition violation; validation
/// is the recording collaborator's responsibility.
///
/// # Example
/// ```
/// use track_engine::GpsPoint;
/// use track_engine::geo_utils::haversine_distance;
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
/// let distance = haversine_distance(&london, &paris);
/// assert!((distance / 1000.0 - 344.0).abs() < 5.0);
/// ```
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Total distance along a polyline in meters. Returns 0 for fewer than 2 points.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Distance from the first point to each point along a polyline, in meters.
///
/// The result has one entry per input point and is non-decreasing.
pub fn cumulative_distances(points: &[GpsPoint]) -> Vec<f64> {
    let mut result = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += haversine_distance(&points[i - 1], p);
        }
        result.push(total);
    }
    result
}

/// Linear interpolation between two GPS points.
///
/// `fraction` 0.0 yields `a`, 1.0 yields `b`. Linear lat/lon interpolation is
/// accurate at GPS segment scale (tens of meters).
pub fn interpolate(a: &GpsPoint, b: &GpsPoint, fraction: f64) -> GpsPoint {
    GpsPoint::new(
        a.latitude + fraction * (b.latitude - a.latitude),
        a.longitude + fraction * (b.longitude - a.longitude),
    )
}

/// Approximate conversion from meters to degrees of longitude at a reference
/// latitude. Used to size degree-space spatial queries.
pub fn meters_to_degrees(meters: f64, ref_lat_deg: f64) -> f64 {
    // One degree of latitude is ~111.32 km; longitude shrinks with cos(lat)
    let meters_per_degree = 111_320.0 * ref_lat_deg.to_radians().cos().max(0.01);
    meters / meters_per_degree
}

/// Bounding box for a set of GPS points. None for empty input.
pub fn compute_bounds(points: &[GpsPoint]) -> Option<Bounds> {
    Bounds::from_points(points)
}
