//! Colored segment classifiers for map rendering.
//!
//! All three classifiers share the same partitioning rule as split building
//! ([`crate::track::kilometer_windows`]): one group of raw points per
//! completed kilometer, point-snapped boundaries. Each group is annotated
//! with one derived metric (pace, average gradient, or heart-rate zone)
//! which the rendering collaborator maps to a polyline color. Groups with
//! fewer than 2 points, or with degenerate distance/time, produce no segment.

use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geo_utils::haversine_distance;
use crate::track::{kilometer_windows, KilometerWindow};
use crate::zones::HrZoneConfig;
use crate::{GpsPoint, TrackPoint};

/// Minimum window count before the parallel variants engage rayon.
#[cfg(feature = "parallel")]
const PARALLEL_MIN_WINDOWS: usize = 16;

/// One kilometer of track colored by pace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceSegment {
    /// 1-based kilometer number
    pub kilometer: u32,
    /// Raw coordinates of the kilometer, in track order
    pub coordinates: Vec<GpsPoint>,
    /// Pace over the group in seconds per kilometer
    pub pace_seconds_per_km: f64,
}

/// One kilometer of track colored by elevation gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationSegment {
    /// 1-based kilometer number
    pub kilometer: u32,
    /// Raw coordinates of the kilometer, in track order
    pub coordinates: Vec<GpsPoint>,
    /// Net altitude change over horizontal distance, as a ratio
    pub average_gradient: f64,
}

/// One kilometer of track colored by heart-rate zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSegment {
    /// 1-based kilometer number
    pub kilometer: u32,
    /// Raw coordinates of the kilometer, in track order
    pub coordinates: Vec<GpsPoint>,
    /// Zone (1-5) of the group's mean heart rate
    pub zone: u8,
}

fn group_coordinates(points: &[TrackPoint], w: &KilometerWindow) -> Vec<GpsPoint> {
    points[w.start..=w.end].iter().map(|p| p.coordinate()).collect()
}

fn pace_segment_for(points: &[TrackPoint], w: &KilometerWindow) -> Option<PaceSegment> {
    let group = &points[w.start..=w.end];
    if group.len() < 2 {
        return None;
    }
    let distance_m: f64 = group
        .windows(2)
        .map(|p| haversine_distance(&p[0].coordinate(), &p[1].coordinate()))
        .sum();
    let elapsed_seconds = (group[group.len() - 1].timestamp - group[0].timestamp)
        .num_milliseconds() as f64
        / 1000.0;
    if distance_m <= 0.0 || elapsed_seconds <= 0.0 {
        return None;
    }
    Some(PaceSegment {
        kilometer: w.kilometer,
        coordinates: group_coordinates(points, w),
        pace_seconds_per_km: elapsed_seconds / (distance_m / 1000.0),
    })
}

fn elevation_segment_for(points: &[TrackPoint], w: &KilometerWindow) -> Option<ElevationSegment> {
    let group = &points[w.start..=w.end];
    if group.len() < 2 {
        return None;
    }
    let mut altitude_delta = 0.0;
    let mut horizontal_m = 0.0;
    for p in group.windows(2) {
        altitude_delta += p[1].altitude_m - p[0].altitude_m;
        horizontal_m += haversine_distance(&p[0].coordinate(), &p[1].coordinate());
    }
    if horizontal_m <= 0.0 {
        return None;
    }
    Some(ElevationSegment {
        kilometer: w.kilometer,
        coordinates: group_coordinates(points, w),
        average_gradient: altitude_delta / horizontal_m,
    })
}

fn heart_rate_segment_for(
    points: &[TrackPoint],
    w: &KilometerWindow,
    config: &HrZoneConfig,
) -> Option<HeartRateSegment> {
    let group = &points[w.start..=w.end];
    if group.len() < 2 {
        return None;
    }
    let readings: Vec<u16> = group.iter().filter_map(|p| p.heart_rate).collect();
    if readings.is_empty() {
        return None;
    }
    let sum: u64 = readings.iter().map(|&hr| hr as u64).sum();
    let mean = (sum as f64 / readings.len() as f64).round() as u16;
    Some(HeartRateSegment {
        kilometer: w.kilometer,
        coordinates: group_coordinates(points, w),
        zone: config.zone_for(mean),
    })
}

/// Partition a track into per-kilometer pace segments.
pub fn pace_segments(points: &[TrackPoint]) -> Vec<PaceSegment> {
    let windows = kilometer_windows(points);
    let segments: Vec<PaceSegment> = windows
        .iter()
        .filter_map(|w| pace_segment_for(points, w))
        .collect();
    debug!(
        "[Segments] Built {} pace segments from {} windows",
        segments.len(),
        windows.len()
    );
    segments
}

/// Partition a track into per-kilometer elevation-gradient segments.
pub fn elevation_segments(points: &[TrackPoint]) -> Vec<ElevationSegment> {
    kilometer_windows(points)
        .iter()
        .filter_map(|w| elevation_segment_for(points, w))
        .collect()
}

/// Partition a track into per-kilometer heart-rate-zone segments.
///
/// Kilometers without any heart-rate reading are skipped.
pub fn heart_rate_segments(points: &[TrackPoint], config: &HrZoneConfig) -> Vec<HeartRateSegment> {
    kilometer_windows(points)
        .iter()
        .filter_map(|w| heart_rate_segment_for(points, w, config))
        .collect()
}

/// Parallel version of [`pace_segments`] for long tracks.
#[cfg(feature = "parallel")]
pub fn pace_segments_parallel(points: &[TrackPoint]) -> Vec<PaceSegment> {
    let windows = kilometer_windows(points);
    if windows.len() < PARALLEL_MIN_WINDOWS {
        return windows
            .iter()
            .filter_map(|w| pace_segment_for(points, w))
            .collect();
    }
    windows
        .par_iter()
        .filter_map(|w| pace_segment_for(points, w))
        .collect()
}

/// Parallel version of [`elevation_segments`] for long tracks.
#[cfg(feature = "parallel")]
pub fn elevation_segments_parallel(points: &[TrackPoint]) -> Vec<ElevationSegment> {
    let windows = kilometer_windows(points);
    if windows.len() < PARALLEL_MIN_WINDOWS {
        return windows
            .iter()
            .filter_map(|w| elevation_segment_for(points, w))
            .collect();
    }
    windows
        .par_iter()
        .filter_map(|w| elevation_segment_for(points, w))
        .collect()
}

/// Parallel version of [`heart_rate_segments`] for long tracks.
#[cfg(feature = "parallel")]
pub fn heart_rate_segments_parallel(
    points: &[TrackPoint],
    config: &HrZoneConfig,
) -> Vec<HeartRateSegment> {
    let windows = kilometer_windows(points);
    if windows.len() < PARALLEL_MIN_WINDOWS {
        return windows
            .iter()
            .filter_map(|w| heart_rate_segment_for(points, w, config))
            .collect();
    }
    windows
        .par_iter()
        .filter_map(|w| heart_rate_segment_for(points, w, config))
        .collect()
}
