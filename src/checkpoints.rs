//! Checkpoint resolution along a recorded or planned track.
//!
//! Both resolution modes, spatial (where on the map is the 42 km mark) and
//! temporal (when did the runner reach it), are the same cumulative-distance
//! cursor walk, parameterized by an interpolation closure. Checkpoints may
//! arrive unordered; they are processed in ascending target distance so one
//! pass over the track resolves them all.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, interpolate};
use crate::{Checkpoint, GpsPoint, TrackPoint};

/// A checkpoint resolved to a real-world coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialCheckpoint {
    pub checkpoint: Checkpoint,
    pub coordinate: GpsPoint,
}

/// A checkpoint resolved to an arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalCheckpoint {
    pub checkpoint: Checkpoint,
    pub timestamp: DateTime<Utc>,
}

/// Resolve each checkpoint to the coordinate where the track crosses its
/// target distance.
///
/// The crossing segment is interpolated linearly; a checkpoint beyond the end
/// of the track resolves to the last point (deliberate fallback, not an
/// error). A track with fewer than 2 points yields an empty result.
pub fn resolve_coordinates(
    checkpoints: &[Checkpoint],
    track: &[TrackPoint],
) -> Vec<SpatialCheckpoint> {
    resolve_with(checkpoints, track, |a, b, fraction| {
        interpolate(&a.coordinate(), &b.coordinate(), fraction)
    })
    .into_iter()
    .map(|(checkpoint, coordinate)| SpatialCheckpoint {
        checkpoint,
        coordinate,
    })
    .collect()
}

/// Resolve each checkpoint to the time the runner reached its target
/// distance, interpolated within the crossing segment.
///
/// Same walk and fallback policy as [`resolve_coordinates`].
pub fn resolve_arrival_times(
    checkpoints: &[Checkpoint],
    track: &[TrackPoint],
) -> Vec<TemporalCheckpoint> {
    resolve_with(checkpoints, track, |a, b, fraction| {
        let delta_ms = (b.timestamp - a.timestamp).num_milliseconds() as f64;
        a.timestamp + Duration::milliseconds((fraction * delta_ms).round() as i64)
    })
    .into_iter()
    .map(|(checkpoint, timestamp)| TemporalCheckpoint {
        checkpoint,
        timestamp,
    })
    .collect()
}

/// Shared cursor walk: accumulate haversine distance along the track and, at
/// each checkpoint's crossing segment, apply `lerp` with the in-segment
/// fraction. Checkpoints are sorted ascending internally so the cursor only
/// ever moves forward.
fn resolve_with<T>(
    checkpoints: &[Checkpoint],
    track: &[TrackPoint],
    lerp: impl Fn(&TrackPoint, &TrackPoint, f64) -> T,
) -> Vec<(Checkpoint, T)> {
    if track.len() < 2 {
        return Vec::new();
    }

    let mut sorted: Vec<Checkpoint> = checkpoints.to_vec();
    sorted.sort_by(|a, b| {
        a.distance_from_start_km
            .partial_cmp(&b.distance_from_start_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut results = Vec::with_capacity(sorted.len());

    // cursor: segment [seg, seg + 1], cumulative = distance through its end
    let mut seg = 0usize;
    let mut seg_len = haversine_distance(&track[0].coordinate(), &track[1].coordinate());
    let mut cumulative = seg_len;

    for checkpoint in sorted {
        let target_m = checkpoint.distance_from_start_km * 1000.0;

        while cumulative < target_m && seg + 2 < track.len() {
            seg += 1;
            seg_len = haversine_distance(&track[seg].coordinate(), &track[seg + 1].coordinate());
            cumulative += seg_len;
        }

        let value = if cumulative >= target_m {
            let overshoot = cumulative - target_m;
            let fraction = if seg_len > 0.0 {
                ((seg_len - overshoot) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            lerp(&track[seg], &track[seg + 1], fraction)
        } else {
            // Checkpoint lies beyond the end of the track
            let last = &track[track.len() - 1];
            lerp(last, last, 0.0)
        };

        results.push((checkpoint, value));
    }

    results
}
