//! Track reduction: cumulative distance, elevation changes, and per-kilometer
//! splits from a point sequence.
//!
//! Splits and the segment classifiers share one partitioning rule,
//! [`kilometer_windows`]: boundaries snap to the first sample at or past each
//! integer kilometer mark. Boundaries are point-granular, never interpolated.

use log::info;

use crate::geo_utils::haversine_distance;
use crate::{Split, TrackPoint};

/// A window of track indices covering one completed kilometer.
///
/// The window spans `[start, end]` inclusive; `end` is the crossing sample
/// and doubles as the next window's `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KilometerWindow {
    /// 1-based kilometer number
    pub kilometer: u32,
    /// Index of the first point in the window
    pub start: usize,
    /// Index of the crossing point (first sample at or past the boundary)
    pub end: usize,
}

/// Total track distance in kilometers. Returns 0 for fewer than 2 points.
pub fn total_distance_km(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0].coordinate(), &w[1].coordinate()))
        .sum::<f64>()
        / 1000.0
}

/// Total elevation gain and loss in meters, as `(gain, loss)` with both
/// values non-negative. Returns `(0, 0)` for fewer than 2 points.
pub fn elevation_changes(points: &[TrackPoint]) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    for w in points.windows(2) {
        let delta = w[1].altitude_m - w[0].altitude_m;
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }
    (gain, loss)
}

/// Partition a track into one window per completed kilometer.
///
/// Walks the points accumulating haversine distance; whenever the cumulative
/// distance crosses a new integer kilometer boundary, a window ending at the
/// crossing sample is emitted. A single step that jumps several boundaries
/// (GPS dropout) emits one window per boundary; the extras are zero-length,
/// sharing the crossing index, which keeps kilometer numbers aligned with
/// actual distance. No partial trailing window is produced.
pub fn kilometer_windows(points: &[TrackPoint]) -> Vec<KilometerWindow> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut cumulative = 0.0;
    let mut start = 0usize;
    let mut next_boundary = 1000.0;

    for i in 1..points.len() {
        cumulative += haversine_distance(&points[i - 1].coordinate(), &points[i].coordinate());
        while cumulative >= next_boundary {
            windows.push(KilometerWindow {
                kilometer: (next_boundary / 1000.0) as u32,
                start,
                end: i,
            });
            start = i;
            next_boundary += 1000.0;
        }
    }

    windows
}

/// Build one [`Split`] per completed kilometer.
///
/// Duration is the timestamp delta across the window, elevation change the
/// altitude delta across the window, and average heart rate the mean of the
/// non-null readings in the window (None only when all readings are null).
pub fn build_splits(points: &[TrackPoint]) -> Vec<Split> {
    kilometer_windows(points)
        .into_iter()
        .map(|w| {
            let first = &points[w.start];
            let last = &points[w.end];
            Split {
                kilometer: w.kilometer,
                duration_seconds: (last.timestamp - first.timestamp).num_milliseconds() as f64
                    / 1000.0,
                elevation_change_m: last.altitude_m - first.altitude_m,
                average_heart_rate: average_heart_rate(&points[w.start..=w.end]),
            }
        })
        .collect()
}

/// Recompute splits and return the newest one only if the split count grew
/// past `previous_split_count`.
///
/// Used for live per-kilometer audio/haptic cues during an active run. O(n)
/// per call, which is acceptable because call frequency is bounded by the GPS
/// sample rate.
pub fn live_split_check(points: &[TrackPoint], previous_split_count: usize) -> Option<Split> {
    let splits = build_splits(points);
    if splits.len() > previous_split_count {
        let newest = splits.into_iter().last()?;
        info!(
            "[Splits] Kilometer {} completed in {}",
            newest.kilometer,
            format_duration(newest.duration_seconds)
        );
        Some(newest)
    } else {
        None
    }
}

/// Mean of the non-null heart-rate readings, rounded to the nearest bpm.
/// None when every reading is null.
fn average_heart_rate(points: &[TrackPoint]) -> Option<u16> {
    let readings: Vec<u16> = points.iter().filter_map(|p| p.heart_rate).collect();
    if readings.is_empty() {
        return None;
    }
    let sum: u64 = readings.iter().map(|&hr| hr as u64).sum();
    Some((sum as f64 / readings.len() as f64).round() as u16)
}

// ============================================================================
// Formatting
// ============================================================================

/// Format a pace as "M:SS" per kilometer (e.g., 327.0 → "5:27").
///
/// Non-finite or non-positive paces render as "-:--".
pub fn format_pace(seconds_per_km: f64) -> String {
    if !seconds_per_km.is_finite() || seconds_per_km <= 0.0 {
        return "-:--".to_string();
    }
    let total = seconds_per_km.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format a duration as "M:SS", or "H:MM:SS" from one hour upward.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-:--".to_string();
    }
    let total = seconds.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    // ~0.0089932 degrees of latitude is 1000 m of haversine distance
    const KM_LAT_STEP: f64 = 0.008_993_217;

    fn ts(offset_seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_seconds, 0).unwrap()
    }

    /// Straight northbound track: one point every ~250 m, 90 s apart,
    /// climbing 5 m per point.
    fn sample_track(count: usize) -> Vec<TrackPoint> {
        (0..count)
            .map(|i| {
                TrackPoint::new(
                    46.0 + i as f64 * KM_LAT_STEP / 4.0,
                    7.0,
                    1000.0 + i as f64 * 5.0,
                    ts(i as i64 * 90),
                )
            })
            .collect()
    }

    #[test]
    fn test_short_tracks_reduce_to_zero() {
        assert_eq!(total_distance_km(&[]), 0.0);
        assert_eq!(total_distance_km(&sample_track(1)), 0.0);
        assert_eq!(elevation_changes(&sample_track(1)), (0.0, 0.0));
        assert!(build_splits(&sample_track(1)).is_empty());
        assert!(kilometer_windows(&[]).is_empty());
    }

    #[test]
    fn test_total_distance() {
        // 17 points, 16 gaps of ~250 m each
        let track = sample_track(17);
        let km = total_distance_km(&track);
        assert!((km - 4.0).abs() < 0.01, "got {km}");
    }

    #[test]
    fn test_elevation_changes_separates_gain_and_loss() {
        let mut track = sample_track(5);
        track[2].altitude_m = 980.0; // dip below the start
        let (gain, loss) = elevation_changes(&track);
        assert!(gain > 0.0);
        assert!(loss > 0.0);
        // Net change still equals last - first
        let net = track.last().unwrap().altitude_m - track[0].altitude_m;
        assert!((gain - loss - net).abs() < 1e-9);
    }

    #[test]
    fn test_kilometer_windows_snap_to_crossing_point() {
        // Points every 250 m: km 1 is crossed at index 4, km 2 at index 8
        let track = sample_track(17);
        let windows = kilometer_windows(&track);
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0], KilometerWindow { kilometer: 1, start: 0, end: 4 });
        assert_eq!(windows[1], KilometerWindow { kilometer: 2, start: 4, end: 8 });
        assert_eq!(windows[3].kilometer, 4);
    }

    #[test]
    fn test_split_boundary_is_point_granular() {
        // Kilometer 3 is crossed between points 11 and 12; the split window
        // must end at index 12, not at an interpolated position.
        let track = sample_track(17);
        let windows = kilometer_windows(&track);
        let third = windows.iter().find(|w| w.kilometer == 3).unwrap();
        assert_eq!(third.start, 8);
        assert_eq!(third.end, 12);
    }

    #[test]
    fn test_no_partial_trailing_split() {
        // 15 points cover 3.5 km: exactly 3 splits
        let track = sample_track(15);
        let splits = build_splits(&track);
        assert_eq!(splits.len(), 3);
        assert_eq!(splits.last().unwrap().kilometer, 3);
    }

    #[test]
    fn test_split_duration_and_elevation() {
        let track = sample_track(17);
        let splits = build_splits(&track);
        // 4 gaps of 90 s per kilometer window
        assert!((splits[0].duration_seconds - 360.0).abs() < 1e-9);
        // 4 gaps of +5 m
        assert!((splits[0].elevation_change_m - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_average_heart_rate_ignores_missing() {
        let mut track = sample_track(5);
        track[1].heart_rate = Some(140);
        track[3].heart_rate = Some(160);
        let avg = average_heart_rate(&track);
        assert_eq!(avg, Some(150));

        let no_hr = sample_track(5);
        assert_eq!(average_heart_rate(&no_hr), None);
    }

    #[test]
    fn test_gps_dropout_emits_aligned_windows() {
        // 3 km covered in a single step between two samples
        let track = vec![
            TrackPoint::new(46.0, 7.0, 1000.0, ts(0)),
            TrackPoint::new(46.0 + 3.2 * KM_LAT_STEP, 7.0, 1010.0, ts(1800)),
        ];
        let windows = kilometer_windows(&track);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].kilometer, 1);
        assert_eq!(windows[2].kilometer, 3);
        // Extra windows are zero-length at the crossing index
        assert_eq!(windows[1].start, windows[1].end);
    }

    #[test]
    fn test_zero_distance_duplicate_points_do_not_divide_by_zero() {
        let mut track = sample_track(10);
        track.insert(3, track[3]); // exact duplicate sample
        let splits = build_splits(&track);
        assert_eq!(splits.len(), 2);
        for s in &splits {
            assert!(s.duration_seconds.is_finite());
        }
    }

    #[test]
    fn test_live_split_check_fires_once_per_kilometer() {
        let track = sample_track(17);
        // Count unchanged: nothing new
        assert!(live_split_check(&track[..4], 0).is_none());
        // First kilometer just completed
        let split = live_split_check(&track[..5], 0).unwrap();
        assert_eq!(split.kilometer, 1);
        // Already announced
        assert!(live_split_check(&track[..5], 1).is_none());
    }

    #[test]
    fn test_format_pace() {
        assert_eq!(format_pace(327.0), "5:27");
        assert_eq!(format_pace(600.0), "10:00");
        assert_eq!(format_pace(0.0), "-:--");
        assert_eq!(format_pace(f64::NAN), "-:--");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(95.0), "1:35");
        assert_eq!(format_duration(3_725.0), "1:02:05");
        assert_eq!(format_duration(-1.0), "-:--");
    }
}
