//! # Track Engine
//!
//! GPS track geometry and course-progress engine for trail running.
//!
//! This library turns raw sequences of timestamped GPS samples into derived
//! geometry and progress facts:
//! - Cumulative distance, elevation gain/loss, and per-kilometer splits
//! - Pace / gradient / heart-rate colored segments for map rendering
//! - Checkpoint resolution (coordinate and arrival time along a course)
//! - Live course progress with off-course detection and checkpoint ETA
//! - Bounded-frame replay sampling with scrubbable playback
//!
//! It is a pure computation layer: all inputs are already in memory, no I/O
//! is performed, and malformed-input edge cases resolve to defined fallbacks
//! rather than errors.
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel batch classification with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use track_engine::{build_splits, total_distance_km, TrackPoint};
//!
//! let track: Vec<TrackPoint> = (0..5)
//!     .map(|i| {
//!         TrackPoint::new(
//!             47.0 + i as f64 * 0.0090,
//!             8.0,
//!             420.0 + i as f64 * 10.0,
//!             Utc.timestamp_opt(1_700_000_000 + i * 360, 0).unwrap(),
//!         )
//!     })
//!     .collect();
//!
//! println!("distance: {:.1} km", total_distance_km(&track));
//! for split in build_splits(&track) {
//!     println!("km {} in {:.0} s", split.kilometer, split.duration_seconds);
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackEngineError};

// Geographic utilities (distance, interpolation, bounds)
pub mod geo_utils;

// Track reduction (distance, elevation, per-kilometer splits)
pub mod track;
pub use track::{
    build_splits, elevation_changes, format_duration, format_pace, kilometer_windows,
    live_split_check, total_distance_km, KilometerWindow,
};

// Heart-rate zone classification (Karvonen reserve-based)
pub mod zones;
#[cfg(feature = "parallel")]
pub use zones::calculate_hr_zone_distribution_parallel;
pub use zones::{calculate_hr_zone_distribution, HrZoneConfig, HrZoneDistribution};

// Colored segment classifiers for map rendering
pub mod segments;
#[cfg(feature = "parallel")]
pub use segments::{
    elevation_segments_parallel, heart_rate_segments_parallel, pace_segments_parallel,
};
pub use segments::{
    elevation_segments, heart_rate_segments, pace_segments, ElevationSegment, HeartRateSegment,
    PaceSegment,
};

// Checkpoint resolution (spatial and temporal)
pub mod checkpoints;
pub use checkpoints::{
    resolve_arrival_times, resolve_coordinates, SpatialCheckpoint, TemporalCheckpoint,
};

// Live course progress tracking
pub mod progress;
pub use progress::{CheckpointEta, ProgressConfig, RunProgressSession};

// Replay sampling and playback
pub mod replay;
pub use replay::{
    build_frames, Clock, PlaybackState, ReplayConfig, ReplayFrame, ReplaySession, SystemClock,
};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use track_engine::GpsPoint;
/// let point = GpsPoint::new(46.5197, 6.6323); // Lausanne
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One timestamped GPS + altitude (+ heart rate) sample.
///
/// Insertion order is chronological order. Duplicate and zero-distance
/// consecutive points are valid input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above sea level in meters
    pub altitude_m: f64,
    /// Sample time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Heart rate in bpm, None when the sensor produced no reading
    pub heart_rate: Option<u16>,
}

impl TrackPoint {
    /// Create a track point without a heart-rate reading.
    pub fn new(latitude: f64, longitude: f64, altitude_m: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m,
            timestamp,
            heart_rate: None,
        }
    }

    /// Attach a heart-rate reading.
    pub fn with_heart_rate(mut self, heart_rate: u16) -> Self {
        self.heart_rate = Some(heart_rate);
        self
    }

    /// The point's coordinate, without sample metadata.
    pub fn coordinate(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// A named point of interest at a fixed distance along a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique identifier
    pub id: String,
    /// Display name (e.g., "Col de la Forclaz")
    pub name: String,
    /// Target distance from the course start in kilometers
    pub distance_from_start_km: f64,
    /// Checkpoint elevation in meters
    pub elevation_m: f64,
    /// Whether an aid station is present
    pub has_aid_station: bool,
}

/// Per-kilometer summary of a run.
///
/// Split boundaries are point-granular: each boundary snaps to the first
/// sample at or past the kilometer mark, so a split trails the exact mark by
/// at most one sample's distance. Checkpoint resolution interpolates instead;
/// the asymmetry is a deliberate policy carried over from the recording app
/// (changing it would alter displayed split times).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// 1-based kilometer number
    pub kilometer: u32,
    /// Time spent in this kilometer, in seconds
    pub duration_seconds: f64,
    /// Net altitude change across the kilometer window, in meters
    pub elevation_change_m: f64,
    /// Mean of the non-null heart-rate samples in the window, None if all null
    pub average_heart_rate: Option<u16>,
}

/// Live percent-complete and off-course distance against a planned route.
///
/// Recomputed on every new position sample; transient, owned by the active
/// run session, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CourseProgress {
    /// Progress along the reference route, clamped to [0, 100]
    pub percent_complete: f64,
    /// Perpendicular distance to the route in meters; 0 while on course
    pub distance_off_course_m: f64,
}

/// Bounding box for a track, for map camera framing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
