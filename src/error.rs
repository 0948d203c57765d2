//! Unified error handling for the track-engine library.
//!
//! The computational core favors total functions with defined fallbacks
//! (empty input yields empty output, never a panic). Errors are limited to
//! construction-time misuse: sessions over degenerate routes and invalid
//! athlete profiles.

use std::fmt;

/// Unified error type for track-engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEngineError {
    /// Reference route has too few points for progress tracking
    InsufficientRoutePoints {
        point_count: usize,
        minimum_required: usize,
    },
    /// Athlete heart-rate profile is unusable (max must exceed resting)
    InvalidHeartRateProfile { max_hr: u16, resting_hr: u16 },
}

impl fmt::Display for TrackEngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackEngineError::InsufficientRoutePoints {
                point_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "Route has {} points, minimum {} required",
                    point_count, minimum_required
                )
            }
            TrackEngineError::InvalidHeartRateProfile { max_hr, resting_hr } => {
                write!(
                    f,
                    "Invalid heart-rate profile: max {} bpm must exceed resting {} bpm",
                    max_hr, resting_hr
                )
            }
        }
    }
}

impl std::error::Error for TrackEngineError {}

/// Result type alias for track-engine operations.
pub type Result<T> = std::result::Result<T, TrackEngineError>;
