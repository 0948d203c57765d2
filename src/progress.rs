//! Live course progress tracking against a planned route.
//!
//! A [`RunProgressSession`] owns all per-run mutable state: the last matched
//! route index and the trailing pace window. It is constructed once per
//! active run and threaded through each position update by a single caller:
//! no process-wide state, no internal locking (single-writer discipline).
//!
//! Each update projects the runner onto the nearest route segment within a
//! bounded window around the last match, keeping per-sample cost constant
//! over multi-hour runs. When the windowed search loses the runner (GPS gap,
//! shortcut), an R-tree nearest-neighbour query over the whole route re-seeds
//! the cursor.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use geo::{coord, Closest, ClosestPoint, Line, Point};
use log::{debug, info, warn};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::checkpoints::{resolve_coordinates, SpatialCheckpoint};
use crate::error::{Result, TrackEngineError};
use crate::geo_utils::{cumulative_distances, haversine_distance};
use crate::{Checkpoint, CourseProgress, GpsPoint, TrackPoint};

/// Configuration for course progress tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Distance from the route above which the runner is off course.
    /// Default: 50.0 meters (GPS variance plus trail width)
    pub off_course_threshold_m: f64,

    /// Route points searched on each side of the last matched index.
    /// Default: 25
    pub search_window: usize,

    /// Windowed-search distance above which the cursor is re-seeded with a
    /// global R-tree query. Default: 200.0 meters
    pub rematch_threshold_m: f64,

    /// Trailing position samples used for the recent-pace estimate.
    /// Default: 10
    pub pace_window: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            off_course_threshold_m: 50.0,
            search_window: 25,
            rematch_threshold_m: 200.0,
            pace_window: 10,
        }
    }
}

/// ETA to the next unpassed checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEta {
    /// Checkpoint being approached
    pub checkpoint_id: String,
    /// Where the checkpoint sits on the route
    pub coordinate: GpsPoint,
    /// Along-route distance still to cover, in meters
    pub distance_remaining_m: f64,
    /// Estimated seconds until arrival at recent pace
    pub seconds_remaining: f64,
}

/// A route point with its index, for R-tree re-seeding queries.
#[derive(Debug, Clone, Copy)]
struct IndexedRoutePoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedRoutePoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedRoutePoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Trailing pace sample: along-route distance at an elapsed time.
#[derive(Debug, Clone, Copy)]
struct PaceSample {
    elapsed_seconds: f64,
    along_route_m: f64,
}

/// Best match of a position onto the route.
#[derive(Debug, Clone, Copy)]
struct RouteMatch {
    /// Start index of the matched segment
    segment: usize,
    /// Distance along the route of the projected point, meters
    along_m: f64,
    /// Distance from the position to the projected point, meters
    distance_m: f64,
}

/// Per-run course progress state.
#[derive(Debug)]
pub struct RunProgressSession {
    route: Vec<GpsPoint>,
    route_cumulative: Vec<f64>,
    total_route_m: f64,
    checkpoints: Vec<SpatialCheckpoint>,
    spatial_index: RTree<IndexedRoutePoint>,
    config: ProgressConfig,

    last_matched: usize,
    along_route_m: f64,
    off_course: bool,
    started_at: Option<DateTime<Utc>>,
    pace_samples: VecDeque<PaceSample>,
}

impl RunProgressSession {
    /// Create a session for one active run.
    ///
    /// `route` is the planned path; `checkpoints` may arrive unordered and
    /// are resolved to route coordinates up front. Errors if the route has
    /// fewer than 2 points.
    pub fn new(
        route: &[TrackPoint],
        checkpoints: &[Checkpoint],
        config: ProgressConfig,
    ) -> Result<Self> {
        if route.len() < 2 {
            return Err(TrackEngineError::InsufficientRoutePoints {
                point_count: route.len(),
                minimum_required: 2,
            });
        }

        let coords: Vec<GpsPoint> = route.iter().map(|p| p.coordinate()).collect();
        let route_cumulative = cumulative_distances(&coords);
        let total_route_m = *route_cumulative.last().unwrap_or(&0.0);

        let mut resolved = resolve_coordinates(checkpoints, route);
        resolved.sort_by(|a, b| {
            a.checkpoint
                .distance_from_start_km
                .partial_cmp(&b.checkpoint.distance_from_start_km)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let indexed: Vec<IndexedRoutePoint> = coords
            .iter()
            .enumerate()
            .map(|(i, p)| IndexedRoutePoint {
                idx: i,
                lat: p.latitude,
                lng: p.longitude,
            })
            .collect();

        info!(
            "[Progress] Session started: {:.1} km route, {} checkpoints",
            total_route_m / 1000.0,
            resolved.len()
        );

        Ok(Self {
            route: coords,
            route_cumulative,
            total_route_m,
            checkpoints: resolved,
            spatial_index: RTree::bulk_load(indexed),
            config,
            last_matched: 0,
            along_route_m: 0.0,
            off_course: false,
            started_at: None,
            pace_samples: VecDeque::new(),
        })
    }

    /// Process a new GPS sample and return the current course progress.
    pub fn update(&mut self, position: &TrackPoint) -> CourseProgress {
        let coord = position.coordinate();

        let mut matched = self.nearest_on_route(&coord, self.last_matched);

        // Windowed search lost the runner: re-seed from a global query
        if matched.distance_m > self.config.rematch_threshold_m {
            if let Some(hit) = self
                .spatial_index
                .nearest_neighbor(&[coord.latitude, coord.longitude])
            {
                let reseeded = self.nearest_on_route(&coord, hit.idx);
                if reseeded.distance_m < matched.distance_m {
                    debug!(
                        "[Progress] Cursor re-seeded from segment {} to {}",
                        matched.segment, reseeded.segment
                    );
                    matched = reseeded;
                }
            }
        }

        self.last_matched = matched.segment;
        self.along_route_m = matched.along_m;
        self.record_pace_sample(position.timestamp, matched.along_m);

        let distance_off_course_m = if matched.distance_m > self.config.off_course_threshold_m {
            if !self.off_course {
                warn!(
                    "[Progress] Off course by {:.0} m near segment {}",
                    matched.distance_m, matched.segment
                );
                self.off_course = true;
            }
            matched.distance_m
        } else {
            if self.off_course {
                info!("[Progress] Back on course");
                self.off_course = false;
            }
            0.0
        };

        CourseProgress {
            percent_complete: self.percent_complete(),
            distance_off_course_m,
        }
    }

    /// Current along-route distance in meters.
    pub fn along_route_m(&self) -> f64 {
        self.along_route_m
    }

    /// Current progress along the route, clamped to [0, 100].
    pub fn percent_complete(&self) -> f64 {
        if self.total_route_m <= 0.0 {
            return 0.0;
        }
        (self.along_route_m / self.total_route_m * 100.0).clamp(0.0, 100.0)
    }

    /// Recent pace from the trailing window, in seconds per kilometer.
    ///
    /// Reacts to current effort rather than the cumulative average. None
    /// until the window spans nonzero distance and time.
    pub fn recent_pace_seconds_per_km(&self) -> Option<f64> {
        let first = self.pace_samples.front()?;
        let last = self.pace_samples.back()?;
        let distance_m = last.along_route_m - first.along_route_m;
        let elapsed = last.elapsed_seconds - first.elapsed_seconds;
        if distance_m <= 0.0 || elapsed <= 0.0 {
            return None;
        }
        Some(elapsed / (distance_m / 1000.0))
    }

    /// ETA to the next checkpoint not yet passed, at recent pace.
    ///
    /// None when every checkpoint is behind the runner or the pace window is
    /// not yet usable.
    pub fn next_checkpoint_eta(&self) -> Option<CheckpointEta> {
        let next = self
            .checkpoints
            .iter()
            .find(|cp| cp.checkpoint.distance_from_start_km * 1000.0 > self.along_route_m)?;
        let pace = self.recent_pace_seconds_per_km()?;
        let distance_remaining_m =
            next.checkpoint.distance_from_start_km * 1000.0 - self.along_route_m;
        Some(CheckpointEta {
            checkpoint_id: next.checkpoint.id.clone(),
            coordinate: next.coordinate,
            distance_remaining_m,
            seconds_remaining: distance_remaining_m / 1000.0 * pace,
        })
    }

    fn record_pace_sample(&mut self, timestamp: DateTime<Utc>, along_m: f64) {
        let started = *self.started_at.get_or_insert(timestamp);
        let elapsed_seconds = (timestamp - started).num_milliseconds() as f64 / 1000.0;
        self.pace_samples.push_back(PaceSample {
            elapsed_seconds,
            along_route_m: along_m,
        });
        while self.pace_samples.len() > self.config.pace_window {
            self.pace_samples.pop_front();
        }
    }

    /// Search route segments in a window around `center` and return the best
    /// projection of `position`.
    fn nearest_on_route(&self, position: &GpsPoint, center: usize) -> RouteMatch {
        let last_segment = self.route.len() - 2;
        let lo = center.saturating_sub(self.config.search_window);
        let hi = (center + self.config.search_window).min(last_segment);

        let mut best = RouteMatch {
            segment: lo,
            along_m: self.route_cumulative[lo],
            distance_m: f64::INFINITY,
        };

        for seg in lo..=hi {
            let projected = self.project_onto_segment(position, seg);
            let distance_m = haversine_distance(position, &projected);
            if distance_m < best.distance_m {
                best = RouteMatch {
                    segment: seg,
                    along_m: self.route_cumulative[seg]
                        + haversine_distance(&self.route[seg], &projected),
                    distance_m,
                };
            }
        }

        best
    }

    /// Project a position onto route segment `[seg, seg + 1]`.
    ///
    /// Projection runs in degree space, which is accurate at GPS segment
    /// scale; the resulting distance is measured with haversine.
    fn project_onto_segment(&self, position: &GpsPoint, seg: usize) -> GpsPoint {
        let a = &self.route[seg];
        let b = &self.route[seg + 1];
        let line = Line::new(
            coord! { x: a.longitude, y: a.latitude },
            coord! { x: b.longitude, y: b.latitude },
        );
        match line.closest_point(&Point::new(position.longitude, position.latitude)) {
            Closest::Intersection(p) | Closest::SinglePoint(p) => GpsPoint::new(p.y(), p.x()),
            // Degenerate (zero-length) segment: use its start point
            Closest::Indeterminate => *a,
        }
    }
}
