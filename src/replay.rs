//! Replay sampling and scrubbable playback for a completed run.
//!
//! A dense track is downsampled once per replay session to a bounded frame
//! count, preserving the first and last points and all timing. Playback is an
//! explicit state machine (`Stopped | Playing | Paused`) driven by an
//! injectable monotonic [`Clock`], so tests advance virtual time
//! deterministically instead of sleeping. Ticks are cooperative: the driver
//! calls [`ReplaySession::poll`] and pause/stop/speed-change cancel or re-arm
//! the next tick. No drift-correction clock is used; multiplicative speed is
//! exact enough at typical playback speeds.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, TrackPoint};

/// Configuration for replay sampling and playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Upper bound on the number of frames built per session.
    /// Default: 600
    pub max_frame_count: usize,

    /// Trailing sampled frames used for the instantaneous pace estimate.
    /// Default: 5
    pub pace_window: usize,

    /// Base tick period at 1x speed. Default: 100 ms
    pub tick_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_frame_count: 600,
            pace_window: 5,
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// One downsampled, timestamped snapshot driving route playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Frame index in the sampled sequence
    pub index: u32,
    pub coordinate: GpsPoint,
    pub altitude_m: f64,
    pub heart_rate: Option<u16>,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the first sampled point
    pub elapsed_seconds: f64,
    /// Distance walked over the sampled points, in kilometers
    pub cumulative_distance_km: f64,
    /// Rolling-window pace in seconds per kilometer; 0 when the window
    /// covers no distance or no time
    pub instant_pace_seconds_per_km: f64,
}

/// Downsample a track into at most `config.max_frame_count` frames.
///
/// Tracks within the bound keep every point; longer tracks are sampled at a
/// fixed stride of `ceil(n / max_frame_count)` starting at the first point,
/// and the last point is always represented (replacing the final sample when
/// appending it would exceed the bound). Cumulative distance is re-walked
/// over the sampled points, a small accepted approximation versus the
/// full-resolution track.
pub fn build_frames(points: &[TrackPoint], config: &ReplayConfig) -> Vec<ReplayFrame> {
    if points.is_empty() || config.max_frame_count == 0 {
        return Vec::new();
    }

    let stride = if points.len() <= config.max_frame_count {
        1
    } else {
        points.len().div_ceil(config.max_frame_count)
    };

    let mut sampled: Vec<&TrackPoint> = points.iter().step_by(stride).collect();
    if (points.len() - 1) % stride != 0 {
        let last = &points[points.len() - 1];
        if sampled.len() < config.max_frame_count {
            sampled.push(last);
        } else if let Some(tail) = sampled.last_mut() {
            *tail = last;
        }
    }

    let start_time = sampled[0].timestamp;
    let mut frames: Vec<ReplayFrame> = Vec::with_capacity(sampled.len());
    let mut cumulative_km = 0.0;

    for (i, point) in sampled.iter().enumerate() {
        if i > 0 {
            cumulative_km +=
                haversine_distance(&sampled[i - 1].coordinate(), &point.coordinate()) / 1000.0;
        }
        let elapsed_seconds =
            (point.timestamp - start_time).num_milliseconds() as f64 / 1000.0;

        frames.push(ReplayFrame {
            index: i as u32,
            coordinate: point.coordinate(),
            altitude_m: point.altitude_m,
            heart_rate: point.heart_rate,
            timestamp: point.timestamp,
            elapsed_seconds,
            cumulative_distance_km: cumulative_km,
            instant_pace_seconds_per_km: 0.0,
        });
    }

    // Rolling-window pace over the sampled frames
    for i in 0..frames.len() {
        let window_start = i.saturating_sub(config.pace_window);
        let distance_km =
            frames[i].cumulative_distance_km - frames[window_start].cumulative_distance_km;
        let elapsed = frames[i].elapsed_seconds - frames[window_start].elapsed_seconds;
        if distance_km > 0.0 && elapsed > 0.0 {
            frames[i].instant_pace_seconds_per_km = elapsed / distance_km;
        }
    }

    info!(
        "[Replay] Built {} frames from {} points (stride {})",
        frames.len(),
        points.len(),
        stride
    );

    frames
}

/// Playback state of a replay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Monotonic time source driving playback ticks.
///
/// Production uses [`SystemClock`]; tests inject a manually advanced clock.
pub trait Clock {
    /// Monotonic elapsed time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock [`Clock`] measured from its creation.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Scrubbable playback over a fixed frame list.
///
/// The frame list is built once at construction and owned exclusively by the
/// session. The session never advances past the last frame (auto-stop) or
/// before frame 0.
pub struct ReplaySession<C: Clock = SystemClock> {
    frames: Vec<ReplayFrame>,
    current: usize,
    state: PlaybackState,
    speed: f64,
    tick_interval: Duration,
    next_tick_due: Option<Duration>,
    clock: C,
}

impl ReplaySession<SystemClock> {
    /// Build a session over a completed run's track, on the system clock.
    pub fn new(points: &[TrackPoint], config: &ReplayConfig) -> Self {
        Self::with_clock(points, config, SystemClock::default())
    }
}

impl<C: Clock> ReplaySession<C> {
    /// Build a session with an injected clock.
    pub fn with_clock(points: &[TrackPoint], config: &ReplayConfig, clock: C) -> Self {
        Self {
            frames: build_frames(points, config),
            current: 0,
            state: PlaybackState::Stopped,
            speed: 1.0,
            tick_interval: config.tick_interval,
            next_tick_due: None,
            clock,
        }
    }

    /// All frames of this session.
    pub fn frames(&self) -> &[ReplayFrame] {
        &self.frames
    }

    /// The frame under the playhead, None for an empty session.
    pub fn current_frame(&self) -> Option<&ReplayFrame> {
        self.frames.get(self.current)
    }

    /// Index of the playhead.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Effective period between frame advances at the current speed.
    pub fn tick_period(&self) -> Duration {
        self.tick_interval.div_f64(self.speed)
    }

    /// Start or resume playback. No-op for sessions with fewer than 2 frames.
    pub fn play(&mut self) {
        if self.frames.len() < 2 || self.state == PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Playing;
        self.arm_next_tick();
    }

    /// Cancel the pending tick without resetting the playhead.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.next_tick_due = None;
        }
    }

    /// Cancel playback and reset the playhead to the first frame.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.current = 0;
        self.next_tick_due = None;
    }

    /// Change the playback speed multiplier, clamped to [0.1, 32.0].
    /// Takes effect immediately: a pending tick is re-armed at the new period.
    pub fn set_speed(&mut self, speed: f64) {
        let clamped = if speed.is_finite() {
            speed.clamp(0.1, 32.0)
        } else {
            1.0
        };
        if clamped != speed {
            warn!("[Replay] Speed {} clamped to {}", speed, clamped);
        }
        self.speed = clamped;
        if self.state == PlaybackState::Playing {
            self.arm_next_tick();
        }
    }

    /// Jump the playhead to `progress` through the session, in [0, 1]
    /// (clamped). Safe in any playback state; a pending tick is re-armed.
    /// Returns the new frame index.
    pub fn seek(&mut self, progress: f64) -> usize {
        if self.frames.is_empty() {
            return 0;
        }
        let clamped = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.current = (clamped * (self.frames.len() - 1) as f64).round() as usize;
        if self.state == PlaybackState::Playing {
            self.arm_next_tick();
        }
        self.current
    }

    /// Advance the playhead for every tick that has elapsed on the clock.
    ///
    /// Cooperative: the driver calls this periodically; nothing advances
    /// between calls. Auto-stops on the last frame, leaving the playhead
    /// there. Returns the current frame index.
    pub fn poll(&mut self) -> usize {
        if self.state != PlaybackState::Playing {
            return self.current;
        }
        let now = self.clock.now();
        while let Some(due) = self.next_tick_due {
            if now < due {
                break;
            }
            self.current += 1;
            if self.current >= self.frames.len() - 1 {
                self.current = self.frames.len() - 1;
                self.state = PlaybackState::Stopped;
                self.next_tick_due = None;
                debug!("[Replay] Reached final frame, auto-stopped");
                break;
            }
            self.next_tick_due = Some(due + self.tick_period());
        }
        self.current
    }

    fn arm_next_tick(&mut self) {
        self.next_tick_due = Some(self.clock.now() + self.tick_period());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;
    use std::rc::Rc;

    const KM_LAT_STEP: f64 = 0.008_993_2;

    fn ts(offset_seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_seconds, 0).unwrap()
    }

    /// ~100 m per point, 30 s apart.
    fn sample_track(count: usize) -> Vec<TrackPoint> {
        (0..count)
            .map(|i| {
                TrackPoint::new(
                    46.0 + i as f64 * KM_LAT_STEP / 10.0,
                    7.0,
                    800.0,
                    ts(i as i64 * 30),
                )
            })
            .collect()
    }

    /// Manually advanced clock shared with the session under test.
    #[derive(Clone)]
    struct ManualClock(Rc<Cell<Duration>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Rc::new(Cell::new(Duration::ZERO)))
        }

        fn advance(&self, by: Duration) {
            self.0.set(self.0.get() + by);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.0.get()
        }
    }

    #[test]
    fn test_small_track_keeps_every_point() {
        let track = sample_track(50);
        let frames = build_frames(&track, &ReplayConfig::default());
        assert_eq!(frames.len(), 50);
    }

    #[test]
    fn test_downsampling_bounds_frame_count() {
        for n in [600, 601, 1199, 1200, 1201, 5000] {
            let track = sample_track(n);
            let frames = build_frames(&track, &ReplayConfig::default());
            assert!(frames.len() <= 600, "{n} points gave {} frames", frames.len());
            // First and last original points are always represented
            assert_eq!(frames[0].timestamp, track[0].timestamp);
            assert_eq!(
                frames.last().unwrap().timestamp,
                track.last().unwrap().timestamp
            );
        }
    }

    #[test]
    fn test_frame_elapsed_non_decreasing() {
        let track = sample_track(2000);
        let frames = build_frames(&track, &ReplayConfig::default());
        for pair in frames.windows(2) {
            assert!(pair[1].elapsed_seconds >= pair[0].elapsed_seconds);
            assert!(pair[1].cumulative_distance_km >= pair[0].cumulative_distance_km);
        }
    }

    #[test]
    fn test_rolling_window_pace() {
        // 100 m per 30 s: steady 300 s/km at full resolution
        let track = sample_track(50);
        let frames = build_frames(&track, &ReplayConfig::default());
        let mid = &frames[20];
        assert!(
            (mid.instant_pace_seconds_per_km - 300.0).abs() < 5.0,
            "got {}",
            mid.instant_pace_seconds_per_km
        );
        // First frame has an empty window
        assert_eq!(frames[0].instant_pace_seconds_per_km, 0.0);
    }

    #[test]
    fn test_stationary_window_reports_zero_pace() {
        // All samples at the same coordinate
        let track: Vec<TrackPoint> =
            (0..10).map(|i| TrackPoint::new(46.0, 7.0, 800.0, ts(i * 30))).collect();
        let frames = build_frames(&track, &ReplayConfig::default());
        assert!(frames.iter().all(|f| f.instant_pace_seconds_per_km == 0.0));
    }

    #[test]
    fn test_empty_track_builds_no_frames() {
        assert!(build_frames(&[], &ReplayConfig::default()).is_empty());
    }

    #[test]
    fn test_playback_advances_one_frame_per_tick() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(10), &ReplayConfig::default(), clock.clone());

        session.play();
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.poll(), 0); // no tick elapsed yet

        clock.advance(Duration::from_millis(100));
        assert_eq!(session.poll(), 1);

        clock.advance(Duration::from_millis(300));
        assert_eq!(session.poll(), 4);
    }

    #[test]
    fn test_playback_auto_stops_at_last_frame() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(5), &ReplayConfig::default(), clock.clone());

        session.play();
        clock.advance(Duration::from_secs(60));
        assert_eq!(session.poll(), 4);
        assert_eq!(session.state(), PlaybackState::Stopped);
        // Playhead stays on the final frame after auto-stop
        assert_eq!(session.current_index(), 4);
    }

    #[test]
    fn test_pause_holds_position() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(10), &ReplayConfig::default(), clock.clone());

        session.play();
        clock.advance(Duration::from_millis(200));
        session.poll();
        session.pause();
        let held = session.current_index();

        clock.advance(Duration::from_secs(10));
        assert_eq!(session.poll(), held);
        assert_eq!(session.state(), PlaybackState::Paused);

        // Resume continues from the held position
        session.play();
        clock.advance(Duration::from_millis(100));
        assert_eq!(session.poll(), held + 1);
    }

    #[test]
    fn test_stop_resets_position() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(10), &ReplayConfig::default(), clock.clone());
        session.play();
        clock.advance(Duration::from_millis(300));
        session.poll();
        session.stop();
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_speed_scales_tick_period() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(50), &ReplayConfig::default(), clock.clone());

        session.set_speed(4.0);
        assert_eq!(session.tick_period(), Duration::from_millis(25));

        session.play();
        clock.advance(Duration::from_millis(100));
        assert_eq!(session.poll(), 4);
    }

    #[test]
    fn test_speed_clamped() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(10), &ReplayConfig::default(), clock);
        session.set_speed(1000.0);
        assert_eq!(session.speed(), 32.0);
        session.set_speed(0.0);
        assert_eq!(session.speed(), 0.1);
    }

    #[test]
    fn test_seek_in_any_state() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&sample_track(11), &ReplayConfig::default(), clock.clone());

        // Stopped: jump to midpoint
        assert_eq!(session.seek(0.5), 5);
        assert_eq!(session.state(), PlaybackState::Stopped);

        // Out-of-range input clamps
        assert_eq!(session.seek(1.5), 10);
        assert_eq!(session.seek(-0.2), 0);

        // Playing: seek re-arms, playback continues from the new position
        session.play();
        session.seek(0.5);
        clock.advance(Duration::from_millis(100));
        assert_eq!(session.poll(), 6);
    }

    #[test]
    fn test_empty_session_is_inert() {
        let clock = ManualClock::new();
        let mut session =
            ReplaySession::with_clock(&[], &ReplayConfig::default(), clock.clone());
        session.play();
        assert_eq!(session.state(), PlaybackState::Stopped);
        assert_eq!(session.seek(0.7), 0);
        clock.advance(Duration::from_secs(1));
        assert_eq!(session.poll(), 0);
        assert!(session.current_frame().is_none());
    }
}
