//! Trajectory player: wall-clock playback of an eye path.
//!
//! ```text
//!            play()               pause()
//!  Stopped ─────────► Playing ─────────► Paused
//!     ▲                 │  ▲                │
//!     │    stop() /     │  └─── play() ─────┘
//!     └── end of path ──┘
//!         (LoopMode::Once)
//! ```
//!
//! `update(now)` is the only thing that moves the frame index. It advances
//! `floor(elapsed / frame_interval)` frames, so playback speed does not
//! depend on how often the render loop calls it.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

use crate::trajectory::CameraPositionSequence;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// What happens at the end of the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Jump back to frame 0 and keep playing
    #[default]
    Wrap,
    /// Stop after the last frame
    Once,
}

/// Notification for the collaborator; drained with [`TrajectoryPlayer::drain_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerEvent {
    StateChanged { state: PlaybackState },
    FrameChanged { index: usize, total: usize },
}

/// Player configuration, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Path frames per second (default: 30)
    pub playback_rate_hz: f32,

    pub loop_mode: LoopMode,

    /// Undrained events kept before the oldest are dropped (default: 256)
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            playback_rate_hz: 30.0,
            loop_mode: LoopMode::Wrap,
            event_capacity: 256,
        }
    }
}

/// Single-owner playback state machine.
#[derive(Debug)]
pub struct TrajectoryPlayer {
    config: PlayerConfig,
    frame_interval: Duration,
    sequence: CameraPositionSequence,
    state: PlaybackState,
    index: usize,

    /// Timestamp the current frame was entered at; `None` until the first
    /// `update` after (re)starting
    last_step: Option<Duration>,

    events: VecDeque<PlayerEvent>,
}

impl TrajectoryPlayer {
    /// Creates a stopped player with an empty path.
    pub fn new(config: PlayerConfig) -> Self {
        let rate = if config.playback_rate_hz.is_finite() && config.playback_rate_hz > 0.0 {
            config.playback_rate_hz
        } else {
            PlayerConfig::default().playback_rate_hz
        };
        Self {
            // Rates too slow to represent never leave the current frame
            frame_interval: Duration::try_from_secs_f64(1.0 / rate as f64).unwrap_or(Duration::MAX),
            config,
            sequence: CameraPositionSequence::empty(),
            state: PlaybackState::Stopped,
            index: 0,
            last_step: None,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame_index(&self) -> usize {
        self.index
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn sequence(&self) -> &CameraPositionSequence {
        &self.sequence
    }

    /// Position of the current frame, whatever the state.
    pub fn current_position(&self) -> Option<Point3<f32>> {
        self.sequence.get(self.index)
    }

    /// Replaces the path. Frame index returns to 0; an empty path stops playback.
    pub fn set_trajectory(&mut self, sequence: CameraPositionSequence) {
        self.sequence = sequence;
        self.index = 0;
        self.last_step = None;

        if self.sequence.is_empty() && self.state != PlaybackState::Stopped {
            self.transition(PlaybackState::Stopped);
        }
        self.emit_frame();
    }

    /// Starts or resumes playback. No-op without a path or while playing.
    pub fn play(&mut self) {
        if self.sequence.is_empty() || self.state == PlaybackState::Playing {
            return;
        }
        self.last_step = None;
        self.transition(PlaybackState::Playing);
    }

    /// Pauses playback, keeping the frame index.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.transition(PlaybackState::Paused);
        }
    }

    /// Returns to frame 0 without changing state.
    pub fn reset(&mut self) {
        self.index = 0;
        self.last_step = None;
        self.emit_frame();
    }

    /// Stops playback and returns to frame 0.
    pub fn stop(&mut self) {
        let moved = self.index != 0;
        self.index = 0;
        self.last_step = None;
        if self.state != PlaybackState::Stopped {
            self.transition(PlaybackState::Stopped);
        }
        if moved {
            self.emit_frame();
        }
    }

    /// Advances playback to `now` and returns the eye position to render.
    ///
    /// Returns `None` unless playing. The first call after starting only
    /// records `now` as the baseline.
    pub fn update(&mut self, now: Duration) -> Option<Point3<f32>> {
        if self.state != PlaybackState::Playing || self.sequence.is_empty() {
            return None;
        }

        let last = match self.last_step {
            Some(last) if now >= last => last,
            // First tick, or the clock went backwards: rebase
            _ => {
                self.last_step = Some(now);
                return self.current_position();
            }
        };

        let interval_ns = self.frame_interval.as_nanos().max(1);
        let steps = (now - last).as_nanos() / interval_ns;
        if steps == 0 {
            return self.current_position();
        }
        self.last_step = Some(last + Duration::from_nanos((steps * interval_ns) as u64));

        let total = self.sequence.len();
        let target = self.index as u128 + steps;

        match self.config.loop_mode {
            LoopMode::Wrap => {
                self.index = (target % total as u128) as usize;
                self.emit_frame();
                self.current_position()
            }
            LoopMode::Once if target >= total as u128 => {
                let last_position = self.sequence.get(total - 1);
                debug!("trajectory finished after {} frames", total);
                self.index = 0;
                self.last_step = None;
                self.transition(PlaybackState::Stopped);
                self.emit_frame();
                last_position
            }
            LoopMode::Once => {
                self.index = target as usize;
                self.emit_frame();
                self.current_position()
            }
        }
    }

    /// Takes all queued notifications, oldest first.
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        self.events.drain(..).collect()
    }

    fn transition(&mut self, state: PlaybackState) {
        debug!("playback {:?} -> {:?}", self.state, state);
        self.state = state;
        self.push_event(PlayerEvent::StateChanged { state });
    }

    fn emit_frame(&mut self) {
        self.push_event(PlayerEvent::FrameChanged {
            index: self.index,
            total: self.sequence.len(),
        });
    }

    fn push_event(&mut self, event: PlayerEvent) {
        if self.config.event_capacity == 0 {
            return;
        }
        while self.events.len() >= self.config.event_capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

impl Default for TrajectoryPlayer {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(len: usize) -> CameraPositionSequence {
        CameraPositionSequence::new((0..len).map(|i| Point3::new(i as f32, 0.0, 0.0)).collect())
    }

    fn loaded(len: usize, loop_mode: LoopMode) -> TrajectoryPlayer {
        let mut player = TrajectoryPlayer::new(PlayerConfig {
            loop_mode,
            ..PlayerConfig::default()
        });
        player.set_trajectory(line(len));
        player.drain_events();
        player
    }

    fn states(events: &[PlayerEvent]) -> Vec<PlaybackState> {
        events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::StateChanged { state } => Some(*state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_extreme_rates_are_clamped() {
        let mut slow = TrajectoryPlayer::new(PlayerConfig {
            playback_rate_hz: 1e-30,
            ..PlayerConfig::default()
        });
        assert_eq!(slow.frame_interval(), Duration::MAX);

        slow.set_trajectory(line(4));
        slow.play();
        let t0 = Duration::from_secs(1);
        slow.update(t0);
        assert_eq!(slow.update(t0 + Duration::from_secs(3600)), Some(Point3::new(0.0, 0.0, 0.0)));
        assert_eq!(slow.frame_index(), 0);

        let mut fast = TrajectoryPlayer::new(PlayerConfig {
            playback_rate_hz: 1e30,
            ..PlayerConfig::default()
        });
        fast.set_trajectory(line(4));
        fast.play();
        fast.update(t0);
        fast.update(t0 + Duration::from_nanos(3));
        assert_eq!(fast.frame_index(), 3);
    }

    #[test]
    fn test_play_pause_play_stop() {
        let mut player = loaded(10, LoopMode::Wrap);
        let t0 = Duration::from_secs(1);
        let dt = player.frame_interval();

        player.play();
        player.update(t0);
        player.update(t0 + dt * 4);
        player.pause();
        assert_eq!(player.frame_index(), 4);
        player.play();
        player.stop();

        assert_eq!(
            states(&player.drain_events()),
            vec![
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Playing,
                PlaybackState::Stopped,
            ]
        );
        assert_eq!(player.frame_index(), 0);
        assert_eq!(player.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_play_without_sequence_is_noop() {
        let mut player = TrajectoryPlayer::default();
        player.play();

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert!(player.drain_events().is_empty());
        assert_eq!(player.update(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_single_large_step_advances_floor_of_elapsed() {
        let mut player = loaded(10, LoopMode::Wrap);
        let dt = player.frame_interval();
        let t0 = Duration::from_millis(500);

        player.play();
        assert_eq!(player.update(t0), Some(Point3::new(0.0, 0.0, 0.0)));
        assert_eq!(player.update(t0 + dt * 3), Some(Point3::new(3.0, 0.0, 0.0)));
        assert_eq!(player.frame_index(), 3);
    }

    #[test]
    fn test_many_small_steps_match_one_large_step() {
        let mut player = loaded(10, LoopMode::Wrap);
        let dt = player.frame_interval();
        let t0 = Duration::from_millis(500);

        player.play();
        player.update(t0);
        for i in 1..=3u32 {
            player.update(t0 + dt * i);
        }
        assert_eq!(player.frame_index(), 3);
    }

    #[test]
    fn test_partial_intervals_carry_over() {
        let mut player = loaded(10, LoopMode::Wrap);
        let dt = player.frame_interval();
        let half = dt / 2;
        let t0 = Duration::ZERO;

        player.play();
        player.update(t0);
        player.update(t0 + half);
        assert_eq!(player.frame_index(), 0);
        player.update(t0 + dt + half);
        assert_eq!(player.frame_index(), 1);
        player.update(t0 + dt * 2);
        assert_eq!(player.frame_index(), 2);
    }

    #[test]
    fn test_wrap_mode_loops() {
        let mut player = loaded(4, LoopMode::Wrap);
        let dt = player.frame_interval();

        player.play();
        player.update(Duration::ZERO);
        player.update(dt * 6);

        assert_eq!(player.frame_index(), 2);
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_once_mode_stops_at_end() {
        let mut player = loaded(4, LoopMode::Once);
        let dt = player.frame_interval();

        player.play();
        player.update(Duration::ZERO);
        assert_eq!(player.update(dt * 10), Some(Point3::new(3.0, 0.0, 0.0)));

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.frame_index(), 0);
        assert_eq!(player.update(dt * 11), None);
    }

    #[test]
    fn test_pause_excludes_paused_time() {
        let mut player = loaded(10, LoopMode::Wrap);
        let dt = player.frame_interval();

        player.play();
        player.update(Duration::ZERO);
        player.update(dt * 2);
        player.pause();
        assert_eq!(player.update(dt * 100), None);

        player.play();
        player.update(dt * 100);
        player.update(dt * 101);
        assert_eq!(player.frame_index(), 3);
    }

    #[test]
    fn test_reset_keeps_state() {
        let mut player = loaded(10, LoopMode::Wrap);
        let dt = player.frame_interval();

        player.play();
        player.update(Duration::ZERO);
        player.update(dt * 5);
        player.drain_events();
        player.reset();

        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.frame_index(), 0);
        assert_eq!(
            player.drain_events(),
            vec![PlayerEvent::FrameChanged { index: 0, total: 10 }]
        );
    }

    #[test]
    fn test_set_trajectory_while_playing_restarts() {
        let mut player = loaded(10, LoopMode::Wrap);
        let dt = player.frame_interval();

        player.play();
        player.update(Duration::ZERO);
        player.update(dt * 5);
        player.set_trajectory(line(20));

        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.frame_index(), 0);
        assert_eq!(player.sequence().len(), 20);
    }

    #[test]
    fn test_empty_trajectory_forces_stop() {
        let mut player = loaded(10, LoopMode::Wrap);
        player.play();
        player.drain_events();

        player.set_trajectory(CameraPositionSequence::empty());

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(
            player.drain_events(),
            vec![
                PlayerEvent::StateChanged { state: PlaybackState::Stopped },
                PlayerEvent::FrameChanged { index: 0, total: 0 },
            ]
        );
    }

    #[test]
    fn test_event_queue_is_bounded() {
        let mut player = TrajectoryPlayer::new(PlayerConfig {
            event_capacity: 3,
            ..PlayerConfig::default()
        });
        for _ in 0..10 {
            player.set_trajectory(line(2));
        }
        assert_eq!(player.drain_events().len(), 3);
    }
}
