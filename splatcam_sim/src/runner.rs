//! Playback runner.
//!
//! Drives a [`ViewerSession`] the way a render loop would, but on a
//! [`ManualClock`]: every tick advances virtual time by one render interval
//! (optionally jittered from a seeded RNG) and records the pose. Runs are
//! reproducible for a given seed regardless of host speed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use splatcam_core::{PlaybackState, ViewerSession};
use splatcam_env::{Clock, ManualClock};
use std::time::Duration;
use tracing::debug;

use crate::error::SimError;
use crate::exporter::{PlaybackExport, PoseFrame, SceneSummary};

/// Accepted render rates in Hz.
pub const RENDER_HZ_RANGE: std::ops::RangeInclusive<f64> = 0.01..=10_000.0;

/// Longest run in virtual seconds.
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Render-loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Render ticks per second (default: 60)
    pub render_hz: f64,

    /// Virtual time to run for in seconds
    pub duration_secs: f64,

    /// Relative tick jitter in `[0, 1)`; 0.25 means each interval is
    /// stretched or shrunk by up to 25%
    pub jitter: f64,

    /// Seed for the jitter RNG
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            render_hz: 60.0,
            duration_secs: 4.0,
            jitter: 0.0,
            seed: 42,
        }
    }
}

impl RunConfig {
    /// Rejects values the runner cannot use.
    pub fn validate(&self) -> Result<(), SimError> {
        if !RENDER_HZ_RANGE.contains(&self.render_hz) {
            return Err(SimError::invalid(format!(
                "render rate must be in [{}, {}] Hz, got {}",
                RENDER_HZ_RANGE.start(),
                RENDER_HZ_RANGE.end(),
                self.render_hz
            )));
        }
        if !(0.0..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(SimError::invalid(format!(
                "duration must be in [0, {}] s, got {}",
                MAX_DURATION_SECS, self.duration_secs
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(SimError::invalid(format!("jitter must be in [0, 1), got {}", self.jitter)));
        }
        Ok(())
    }

    fn render_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.render_hz)
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Render ticks executed
    pub ticks: u64,

    /// Ticks that produced a pose
    pub rendered: u64,

    /// Distinct frame indices seen while rendering
    pub frames_visited: usize,

    pub final_state: PlaybackState,

    pub export: PlaybackExport,
}

impl RunReport {
    /// A run passes if the session had a path to play and rendered from it.
    pub fn passed(&self) -> bool {
        !self.export.path.is_empty() && self.rendered > 0
    }
}

/// Runs a session against a virtual clock.
pub struct PlaybackRunner {
    config: RunConfig,
    clock: ManualClock,
    rng: ChaCha8Rng,
}

impl PlaybackRunner {
    pub fn new(config: RunConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            clock: ManualClock::new(),
            config,
        })
    }

    /// Starts playback and ticks until the configured duration elapses.
    ///
    /// `scene` labels the export. The session is left in whatever state
    /// playback ended in.
    pub fn run(&mut self, session: &mut ViewerSession, scene: &str) -> RunReport {
        let mut export = PlaybackExport::new(scene, self.config.seed, session.params().clone());
        if let Some(loaded) = session.scene() {
            export.summary = Some(SceneSummary::new(
                loaded.splat_count,
                loaded.metadata.present,
                loaded.metadata.image_size,
                loaded.metadata.effective_focal_length_px(),
                loaded.depth,
                session.offset(),
            ));
        }
        export.set_path(session.player().sequence().iter());

        session.player_mut().play();

        let interval = self.config.render_interval();
        let end = self.clock.now() + Duration::from_secs_f64(self.config.duration_secs);
        let mut ticks = 0u64;
        let mut rendered = 0u64;
        let mut visited = vec![false; session.player().sequence().len()];

        loop {
            let now = self.clock.now();
            if now > end {
                break;
            }
            ticks += 1;

            let pose = session.tick_with(&self.clock);
            let events = session.drain_events();
            if let Some(pose) = pose {
                rendered += 1;
                let index = session.player().frame_index();
                if let Some(seen) = visited.get_mut(index) {
                    *seen = true;
                }
                export.add_frame(PoseFrame::new(now.as_secs_f64(), index, &pose, events));
            }

            if ticks % 60 == 0 {
                debug!(
                    "  t={:.2}s | frame={} | state={:?}",
                    now.as_secs_f64(),
                    session.player().frame_index(),
                    session.player().state()
                );
            }

            let step = self.next_step(interval);
            self.clock.advance(step);
        }

        let final_state = session.player().state();
        export.finalize(final_state);

        RunReport {
            ticks,
            rendered,
            frames_visited: visited.iter().filter(|v| **v).count(),
            final_state,
            export,
        }
    }

    fn next_step(&mut self, interval: Duration) -> Duration {
        if self.config.jitter == 0.0 {
            return interval;
        }
        let scale = 1.0 + self.rng.gen_range(-self.config.jitter..self.config.jitter);
        interval.mul_f64(scale)
    }
}
