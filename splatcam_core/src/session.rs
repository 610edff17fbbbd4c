//! Viewer session - ties scene loading, trajectory generation and playback together.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        ViewerSession                          │
//! │                                                               │
//! │  SceneSource ──fetch──► prepare_scene ──► LoadedScene          │
//! │                         (metadata + depth)     │              │
//! │                                  apply_load(token, scene)     │
//! │                                                ▼              │
//! │  TrajectoryParams ──► compute_offset ──► generate ──► Player  │
//! │                                                        │      │
//! │                           tick(now) ◄── render loop ───┘      │
//! │                              │                                │
//! │                              ▼                                │
//! │                         CameraPose                            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loads are async and may finish out of order. Each load takes a
//! [`LoadToken`] from [`ViewerSession::begin_load`]; a completion is only
//! applied if its token is newer than the last one applied, and metadata,
//! depth and the regenerated path are swapped in together.

use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use splatcam_env::{Clock, EnvError, SceneSource};
use tracing::{debug, info, warn};

use crate::depth::DepthStatistics;
use crate::offset::{compute_offset, OffsetBounds};
use crate::player::{PlayerConfig, PlayerEvent, TrajectoryPlayer};
use crate::ply::read_vertex_positions;
use crate::scene_metadata::{decode_metadata, SceneMetadata};
use crate::trajectory::TrajectoryParams;

/// Version stamp for an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Everything derived from one scene file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedScene {
    pub metadata: SceneMetadata,
    pub depth: DepthStatistics,

    /// Number of splats whose positions were read
    pub splat_count: usize,
}

/// Decodes metadata and depth statistics from raw scene bytes.
///
/// Never fails: unreadable vertices fall back to
/// [`DepthStatistics::FALLBACK`].
pub fn prepare_scene(bytes: &[u8]) -> LoadedScene {
    let metadata = decode_metadata(bytes);
    let (depth, splat_count) = match read_vertex_positions(bytes) {
        Ok(positions) => (DepthStatistics::from_points(&positions), positions.len() / 3),
        Err(e) => {
            warn!("splat positions unavailable ({}), using fallback depth", e);
            (DepthStatistics::FALLBACK, 0)
        }
    };

    LoadedScene {
        metadata,
        depth,
        splat_count,
    }
}

/// Fetches `locator` from `source` and prepares it.
pub async fn load_scene<S>(source: &S, locator: &str) -> Result<LoadedScene, EnvError>
where
    S: SceneSource + ?Sized,
{
    let bytes = source.fetch(locator).await?;
    info!("fetched {} ({} bytes)", locator, bytes.len());
    Ok(prepare_scene(&bytes))
}

/// Camera pose handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl CameraPose {
    /// Looks from `eye` at the point `focus` units down the depth axis.
    pub fn look_at(eye: Point3<f32>, focus: f32) -> Self {
        let mut target = Point3::new(0.0, 0.0, focus);
        if target.z - eye.z < 1e-3 {
            // Eye has reached the focus plane; keep looking forward
            target = Point3::new(eye.x, eye.y, eye.z + 1.0);
        }
        Self {
            eye,
            target,
            up: -Vector3::y(),
        }
    }

    /// Right-handed view matrix.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.eye, &self.target, &self.up)
    }
}

/// The consumer-facing core: current scene, parameters, path and player.
#[derive(Debug)]
pub struct ViewerSession {
    params: TrajectoryParams,
    scene: Option<LoadedScene>,
    offset: OffsetBounds,
    player: TrajectoryPlayer,

    /// Last token handed out
    issued: u64,

    /// Token of the scene currently applied
    applied: u64,
}

impl ViewerSession {
    pub fn new(params: TrajectoryParams, player_config: PlayerConfig) -> Self {
        Self {
            params,
            scene: None,
            offset: OffsetBounds::default(),
            player: TrajectoryPlayer::new(player_config),
            issued: 0,
            applied: 0,
        }
    }

    /// Starts a load and returns its token.
    pub fn begin_load(&mut self) -> LoadToken {
        self.issued += 1;
        LoadToken(self.issued)
    }

    /// True if no load was started after `token`.
    pub fn is_latest(&self, token: LoadToken) -> bool {
        token.0 == self.issued
    }

    /// Applies a finished load unless a newer one was applied already.
    ///
    /// Returns `false` for stale completions, which are dropped.
    pub fn apply_load(&mut self, token: LoadToken, scene: LoadedScene) -> bool {
        if token.0 <= self.applied {
            debug!("dropping stale load {} (applied {})", token.0, self.applied);
            return false;
        }
        self.applied = token.0;
        self.scene = Some(scene);
        self.regenerate();
        true
    }

    /// Convenience for a single load: token, fetch, apply.
    pub async fn load<S>(&mut self, source: &S, locator: &str) -> Result<bool, EnvError>
    where
        S: SceneSource + ?Sized,
    {
        let token = self.begin_load();
        let scene = load_scene(source, locator).await?;
        Ok(self.apply_load(token, scene))
    }

    pub fn scene(&self) -> Option<&LoadedScene> {
        self.scene.as_ref()
    }

    pub fn params(&self) -> &TrajectoryParams {
        &self.params
    }

    pub fn offset(&self) -> OffsetBounds {
        self.offset
    }

    /// Depth statistics of the current scene.
    pub fn depth(&self) -> DepthStatistics {
        self.scene.as_ref().map(|s| s.depth).unwrap_or_default()
    }

    pub fn player(&self) -> &TrajectoryPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut TrajectoryPlayer {
        &mut self.player
    }

    /// Replaces all parameters and regenerates the path.
    pub fn set_params(&mut self, params: TrajectoryParams) {
        self.params = params;
        self.regenerate();
    }

    /// Edits parameters in place and regenerates the path.
    pub fn update_params(&mut self, edit: impl FnOnce(&mut TrajectoryParams)) {
        edit(&mut self.params);
        self.regenerate();
    }

    /// Restores the default parameters.
    pub fn reset_params(&mut self) {
        self.set_params(TrajectoryParams::default());
    }

    /// Advances playback and returns the pose to render.
    pub fn tick(&mut self, now: std::time::Duration) -> Option<CameraPose> {
        let focus = self.depth().focus;
        self.player
            .update(now)
            .map(|eye| CameraPose::look_at(eye, focus))
    }

    /// [`ViewerSession::tick`] with the time taken from `clock`.
    pub fn tick_with<C: Clock + ?Sized>(&mut self, clock: &C) -> Option<CameraPose> {
        self.tick(clock.now())
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        self.player.drain_events()
    }

    fn regenerate(&mut self) {
        let Some(scene) = &self.scene else {
            return;
        };
        let params = self.params.sanitized();
        let metadata = &scene.metadata;

        self.offset = compute_offset(
            scene.depth.near,
            metadata.image_size,
            metadata.effective_focal_length_px(),
            &params,
        );
        let sequence = params.generate(&self.offset);

        debug!(
            "regenerated {} path: {} frames, offset=({:.4}, {:.4}, {:.4})",
            params.path_type,
            sequence.len(),
            self.offset.x,
            self.offset.y,
            self.offset.z
        );
        self.player.set_trajectory(sequence);
    }
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(TrajectoryParams::default(), PlayerConfig::default())
    }
}
