//! JSON exporter for recorded playback.
//!
//! One file per scene: the derived depth, offset and metadata, then every
//! rendered pose with the player notifications raised on that tick.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use splatcam_core::{
    CameraPose, DepthStatistics, ImageSize, OffsetBounds, PlaybackState, PlayerEvent,
    TrajectoryParams,
};
use std::fs::File;
use std::io::Write;

/// One rendered tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Clock time in seconds
    pub time_sec: f64,

    /// Player frame index after the tick
    pub frame_index: usize,

    pub eye: [f32; 3],
    pub target: [f32; 3],

    /// Notifications drained after the tick
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<PlayerEvent>,
}

impl PoseFrame {
    pub fn new(time_sec: f64, frame_index: usize, pose: &CameraPose, events: Vec<PlayerEvent>) -> Self {
        Self {
            time_sec,
            frame_index,
            eye: point(&pose.eye),
            target: point(&pose.target),
            events,
        }
    }
}

fn point(p: &Point3<f32>) -> [f32; 3] {
    [p.x, p.y, p.z]
}

/// Scene-level values the path was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSummary {
    pub splat_count: usize,
    pub metadata_present: bool,
    pub image_size: ImageSize,
    pub focal_length_px: f32,
    pub depth: DepthStatistics,
    pub offset: [f32; 3],
}

impl SceneSummary {
    pub fn new(
        splat_count: usize,
        metadata_present: bool,
        image_size: ImageSize,
        focal_length_px: f32,
        depth: DepthStatistics,
        offset: OffsetBounds,
    ) -> Self {
        Self {
            splat_count,
            metadata_present,
            image_size,
            focal_length_px,
            depth,
            offset: [offset.x, offset.y, offset.z],
        }
    }
}

/// Complete playback export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackExport {
    /// Scene locator, or `synthetic:<seed>`
    pub scene: String,

    pub seed: u64,

    pub params: TrajectoryParams,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SceneSummary>,

    /// Every eye position of the generated path
    pub path: Vec<[f32; 3]>,

    /// Rendered ticks
    pub frames: Vec<PoseFrame>,

    /// Clock time of the last tick in seconds
    pub duration_sec: f64,

    pub final_state: PlaybackState,
}

impl PlaybackExport {
    /// Creates an empty export.
    pub fn new(scene: &str, seed: u64, params: TrajectoryParams) -> Self {
        Self {
            scene: scene.to_string(),
            seed,
            params,
            summary: None,
            path: Vec::new(),
            frames: Vec::new(),
            duration_sec: 0.0,
            final_state: PlaybackState::Stopped,
        }
    }

    pub fn set_path<'a>(&mut self, path: impl IntoIterator<Item = &'a Point3<f32>>) {
        self.path = path.into_iter().map(point).collect();
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: PoseFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, state: PlaybackState) {
        self.final_state = state;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
