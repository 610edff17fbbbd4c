//! splatcam Core - camera trajectories for Gaussian splat scenes
//!
//! Turns a splat PLY file into an animated camera so a viewer can read
//! the scene's depth without navigating by hand:
//! 1. **Metadata Codec**: intrinsics, extrinsics, image size and color space
//!    from the file's supplementary elements
//! 2. **Depth Estimator**: near / focus / far from splat centers or a bounding box
//! 3. **Offset Model**: how far the camera may move before parallax looks wrong
//! 4. **Trajectory Generator**: deterministic eye paths inside that envelope
//! 5. **Trajectory Player**: frame-rate independent playback with notifications

pub mod error;
pub mod ply;
pub mod scene_metadata;
pub mod depth;
pub mod offset;
pub mod trajectory;
pub mod player;
pub mod session;

// Re-export key types for convenience
pub use depth::DepthStatistics;
pub use error::CodecError;
pub use offset::{compute_offset, OffsetBounds};
pub use player::{LoopMode, PlaybackState, PlayerConfig, PlayerEvent, TrajectoryPlayer};
pub use ply::{read_vertex_positions, PlyLayout, PlyWriter, ScalarType};
pub use scene_metadata::{decode_metadata, try_decode_metadata, ColorSpace, ImageSize, SceneMetadata};
pub use session::{load_scene, prepare_scene, CameraPose, LoadToken, LoadedScene, ViewerSession};
pub use trajectory::{generate, CameraPositionSequence, PathType, TrajectoryParams};
