//! splatcam playback harness
//!
//! Runs the camera pipeline end to end without a renderer, so trajectories
//! can be checked and exported from the command line or from tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PlaybackRunner                         │
//! │                                                             │
//! │  SyntheticScene ──► PLY bytes ──┐                           │
//! │                                 ├──► ViewerSession          │
//! │  FileSource ──► load_scene ─────┘         │                 │
//! │                                           ▼                 │
//! │  ManualClock ──advance(interval ± jitter)──► tick_with      │
//! │                                           │                 │
//! │                                           ▼                 │
//! │                                    PlaybackExport (JSON)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All randomness comes from seeds: scene generation and tick jitter are
//! reproducible bit for bit.

pub mod error;
pub mod exporter;
pub mod runner;
pub mod synthetic;

pub use error::SimError;
pub use exporter::{PlaybackExport, PoseFrame, SceneSummary};
pub use runner::{PlaybackRunner, RunConfig, RunReport};
pub use synthetic::SyntheticScene;
