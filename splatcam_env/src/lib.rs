//! splatcam Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that keep the trajectory engine
//! free of wall-clock reads and file/network access:
//! - Time (`now()`) for the render loop that drives playback
//! - Scene bytes (`fetch()`) for loading splat files
//!
//! Production code uses [`SystemClock`] and [`FileSource`]; tests and the
//! simulator use [`ManualClock`] and [`MemorySource`] so every run is
//! reproducible.
//!
//! # Example
//!
//! ```ignore
//! use splatcam_env::{Clock, SceneSource, SystemClock, FileSource};
//!
//! async fn load<S: SceneSource>(source: &S) -> Vec<u8> {
//!     source.fetch("scene.ply").await.unwrap_or_default()
//! }
//!
//! let clock = SystemClock::new();
//! let now = clock.now();
//! ```

mod clock;
mod error;
mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EnvError;
pub use source::{FileSource, MemorySource, SceneSource};
