//! Scene-relative depth statistics.
//!
//! Depth is the camera-local `z` coordinate (+z looks into the scene).
//! Statistics come from the splat centers when available, otherwise from
//! the scene bounding box.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quantile used for `near`; `far` uses `1 - LOW_QUANTILE`.
pub const LOW_QUANTILE: f32 = 0.1;

/// Smallest focus distance a trajectory may converge on.
pub const MIN_FOCUS_DEPTH: f32 = 2.0;

/// Smallest near depth taken from a bounding box.
pub const MIN_NEAR_DEPTH: f32 = 0.01;

/// Near / focus / far depths in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthStatistics {
    pub near: f32,
    pub focus: f32,
    pub far: f32,
}

impl DepthStatistics {
    /// Returned when no usable depth exists.
    pub const FALLBACK: DepthStatistics = DepthStatistics {
        near: 1.0,
        focus: MIN_FOCUS_DEPTH,
        far: 10.0,
    };

    /// Statistics from flat `[x, y, z, x, y, z, ...]` positions.
    ///
    /// Only finite, strictly positive depths count; a trailing partial
    /// triple is ignored.
    pub fn from_points(positions: &[f32]) -> Self {
        let mut depths: Vec<f32> = positions
            .chunks_exact(3)
            .map(|p| p[2])
            .filter(|z| z.is_finite() && *z > 0.0)
            .collect();

        if depths.is_empty() {
            debug!("no positive depths among {} points, using fallback", positions.len() / 3);
            return Self::FALLBACK;
        }

        depths.sort_by(f32::total_cmp);

        let near = quantile(&depths, LOW_QUANTILE);
        let focus = quantile(&depths, 0.5);
        let far = quantile(&depths, 1.0 - LOW_QUANTILE);

        debug!(
            "depth from {} points: near={:.3} focus={:.3} far={:.3}",
            depths.len(),
            near,
            focus,
            far
        );

        Self::with_focus_floor(near, focus, far)
    }

    /// Statistics from an axis-aligned bounding box.
    pub fn from_bounds(min: &Point3<f32>, max: &Point3<f32>) -> Self {
        if !(min.z.is_finite() && max.z.is_finite()) {
            return Self::FALLBACK;
        }
        let (lo, hi) = if min.z <= max.z { (min.z, max.z) } else { (max.z, min.z) };

        let near = lo.max(MIN_NEAR_DEPTH);
        let focus = near + 0.1 * (hi - lo);
        Self::with_focus_floor(near, focus, hi)
    }

    /// Applies the focus floor and keeps `near <= focus <= far`.
    fn with_focus_floor(near: f32, focus: f32, far: f32) -> Self {
        let focus = focus.max(MIN_FOCUS_DEPTH);
        Self {
            near: near.min(focus),
            focus,
            far: far.max(focus),
        }
    }
}

impl Default for DepthStatistics {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Nearest-rank quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f32], q: f32) -> f32 {
    let idx = (q * (sorted.len() - 1) as f32).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
