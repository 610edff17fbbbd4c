//! Offset model: how far the camera may travel from its rest pose.
//!
//! The lateral bound keeps the image-plane disparity of the nearest
//! content below `max_disparity_fraction` of the image diagonal; the medial
//! bound moves the camera at most `max_zoom_fraction` of the near depth.

use serde::{Deserialize, Serialize};

use crate::scene_metadata::ImageSize;
use crate::trajectory::TrajectoryParams;

/// Near depths at or below zero are clamped to this value.
pub const MIN_OFFSET_DEPTH: f32 = 0.01;

/// Vertical field of view assumed when the focal length is unknown.
pub const DEFAULT_VERTICAL_FOV_DEGREES: f32 = 60.0;

/// Maximum excursion along each camera-local axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OffsetBounds {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl OffsetBounds {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: non_negative(x),
            y: non_negative(y),
            z: non_negative(z),
        }
    }
}

/// Computes the offset envelope for a scene.
///
/// # Arguments
/// * `min_depth` - Near depth of the scene
/// * `image_size` - Source image size in pixels
/// * `focal_length_px` - Focal length in pixels (estimated if not positive)
/// * `params` - Disparity and zoom fractions
pub fn compute_offset(
    min_depth: f32,
    image_size: ImageSize,
    focal_length_px: f32,
    params: &TrajectoryParams,
) -> OffsetBounds {
    let depth = if min_depth.is_finite() && min_depth > 0.0 {
        min_depth
    } else {
        MIN_OFFSET_DEPTH
    };
    let focal = if focal_length_px.is_finite() && focal_length_px > 0.0 {
        focal_length_px
    } else {
        estimate_focal_length_px(image_size.height)
    };

    let width = image_size.width as f32 / focal;
    let height = image_size.height as f32 / focal;
    let diagonal = width.hypot(height);

    let lateral = non_negative(params.max_disparity_fraction) * diagonal * depth;
    let medial = non_negative(params.max_zoom_fraction) * depth;

    OffsetBounds::new(lateral, lateral, medial)
}

/// Focal length for an image of `height` pixels at the default vertical FOV.
pub fn estimate_focal_length_px(height: u32) -> f32 {
    let half_fov = (DEFAULT_VERTICAL_FOV_DEGREES / 2.0).to_radians();
    height.max(1) as f32 / (2.0 * half_fov.tan())
}

/// Vertical field of view (degrees) the renderer should use for a focal length.
pub fn vertical_fov_degrees(focal_length_px: f32, height: u32) -> f32 {
    if !(focal_length_px.is_finite() && focal_length_px > 0.0) {
        return DEFAULT_VERTICAL_FOV_DEGREES;
    }
    (2.0 * (height as f32 / (2.0 * focal_length_px)).atan()).to_degrees()
}

fn non_negative(v: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn params(disparity: f32, zoom: f32) -> TrajectoryParams {
        TrajectoryParams {
            max_disparity_fraction: disparity,
            max_zoom_fraction: zoom,
            ..TrajectoryParams::default()
        }
    }

    #[test]
    fn test_offset_formula() {
        // 640x480 at f=500 -> diagonal = sqrt(1.28^2 + 0.96^2) = 1.6
        let bounds = compute_offset(2.0, ImageSize::new(640, 480), 500.0, &params(0.1, 0.2));

        assert_relative_eq!(bounds.x, 0.1 * 1.6 * 2.0, epsilon = 1e-6);
        assert_relative_eq!(bounds.y, bounds.x);
        assert_relative_eq!(bounds.z, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_depth_is_clamped() {
        let p = params(0.1, 0.2);
        for depth in [0.0, -4.0, f32::NAN] {
            let bounds = compute_offset(depth, ImageSize::new(640, 480), 500.0, &p);
            assert!(bounds.x > 0.0 && bounds.z > 0.0);
            assert_relative_eq!(bounds.z, 0.2 * MIN_OFFSET_DEPTH);
        }
    }

    #[test]
    fn test_invalid_fractions_yield_zero_extent() {
        let bounds = compute_offset(2.0, ImageSize::new(640, 480), 500.0, &params(f32::NAN, -1.0));
        assert_eq!(bounds, OffsetBounds::default());
    }

    #[test]
    fn test_missing_focal_uses_estimate() {
        let p = params(0.1, 0.2);
        let estimated = compute_offset(2.0, ImageSize::new(640, 480), 0.0, &p);
        let explicit = compute_offset(2.0, ImageSize::new(640, 480), estimate_focal_length_px(480), &p);
        assert_eq!(estimated, explicit);
    }

    #[test]
    fn test_fov_round_trip() {
        let focal = estimate_focal_length_px(480);
        assert_relative_eq!(vertical_fov_degrees(focal, 480), DEFAULT_VERTICAL_FOV_DEGREES, epsilon = 1e-3);
        assert_relative_eq!(vertical_fov_degrees(0.0, 480), DEFAULT_VERTICAL_FOV_DEGREES);
    }

    proptest! {
        #[test]
        fn prop_disparity_only_moves_lateral(
            depth in 0.1f32..50.0,
            disparity in 0.001f32..0.5,
            bump in 0.01f32..0.5,
            zoom in 0.0f32..0.5,
        ) {
            let size = ImageSize::new(1280, 720);
            let a = compute_offset(depth, size, 900.0, &params(disparity, zoom));
            let b = compute_offset(depth, size, 900.0, &params(disparity + bump, zoom));
            prop_assert!(b.x > a.x);
            prop_assert!(b.y > a.y);
            prop_assert_eq!(a.z, b.z);
        }

        #[test]
        fn prop_zoom_only_moves_medial(
            depth in 0.1f32..50.0,
            disparity in 0.0f32..0.5,
            zoom in 0.001f32..0.5,
            bump in 0.01f32..0.5,
        ) {
            let size = ImageSize::new(1280, 720);
            let a = compute_offset(depth, size, 900.0, &params(disparity, zoom));
            let b = compute_offset(depth, size, 900.0, &params(disparity, zoom + bump));
            prop_assert!(b.z > a.z);
            prop_assert_eq!(a.x, b.x);
            prop_assert_eq!(a.y, b.y);
        }
    }
}
