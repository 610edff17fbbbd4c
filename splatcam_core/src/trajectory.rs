//! Trajectory generator: parametric eye paths inside the offset envelope.
//!
//! Every path is a closed-form curve sampled at `step_count` parameter
//! values and repeated `repeat_count` times. Positions are camera-local
//! (+x right, +y down, +z forward) and the rest pose sits at
//! `(0, 0, travel_distance)`.
//!
//! | path             | one pass                                   | repeats          |
//! |------------------|--------------------------------------------|------------------|
//! | `swipe`          | left to right, t in [0, 1]                 | back and forth   |
//! | `shake`          | horizontal sine, then vertical sine        | identical        |
//! | `rotate`         | ellipse in the image plane                 | identical        |
//! | `rotate_forward` | horizontal sine with a forward push        | identical        |
//! | `dolly`          | forward push and return                    | identical        |
//!
//! Periodic paths sample t in [0, 1) so consecutive passes join without a
//! duplicated frame.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::offset::OffsetBounds;

/// Supported camera paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
    Swipe,
    Shake,
    Rotate,
    #[default]
    RotateForward,
    Dolly,
}

impl PathType {
    /// Returns all path types.
    pub fn all() -> Vec<PathType> {
        vec![
            PathType::Swipe,
            PathType::Shake,
            PathType::Rotate,
            PathType::RotateForward,
            PathType::Dolly,
        ]
    }

    /// Returns the path name.
    pub fn name(&self) -> &'static str {
        match self {
            PathType::Swipe => "swipe",
            PathType::Shake => "shake",
            PathType::Rotate => "rotate",
            PathType::RotateForward => "rotate_forward",
            PathType::Dolly => "dolly",
        }
    }

    /// True when odd-numbered passes run in reverse.
    pub fn reverses_on_repeat(&self) -> bool {
        matches!(self, PathType::Swipe)
    }

    /// One pass of the curve.
    fn pass(&self, bounds: &OffsetBounds, distance: f32, steps: usize) -> Vec<Point3<f32>> {
        let forward = |t: f32| distance + bounds.z * (1.0 - (TAU * t).cos()) / 2.0;

        match self {
            PathType::Swipe => (0..steps)
                .map(|i| {
                    let t = if steps == 1 { 0.5 } else { i as f32 / (steps - 1) as f32 };
                    Point3::new(bounds.x * (2.0 * t - 1.0), 0.0, distance)
                })
                .collect(),
            PathType::Shake => {
                let horizontal = steps.div_ceil(2);
                let vertical = steps - horizontal;
                let across = (0..horizontal).map(|i| {
                    let t = i as f32 / horizontal as f32;
                    Point3::new(bounds.x * (TAU * t).sin(), 0.0, distance)
                });
                let down = (0..vertical).map(|i| {
                    let t = i as f32 / vertical as f32;
                    Point3::new(0.0, bounds.y * (TAU * t).sin(), distance)
                });
                across.chain(down).collect()
            }
            PathType::Rotate => periodic(steps)
                .map(|t| Point3::new(bounds.x * (TAU * t).sin(), bounds.y * (TAU * t).cos(), distance))
                .collect(),
            PathType::RotateForward => periodic(steps)
                .map(|t| Point3::new(bounds.x * (TAU * t).sin(), 0.0, forward(t)))
                .collect(),
            PathType::Dolly => periodic(steps)
                .map(|t| Point3::new(0.0, 0.0, forward(t)))
                .collect(),
        }
    }
}

fn periodic(steps: usize) -> impl Iterator<Item = f32> {
    (0..steps).map(move |i| i as f32 / steps as f32)
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PathType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathType::all()
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("Unknown path type: {}", s))
    }
}

/// User-tunable trajectory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryParams {
    pub path_type: PathType,

    /// Lateral excursion as a fraction of the image diagonal (default: 0.08)
    pub max_disparity_fraction: f32,

    /// Medial excursion as a fraction of the near depth (default: 0.15)
    pub max_zoom_fraction: f32,

    /// Forward offset of the rest pose in meters (default: 0.0)
    pub travel_distance_m: f32,

    /// Samples per pass (default: 60)
    pub step_count: usize,

    /// Number of passes (default: 1)
    pub repeat_count: usize,
}

impl Default for TrajectoryParams {
    fn default() -> Self {
        Self {
            path_type: PathType::RotateForward,
            max_disparity_fraction: 0.08,
            max_zoom_fraction: 0.15,
            travel_distance_m: 0.0,
            step_count: 60,
            repeat_count: 1,
        }
    }
}

impl TrajectoryParams {
    /// Parses parameters from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns a copy with non-finite or negative values replaced.
    ///
    /// Non-finite fractions fall back to the defaults, negative ones clamp
    /// to zero; a non-finite distance becomes zero.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let fraction = |v: f32, default: f32| {
            if !v.is_finite() {
                default
            } else {
                v.max(0.0)
            }
        };
        Self {
            path_type: self.path_type,
            max_disparity_fraction: fraction(self.max_disparity_fraction, defaults.max_disparity_fraction),
            max_zoom_fraction: fraction(self.max_zoom_fraction, defaults.max_zoom_fraction),
            travel_distance_m: finite_or_zero(self.travel_distance_m),
            step_count: self.step_count,
            repeat_count: self.repeat_count,
        }
    }

    /// Generates the eye path for these parameters.
    pub fn generate(&self, bounds: &OffsetBounds) -> CameraPositionSequence {
        generate(
            self.path_type,
            bounds,
            self.travel_distance_m,
            self.step_count,
            self.repeat_count,
        )
    }
}

/// Immutable, shareable eye path.
///
/// Cloning is cheap; a new path always replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPositionSequence {
    positions: Arc<[Point3<f32>]>,
}

impl CameraPositionSequence {
    pub fn new(positions: Vec<Point3<f32>>) -> Self {
        Self {
            positions: positions.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Point3<f32>> {
        self.positions.get(index).copied()
    }

    pub fn as_slice(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point3<f32>> {
        self.positions.iter()
    }
}

impl Default for CameraPositionSequence {
    fn default() -> Self {
        Self::empty()
    }
}

/// Longest path [`generate`] will produce.
pub const MAX_PATH_FRAMES: usize = 1 << 20;

/// Expands a path type into `step_count * repeat_count` eye positions.
///
/// Pure: identical inputs give bit-identical output. Zero counts, or a
/// product above [`MAX_PATH_FRAMES`], give an empty sequence.
pub fn generate(
    path_type: PathType,
    bounds: &OffsetBounds,
    travel_distance: f32,
    step_count: usize,
    repeat_count: usize,
) -> CameraPositionSequence {
    if step_count < 1 || repeat_count < 1 {
        return CameraPositionSequence::empty();
    }
    match step_count.checked_mul(repeat_count) {
        Some(total) if total <= MAX_PATH_FRAMES => {}
        _ => {
            warn!(
                "{} steps x {} repeats exceeds {} frames, generating nothing",
                step_count, repeat_count, MAX_PATH_FRAMES
            );
            return CameraPositionSequence::empty();
        }
    }

    let bounds = OffsetBounds::new(bounds.x, bounds.y, bounds.z);
    let pass = path_type.pass(&bounds, finite_or_zero(travel_distance), step_count);

    let mut positions = Vec::with_capacity(step_count * repeat_count);
    for repeat in 0..repeat_count {
        if path_type.reverses_on_repeat() && repeat % 2 == 1 {
            positions.extend(pass.iter().rev());
        } else {
            positions.extend_from_slice(&pass);
        }
    }

    CameraPositionSequence::new(positions)
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
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

    fn bounds() -> OffsetBounds {
        OffsetBounds::new(0.2, 0.1, 0.3)
    }

    #[test]
    fn test_zero_counts_are_empty() {
        for path in PathType::all() {
            assert!(generate(path, &bounds(), 0.0, 0, 3).is_empty());
            assert!(generate(path, &bounds(), 0.0, 10, 0).is_empty());
        }
    }

    #[test]
    fn test_oversized_counts_are_empty() {
        assert!(generate(PathType::Swipe, &OffsetBounds::new(1.0, 1.0, 1.0), 0.0, 2, usize::MAX).is_empty());
        assert!(generate(PathType::Dolly, &bounds(), 0.0, usize::MAX, usize::MAX).is_empty());
        assert!(generate(PathType::Rotate, &bounds(), 0.0, MAX_PATH_FRAMES + 1, 1).is_empty());
        assert_eq!(generate(PathType::Rotate, &bounds(), 0.0, MAX_PATH_FRAMES / 2, 2).len(), MAX_PATH_FRAMES);
    }

    #[test]
    fn test_length_is_steps_times_repeats() {
        for path in PathType::all() {
            assert_eq!(generate(path, &bounds(), 0.0, 7, 3).len(), 21);
        }
    }

    #[test]
    fn test_swipe_spans_bounds_and_reverses() {
        let seq = generate(PathType::Swipe, &bounds(), 0.5, 5, 2);

        assert_relative_eq!(seq.get(0).unwrap().x, -0.2);
        assert_relative_eq!(seq.get(2).unwrap().x, 0.0);
        assert_relative_eq!(seq.get(4).unwrap().x, 0.2);
        // Second pass runs right to left
        assert_relative_eq!(seq.get(5).unwrap().x, 0.2);
        assert_relative_eq!(seq.get(9).unwrap().x, -0.2);
        assert!(seq.iter().all(|p| p.y == 0.0 && p.z == 0.5));
    }

    #[test]
    fn test_single_step_swipe_is_centered() {
        let seq = generate(PathType::Swipe, &bounds(), 0.0, 1, 1);
        assert_eq!(seq.get(0), Some(Point3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn test_periodic_paths_repeat_identically() {
        for path in [PathType::Shake, PathType::Rotate, PathType::RotateForward, PathType::Dolly] {
            let seq = generate(path, &bounds(), 0.0, 8, 3);
            let slice = seq.as_slice();
            assert_eq!(&slice[0..8], &slice[8..16], "{} second pass differs", path);
            assert_eq!(&slice[0..8], &slice[16..24], "{} third pass differs", path);
        }
    }

    #[test]
    fn test_paths_stay_inside_envelope() {
        let b = bounds();
        for path in PathType::all() {
            for p in generate(path, &b, 1.0, 33, 2).iter() {
                assert!(p.x.abs() <= b.x + 1e-6, "{} x out of range", path);
                assert!(p.y.abs() <= b.y + 1e-6, "{} y out of range", path);
                assert!(p.z >= 1.0 - 1e-6 && p.z <= 1.0 + b.z + 1e-6, "{} z out of range", path);
            }
        }
    }

    #[test]
    fn test_rotate_forward_peaks_at_half_pass() {
        let seq = generate(PathType::RotateForward, &bounds(), 0.0, 4, 1);

        assert_relative_eq!(seq.get(0).unwrap().z, 0.0);
        assert_relative_eq!(seq.get(1).unwrap().x, 0.2, epsilon = 1e-6);
        assert_relative_eq!(seq.get(2).unwrap().z, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_shake_splits_horizontal_then_vertical() {
        let seq = generate(PathType::Shake, &bounds(), 0.0, 9, 1);

        assert!(seq.as_slice()[..5].iter().all(|p| p.y == 0.0));
        assert!(seq.as_slice()[5..].iter().all(|p| p.x == 0.0));
    }

    #[test]
    fn test_invalid_inputs_are_neutralized() {
        let seq = generate(PathType::Rotate, &OffsetBounds { x: f32::NAN, y: -1.0, z: 0.0 }, f32::INFINITY, 6, 1);
        assert!(seq.iter().all(|p| *p == Point3::origin()));
    }

    #[test]
    fn test_path_type_names_round_trip() {
        for path in PathType::all() {
            assert_eq!(path.name().parse::<PathType>(), Ok(path));
        }
        assert!("orbit".parse::<PathType>().is_err());
    }

    #[test]
    fn test_params_json_defaults_missing_fields() {
        let params = TrajectoryParams::from_json(r#"{"path_type": "swipe", "step_count": 12}"#).unwrap();

        assert_eq!(params.path_type, PathType::Swipe);
        assert_eq!(params.step_count, 12);
        assert_eq!(params.repeat_count, 1);
        assert_relative_eq!(params.max_disparity_fraction, 0.08);
    }

    #[test]
    fn test_sanitized_params() {
        let params = TrajectoryParams {
            max_disparity_fraction: f32::NAN,
            max_zoom_fraction: -0.5,
            travel_distance_m: f32::NEG_INFINITY,
            ..TrajectoryParams::default()
        }
        .sanitized();

        assert_relative_eq!(params.max_disparity_fraction, 0.08);
        assert_eq!(params.max_zoom_fraction, 0.0);
        assert_eq!(params.travel_distance_m, 0.0);
    }

    fn path_strategy() -> impl Strategy<Value = PathType> {
        prop_oneof![
            Just(PathType::Swipe),
            Just(PathType::Shake),
            Just(PathType::Rotate),
            Just(PathType::RotateForward),
            Just(PathType::Dolly),
        ]
    }

    proptest! {
        #[test]
        fn prop_generation_is_deterministic(
            path in path_strategy(),
            x in 0.0f32..2.0,
            y in 0.0f32..2.0,
            z in 0.0f32..2.0,
            distance in -1.0f32..1.0,
            steps in 0usize..120,
            repeats in 0usize..4,
        ) {
            let b = OffsetBounds::new(x, y, z);
            let first = generate(path, &b, distance, steps, repeats);
            let second = generate(path, &b, distance, steps, repeats);

            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(a.x.to_bits(), b.x.to_bits());
                prop_assert_eq!(a.y.to_bits(), b.y.to_bits());
                prop_assert_eq!(a.z.to_bits(), b.z.to_bits());
            }
        }
    }
}
