//! Synthetic splat scenes.
//!
//! Produces binary little-endian PLY files shaped like the conversion
//! backend's output: 3DGS vertex records followed by the `extrinsic`,
//! `intrinsic`, `image_size` and `color_space` elements. Splats are placed
//! by back-projecting random pixels to a normally distributed depth, so the
//! whole cloud sits inside the camera frustum.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use splatcam_core::{ColorSpace, ImageSize, PlyWriter, ScalarType};

const VERTEX_PROPERTIES: [&str; 14] = [
    "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

/// Recipe for a synthetic scene.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// Seed for all randomness
    pub seed: u64,

    pub splat_count: usize,

    pub image_size: ImageSize,

    /// Focal length written to the intrinsic element
    pub focal_length_px: f32,

    /// Mean splat depth in meters
    pub depth_mean: f32,

    /// Depth standard deviation in meters
    pub depth_std: f32,

    pub color_space: ColorSpace,

    /// Skip the metadata elements entirely
    pub with_metadata: bool,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            seed: 42,
            splat_count: 5_000,
            image_size: ImageSize::new(640, 480),
            focal_length_px: 500.0,
            depth_mean: 4.0,
            depth_std: 1.5,
            color_space: ColorSpace::Perceptual,
            with_metadata: true,
        }
    }
}

impl SyntheticScene {
    /// Creates a recipe with the given seed and default everything else.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn with_splats(mut self, splat_count: usize) -> Self {
        self.splat_count = splat_count;
        self
    }

    /// Serializes the scene to PLY bytes.
    pub fn to_ply_bytes(&self) -> Vec<u8> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mean = if self.depth_mean.is_finite() { self.depth_mean } else { 4.0 };
        let std = if self.depth_std.is_finite() { self.depth_std.abs() } else { 1.0 };

        let properties: Vec<(ScalarType, &str)> = VERTEX_PROPERTIES
            .iter()
            .map(|name| (ScalarType::Float32, *name))
            .collect();

        let mut writer = PlyWriter::new();
        writer
            .comment(&format!("synthetic splat scene seed={}", self.seed))
            .element("vertex", self.splat_count, &properties);
        if self.with_metadata {
            writer
                .element("extrinsic", 16, &[(ScalarType::Float32, "extrinsic")])
                .element("intrinsic", 9, &[(ScalarType::Float32, "intrinsic")])
                .element("image_size", 2, &[(ScalarType::UInt32, "image_size")])
                .element("color_space", 1, &[(ScalarType::UInt8, "color_space")]);
        }

        let (w, h) = (self.image_size.width as f32, self.image_size.height as f32);
        let (cx, cy) = (w / 2.0, h / 2.0);
        let f = self.focal_length_px;

        for _ in 0..self.splat_count {
            // Keep depths positive; a handful of near-zero splats is realistic
            let n: f32 = StandardNormal.sample(&mut rng);
            let z = (mean + std * n).max(0.05);
            let u: f32 = rng.gen_range(0.0..w);
            let v: f32 = rng.gen_range(0.0..h);
            writer
                .push_f32((u - cx) / f * z)
                .push_f32((v - cy) / f * z)
                .push_f32(z);
            for _ in 0..3 {
                writer.push_f32(rng.gen_range(-1.5..1.5));
            }
            writer.push_f32(rng.gen_range(-2.0..4.0));
            for _ in 0..3 {
                writer.push_f32(rng.gen_range(-6.0..-3.0));
            }
            writer.push_f32(1.0).push_f32(0.0).push_f32(0.0).push_f32(0.0);
        }

        if self.with_metadata {
            for i in 0..16 {
                writer.push_f32(if i % 5 == 0 { 1.0 } else { 0.0 });
            }
            for value in [f, 0.0, cx, 0.0, f, cy, 0.0, 0.0, 1.0] {
                writer.push_f32(value);
            }
            writer
                .push_u32(self.image_size.width)
                .push_u32(self.image_size.height)
                .push_u8(match self.color_space {
                    ColorSpace::Linear => 0,
                    ColorSpace::Perceptual => 1,
                });
        }

        writer.finish()
    }
}
