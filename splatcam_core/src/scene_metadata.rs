//! Scene metadata carried in supplementary PLY elements.
//!
//! Splat files written by the conversion backend append small elements
//! after the splats themselves:
//!
//! | element       | values | meaning                                        |
//! |---------------|--------|------------------------------------------------|
//! | `image_size`  | 2      | width, height in pixels                        |
//! | `intrinsic`   | 9 / 4  | row-major 3x3, or legacy fx, fy, width, height |
//! | `extrinsic`   | 16 / 12| row-major 4x4, or legacy row-major 3x4         |
//! | `color_space` | 1      | 0 = linear, anything else = sRGB               |
//!
//! Values are counted across records, so `element intrinsic 9` with one
//! float property and `element intrinsic 1` with nine float properties
//! decode the same way.

use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CodecError;
use crate::offset::estimate_focal_length_px;
use crate::ply::PlyLayout;

/// Image size assumed when the file does not declare one.
pub const DEFAULT_IMAGE_SIZE: ImageSize = ImageSize {
    width: 640,
    height: 480,
};

/// Source image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        DEFAULT_IMAGE_SIZE
    }
}

/// Color encoding of the splat colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    Linear,
    /// sRGB
    #[default]
    Perceptual,
}

/// Camera and image metadata for one loaded scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    /// Camera-to-world pose
    pub extrinsics: Matrix4<f32>,

    /// Pinhole intrinsics (fx, fy, cx, cy)
    pub intrinsics: Matrix3<f32>,

    pub image_size: ImageSize,

    /// Horizontal focal length in pixels, 0 when not declared
    pub focal_length_px: f32,

    pub color_space: ColorSpace,

    /// True when at least one metadata element was decoded
    pub present: bool,
}

impl Default for SceneMetadata {
    fn default() -> Self {
        Self {
            extrinsics: Matrix4::identity(),
            intrinsics: Matrix3::identity(),
            image_size: DEFAULT_IMAGE_SIZE,
            focal_length_px: 0.0,
            color_space: ColorSpace::default(),
            present: false,
        }
    }
}

impl SceneMetadata {
    /// Declared focal length, or an estimate from the image height.
    pub fn effective_focal_length_px(&self) -> f32 {
        if self.focal_length_px.is_finite() && self.focal_length_px > 0.0 {
            self.focal_length_px
        } else {
            estimate_focal_length_px(self.image_size.height)
        }
    }

    /// Intrinsics as 9 floats in column-major order.
    pub fn intrinsics_column_major(&self) -> [f32; 9] {
        let mut out = [0.0; 9];
        for col in 0..3 {
            for row in 0..3 {
                out[col * 3 + row] = self.intrinsics[(row, col)];
            }
        }
        out
    }

    /// Extrinsics as 16 floats in column-major order.
    pub fn extrinsics_column_major(&self) -> [f32; 16] {
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = self.extrinsics[(row, col)];
            }
        }
        out
    }
}

/// Decodes scene metadata, falling back to [`SceneMetadata::default`] on any error.
///
/// Never fails: unsupported body formats are logged at debug level,
/// malformed or truncated input at warn level.
pub fn decode_metadata(bytes: &[u8]) -> SceneMetadata {
    match try_decode_metadata(bytes) {
        Ok(metadata) => metadata,
        Err(e) if e.is_unsupported() => {
            debug!("scene metadata skipped: {}", e);
            SceneMetadata::default()
        }
        Err(e) => {
            warn!("scene metadata could not be decoded: {}", e);
            SceneMetadata::default()
        }
    }
}

/// Decodes scene metadata, reporting why it could not be read.
pub fn try_decode_metadata(bytes: &[u8]) -> Result<SceneMetadata, CodecError> {
    let layout = PlyLayout::parse(bytes)?;
    layout.require_little_endian()?;

    let mut metadata = SceneMetadata::default();
    let mut declared_size: Option<ImageSize> = None;
    let mut legacy_size: Option<ImageSize> = None;

    if let Some(values) = element_values(&layout, bytes, "image_size")? {
        match image_size_from(&values) {
            Some(size) => {
                declared_size = Some(size);
                metadata.present = true;
            }
            None => warn!("ignoring image_size element with values {:?}", values),
        }
    }

    if let Some(values) = element_values(&layout, bytes, "intrinsic")? {
        match values.len() {
            9 => {
                let row_major: Vec<f32> = values.iter().map(|&v| v as f32).collect();
                metadata.intrinsics = Matrix3::from_row_slice(&row_major);
                metadata.focal_length_px = sanitize_focal(row_major[0]);
                metadata.present = true;
            }
            4 => {
                let (fx, fy) = (values[0] as f32, values[1] as f32);
                let (width, height) = (values[2] as f32, values[3] as f32);
                metadata.intrinsics = Matrix3::new(
                    fx, 0.0, width / 2.0,
                    0.0, fy, height / 2.0,
                    0.0, 0.0, 1.0,
                );
                metadata.focal_length_px = sanitize_focal(fx);
                legacy_size = image_size_from(&values[2..]);
                metadata.present = true;
            }
            n => warn!("ignoring intrinsic element with {} values", n),
        }
    }

    if let Some(values) = element_values(&layout, bytes, "extrinsic")? {
        let row_major: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        match row_major.len() {
            16 => {
                metadata.extrinsics = Matrix4::from_row_slice(&row_major);
                metadata.present = true;
            }
            12 => {
                let mut augmented = row_major;
                augmented.extend_from_slice(&[0.0, 0.0, 0.0, 1.0]);
                metadata.extrinsics = Matrix4::from_row_slice(&augmented);
                metadata.present = true;
            }
            n => warn!("ignoring extrinsic element with {} values", n),
        }
    }

    if let Some(values) = element_values(&layout, bytes, "color_space")? {
        match values.first() {
            Some(&flag) => {
                metadata.color_space = if flag == 0.0 {
                    ColorSpace::Linear
                } else {
                    ColorSpace::Perceptual
                };
                metadata.present = true;
            }
            None => warn!("ignoring empty color_space element"),
        }
    }

    if let Some(size) = declared_size.or(legacy_size) {
        metadata.image_size = size;
    }

    if metadata.present {
        debug!(
            "decoded scene metadata: {}x{} focal={:.1}px color={:?}",
            metadata.image_size.width,
            metadata.image_size.height,
            metadata.focal_length_px,
            metadata.color_space
        );
    }

    Ok(metadata)
}

fn element_values(layout: &PlyLayout, bytes: &[u8], name: &str) -> Result<Option<Vec<f64>>, CodecError> {
    match layout.element(name) {
        Some(element) => layout.read_scalars(bytes, element).map(Some),
        None => Ok(None),
    }
}

fn image_size_from(values: &[f64]) -> Option<ImageSize> {
    let [width, height] = values.get(..2)? else {
        return None;
    };
    let valid = |v: f64| v.is_finite() && v >= 1.0 && v <= u32::MAX as f64;
    if valid(*width) && valid(*height) {
        Some(ImageSize::new(*width as u32, *height as u32))
    } else {
        None
    }
}

fn sanitize_focal(fx: f32) -> f32 {
    if fx.is_finite() && fx > 0.0 {
        fx
    } else {
        0.0
    }
}
