//! FrameCodec - Image Decode and Letterbox Geometry
//!
//! ## Responsibilities
//!
//! - Decode transport-encoded still images (base64, optional data-URI prefix)
//! - Letterbox resize/pad to the model's fixed input geometry
//! - Invert model-space boxes back to normalized original-image coordinates
//!
//! Stateless and deterministic: identical inputs always produce bit-identical
//! scale/offset values.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{imageops, DynamicImage, Rgb, RgbImage};

/// Neutral gray used to fill the letterbox canvas (YOLO convention)
pub const PAD_COLOR: u8 = 114;

/// Forward letterbox parameters, required to invert boxes to original space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub pad_left: u32,
    pub pad_top: u32,
}

/// Decode a transport payload into a raw image.
///
/// Accepts either a bare base64 string or a `data:image/...;base64,` URI.
pub fn decode_frame(payload: &str) -> Result<DynamicImage> {
    let encoded = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| Error::Decode(format!("invalid base64 payload: {e}")))?;
    image::load_from_memory(&bytes).map_err(|e| Error::Decode(format!("invalid image: {e}")))
}

/// Aspect-preserving resize centered on a fixed-size padded canvas.
pub fn letterbox(image: &DynamicImage, target_w: u32, target_h: u32) -> (RgbImage, LetterboxTransform) {
    let (w, h) = (image.width(), image.height());
    let scale = f32::min(target_w as f32 / w as f32, target_h as f32 / h as f32);
    let new_w = ((w as f32 * scale) as u32).max(1);
    let new_h = ((h as f32 * scale) as u32).max(1);

    let resized = image
        .resize_exact(new_w, new_h, imageops::FilterType::Triangle)
        .to_rgb8();

    let pad_left = (target_w - new_w) / 2;
    let pad_top = (target_h - new_h) / 2;

    let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb([PAD_COLOR; 3]));
    imageops::replace(&mut canvas, &resized, pad_left as i64, pad_top as i64);

    (
        canvas,
        LetterboxTransform {
            scale,
            pad_left,
            pad_top,
        },
    )
}

/// Map a model-space corner box back to normalized original-image space.
///
/// Exact algebraic inverse of [`letterbox`]: subtract pads, divide by scale,
/// clamp to the original bounds, normalize to [0, 1]. The returned box always
/// satisfies `0 <= xmin <= xmax <= 1` and `0 <= ymin <= ymax <= 1`, even for
/// out-of-range model outputs.
pub fn unletterbox(
    bbox: [f32; 4],
    transform: &LetterboxTransform,
    orig_w: u32,
    orig_h: u32,
) -> [f32; 4] {
    let (ow, oh) = (orig_w as f32, orig_h as f32);
    let invert_x = |x: f32| ((x - transform.pad_left as f32) / transform.scale).clamp(0.0, ow) / ow;
    let invert_y = |y: f32| ((y - transform.pad_top as f32) / transform.scale).clamp(0.0, oh) / oh;

    let x1 = invert_x(bbox[0]);
    let y1 = invert_y(bbox[1]);
    let x2 = invert_x(bbox[2]);
    let y2 = invert_y(bbox[3]);

    [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)]
}
