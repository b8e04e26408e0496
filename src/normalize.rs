use std::hash::{Hash, Hasher};

use image::RgbImage;
use palette::{FromColor, Hsv, Srgb};

use crate::error::{PreviewError, Result};
use crate::settings::DisplaySettings;
use crate::tensor::ImageTensor;

/// Immutable display-ready bitmap: W x H x 3 RGB bytes plus a content hash.
///
/// Adjustments happen during normalization, never in place; sessions share
/// canonical images behind `Arc` and only ever read them.
#[derive(Debug, Clone)]
pub struct CanonicalImage {
    pixels: RgbImage,
    hash: u64,
}

impl CanonicalImage {
    pub fn from_image(pixels: RgbImage) -> Self {
        let hash = content_hash(&pixels);
        Self { pixels, hash }
    }

    pub fn from_rgb_bytes(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self> {
        let pixels = RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
            PreviewError::Shape(format!("byte length does not match {width}x{height}x3"))
        })?;
        Ok(Self::from_image(pixels))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Content hash used for smart-mode change detection and the
    /// duplicate-submission guard. Stable for the life of the image.
    pub fn content_hash(&self) -> u64 {
        self.hash
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

fn content_hash(img: &RgbImage) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    img.width().hash(&mut hasher);
    img.height().hash(&mut hasher);
    img.as_raw().hash(&mut hasher);
    hasher.finish()
}

/// Convert a tensor batch into canonical bitmaps, applying the
/// gain/gamma/saturation adjustment from `settings`.
pub fn normalize_batch(
    tensor: &ImageTensor,
    settings: &DisplaySettings,
) -> Result<Vec<CanonicalImage>> {
    let mut out = Vec::new();
    for frame in tensor.frames()? {
        let bytes = frame.to_rgb_bytes();
        let bytes = if settings.is_identity_adjustment() {
            // Skip the lossy HSV round-trip entirely when nothing changes.
            bytes
        } else {
            adjust_bytes(bytes, settings.gain, settings.gamma, settings.saturation)
        };
        out.push(CanonicalImage::from_rgb_bytes(
            frame.width,
            frame.height,
            bytes,
        )?);
    }
    Ok(out)
}

/// Fixed adjustment order: gain, then gamma as `v^(1/gamma)`, then
/// saturation scaling in HSV, then clip to byte range and round.
fn adjust_bytes(mut bytes: Vec<u8>, gain: f32, gamma: f32, saturation: f32) -> Vec<u8> {
    let inv_gamma = 1.0 / gamma;
    for px in bytes.chunks_exact_mut(3) {
        let mut rgb = [
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
        ];
        if gain != 1.0 {
            for v in &mut rgb {
                *v *= gain;
            }
        }
        if gamma != 1.0 {
            for v in &mut rgb {
                *v = v.max(0.0).powf(inv_gamma);
            }
        }
        for v in &mut rgb {
            *v = v.clamp(0.0, 1.0);
        }
        if saturation != 1.0 {
            let mut hsv = Hsv::from_color(Srgb::new(rgb[0], rgb[1], rgb[2]));
            hsv.saturation = (hsv.saturation * saturation).clamp(0.0, 1.0);
            let srgb: Srgb = Srgb::from_color(hsv);
            rgb = [srgb.red, srgb.green, srgb.blue];
        }
        px[0] = (rgb[0] * 255.0).round().clamp(0.0, 255.0) as u8;
        px[1] = (rgb[1] * 255.0).round().clamp(0.0, 255.0) as u8;
        px[2] = (rgb[2] * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorData;

    fn tensor_u8(w: usize, h: usize, bytes: Vec<u8>) -> ImageTensor {
        ImageTensor::new(vec![h, w, 3], TensorData::U8(bytes)).unwrap()
    }

    #[test]
    fn identity_adjustment_preserves_bytes_exactly() {
        let bytes: Vec<u8> = (0u8..=255).cycle().take(4 * 4 * 3).collect();
        let t = tensor_u8(4, 4, bytes.clone());
        let out = normalize_batch(&t, &DisplaySettings::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pixels().as_raw(), &bytes);
    }

    #[test]
    fn gain_scales_toward_white() {
        let t = tensor_u8(1, 1, vec![100, 100, 100]);
        let settings = DisplaySettings {
            gain: 2.0,
            ..DisplaySettings::default()
        };
        let out = normalize_batch(&t, &settings).unwrap();
        assert_eq!(out[0].pixels().as_raw(), &vec![200, 200, 200]);
    }

    #[test]
    fn gain_clips_at_white() {
        let t = tensor_u8(1, 1, vec![200, 200, 200]);
        let settings = DisplaySettings {
            gain: 4.0,
            ..DisplaySettings::default()
        };
        let out = normalize_batch(&t, &settings).unwrap();
        assert_eq!(out[0].pixels().as_raw(), &vec![255, 255, 255]);
    }

    #[test]
    fn zero_saturation_produces_gray() {
        let t = tensor_u8(1, 1, vec![255, 0, 0]);
        let settings = DisplaySettings {
            saturation: 0.0,
            ..DisplaySettings::default()
        };
        let out = normalize_batch(&t, &settings).unwrap();
        let px = out[0].pixels().as_raw();
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn equal_content_hashes_equal() {
        let a = CanonicalImage::from_rgb_bytes(2, 2, vec![9; 12]).unwrap();
        let b = CanonicalImage::from_rgb_bytes(2, 2, vec![9; 12]).unwrap();
        let c = CanonicalImage::from_rgb_bytes(2, 2, vec![8; 12]).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }
}
