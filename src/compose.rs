use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::normalize::CanonicalImage;
use crate::settings::FitMode;

/// Everything the compositor needs to place one frame on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeParams {
    pub canvas_w: u32,
    pub canvas_h: u32,
    pub fit_mode: FitMode,
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    pub white_matte: bool,
}

impl ComposeParams {
    fn matte(&self) -> Rgb<u8> {
        if self.white_matte {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }

    fn split_line(&self) -> Rgb<u8> {
        // Contrasting line: yellow on black matte, black on white matte.
        if self.white_matte {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 0])
        }
    }
}

/// Scaled dimensions after applying the fit mode and then the zoom factor.
pub fn scaled_size(img_w: u32, img_h: u32, params: &ComposeParams) -> (u32, u32) {
    let iw = img_w.max(1) as f32;
    let ih = img_h.max(1) as f32;
    let cw = params.canvas_w.max(1) as f32;
    let ch = params.canvas_h.max(1) as f32;

    let (base_w, base_h) = match params.fit_mode {
        FitMode::None | FitMode::Center => (iw, ih),
        FitMode::Width => (cw, ih * (cw / iw)),
        FitMode::Height => (iw * (ch / ih), ch),
        FitMode::Fit => {
            let scale = (cw / iw).min(ch / ih);
            (iw * scale, ih * scale)
        }
        FitMode::Fill => {
            let scale = (cw / iw).max(ch / ih);
            (iw * scale, ih * scale)
        }
        FitMode::Distort => (cw, ch),
    };

    let w = (base_w * params.zoom).round().max(1.0);
    let h = (base_h * params.zoom).round().max(1.0);
    (w as u32, h as u32)
}

/// Place one image on a matte canvas: fit-mode scale, zoom, center, pan.
/// Content outside the canvas is cropped; it never wraps and never fails.
pub fn compose_single(img: &CanonicalImage, params: &ComposeParams) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(
        params.canvas_w.max(1),
        params.canvas_h.max(1),
        params.matte(),
    );

    let (sw, sh) = scaled_size(img.width(), img.height(), params);
    let scaled;
    let scaled_ref = if (sw, sh) == (img.width(), img.height()) {
        img.pixels()
    } else {
        scaled = imageops::resize(img.pixels(), sw, sh, FilterType::Lanczos3);
        &scaled
    };

    let x = (canvas.width() as i64 - sw as i64) / 2 + params.pan_x.round() as i64;
    let y = (canvas.height() as i64 - sh as i64) / 2 + params.pan_y.round() as i64;
    imageops::overlay(&mut canvas, scaled_ref, x, y);
    canvas
}

/// Compose primary and optional secondary onto one canvas.
///
/// With a secondary image and a split coordinate, both are composed with
/// identical parameters and joined at `split_x`: primary columns to the
/// left, secondary columns from `split_x` on, with a 2-px contrasting line
/// drawn when the split sits strictly inside the canvas. Without a
/// secondary the result is the plain single composition; the caller is
/// responsible for reporting that degraded condition.
pub fn compose(
    primary: &CanonicalImage,
    secondary: Option<&CanonicalImage>,
    split_x: Option<u32>,
    params: &ComposeParams,
) -> RgbImage {
    let Some(secondary) = secondary else {
        return compose_single(primary, params);
    };

    let canvas_w = params.canvas_w.max(1);
    let split = split_x.unwrap_or(canvas_w / 2).min(canvas_w);

    let mut left = compose_single(primary, params);
    let right = compose_single(secondary, params);

    let row_bytes = canvas_w as usize * 3;
    let split_byte = split as usize * 3;
    {
        let dst_raw: &mut [u8] = &mut left;
        for (dst, src) in dst_raw
            .chunks_exact_mut(row_bytes)
            .zip(right.as_raw().chunks_exact(row_bytes))
        {
            dst[split_byte..].copy_from_slice(&src[split_byte..]);
        }
    }

    if split > 0 && split < canvas_w {
        let line = params.split_line();
        for y in 0..left.height() {
            left.put_pixel(split - 1, y, line);
            left.put_pixel(split, y, line);
        }
    }
    left
}

/// Pack RGB pixels into the 0RGB u32 layout the framebuffer expects.
pub fn to_argb_buffer(img: &RgbImage) -> Vec<u32> {
    img.as_raw()
        .chunks_exact(3)
        .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(w: u32, h: u32, fit: FitMode) -> ComposeParams {
        ComposeParams {
            canvas_w: w,
            canvas_h: h,
            fit_mode: fit,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            white_matte: false,
        }
    }

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> CanonicalImage {
        CanonicalImage::from_image(RgbImage::from_pixel(w, h, Rgb(rgb)))
    }

    #[test]
    fn fit_never_exceeds_canvas() {
        let p = params(1024, 768, FitMode::Fit);
        let (w, h) = scaled_size(512, 2048, &p);
        assert!(w <= 1024 && h <= 768);
        let (w, h) = scaled_size(4096, 64, &p);
        assert!(w <= 1024 && h <= 768);
    }

    #[test]
    fn fill_covers_canvas() {
        let p = params(1024, 768, FitMode::Fill);
        let (w, h) = scaled_size(512, 2048, &p);
        assert!(w >= 1024 && h >= 768);
    }

    #[test]
    fn aspect_preserved_for_non_distort_modes() {
        for fit in [
            FitMode::Width,
            FitMode::Height,
            FitMode::Fit,
            FitMode::Fill,
        ] {
            let p = params(1000, 500, fit);
            let (w, h) = scaled_size(640, 480, &p);
            let src_ar = 640.0 / 480.0;
            let out_ar = w as f32 / h as f32;
            assert!(
                (src_ar - out_ar).abs() < 0.02,
                "{fit:?}: aspect {out_ar} vs {src_ar}"
            );
        }
    }

    #[test]
    fn distort_matches_canvas_exactly() {
        let p = params(800, 600, FitMode::Distort);
        assert_eq!(scaled_size(123, 456, &p), (800, 600));
    }

    #[test]
    fn zoom_scales_after_fit() {
        let mut p = params(100, 100, FitMode::Fit);
        p.zoom = 2.0;
        assert_eq!(scaled_size(50, 50, &p), (200, 200));
    }

    #[test]
    fn pan_crops_instead_of_wrapping() {
        let mut p = params(10, 10, FitMode::None);
        p.pan_x = 8.0;
        let img = solid(4, 4, [200, 10, 10]);
        let out = compose_single(&img, &p);
        // Image pushed toward the right edge; left edge is matte.
        assert_eq!(out.get_pixel(0, 5).0, [0, 0, 0]);
        assert_eq!(out.get_pixel(9, 5).0, [200, 10, 10]);
    }

    #[test]
    fn split_at_zero_equals_secondary_composite() {
        let p = params(64, 48, FitMode::Fit);
        let a = solid(32, 32, [255, 0, 0]);
        let b = solid(32, 32, [0, 0, 255]);
        let split0 = compose(&a, Some(&b), Some(0), &p);
        let only_b = compose_single(&b, &p);
        assert_eq!(split0.as_raw(), only_b.as_raw());
    }

    #[test]
    fn split_at_canvas_width_equals_primary_composite() {
        let p = params(64, 48, FitMode::Fit);
        let a = solid(32, 32, [255, 0, 0]);
        let b = solid(32, 32, [0, 0, 255]);
        let split_full = compose(&a, Some(&b), Some(64), &p);
        let only_a = compose_single(&a, &p);
        assert_eq!(split_full.as_raw(), only_a.as_raw());
    }

    #[test]
    fn missing_secondary_falls_back_to_single() {
        let p = params(64, 48, FitMode::Fit);
        let a = solid(32, 32, [255, 0, 0]);
        let out = compose(&a, None, Some(32), &p);
        assert_eq!(out.as_raw(), compose_single(&a, &p).as_raw());
    }

    #[test]
    fn argb_packing_matches_channel_order() {
        let img = RgbImage::from_pixel(1, 1, Rgb([0x12, 0x34, 0x56]));
        assert_eq!(to_argb_buffer(&img), vec![0x0012_3456]);
    }
}
