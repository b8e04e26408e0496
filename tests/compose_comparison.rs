use image::{Rgb, RgbImage};
use preview_monitor::compose::{compose, compose_single, ComposeParams};
use preview_monitor::settings::FitMode;
use preview_monitor::CanonicalImage;

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> CanonicalImage {
    CanonicalImage::from_image(RgbImage::from_pixel(w, h, Rgb(rgb)))
}

fn params_1024x768_fit() -> ComposeParams {
    ComposeParams {
        canvas_w: 1024,
        canvas_h: 768,
        fit_mode: FitMode::Fit,
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
        white_matte: false,
    }
}

// A 512x512 source on a 1024x768 canvas under `fit` scales by 1.5 to
// 768x768, centered: columns 128..896 carry image content, the rest matte.
const CONTENT_LEFT: u32 = 128;
const CONTENT_RIGHT: u32 = 896;

#[test]
fn comparison_halves_come_from_their_own_source() {
    let a = solid(512, 512, [255, 0, 0]);
    let b = solid(512, 512, [0, 0, 255]);
    let p = params_1024x768_fit();
    let split = 512u32;

    let out = compose(&a, Some(&b), Some(split), &p);
    assert_eq!(out.dimensions(), (1024, 768));

    for y in [0, 100, 384, 700, 767] {
        for x in 0..1024u32 {
            let px = out.get_pixel(x, y).0;
            // Skip the 2-px split line itself.
            if x == split - 1 || x == split {
                continue;
            }
            let is_matte = px == [0, 0, 0];
            if x < split {
                assert!(
                    is_matte || (px[0] >= 200 && px[2] <= 50),
                    "left half at ({x},{y}) shows non-primary content: {px:?}"
                );
            } else {
                assert!(
                    is_matte || (px[2] >= 200 && px[0] <= 50),
                    "right half at ({x},{y}) shows non-secondary content: {px:?}"
                );
            }
        }
    }
}

#[test]
fn comparison_split_line_is_two_contrasting_columns() {
    let a = solid(512, 512, [255, 0, 0]);
    let b = solid(512, 512, [0, 0, 255]);
    let p = params_1024x768_fit();

    let out = compose(&a, Some(&b), Some(512), &p);
    for y in 0..768 {
        assert_eq!(out.get_pixel(511, y).0, [255, 255, 0]);
        assert_eq!(out.get_pixel(512, y).0, [255, 255, 0]);
    }

    let white = ComposeParams {
        white_matte: true,
        ..p
    };
    let out = compose(&a, Some(&b), Some(512), &white);
    assert_eq!(out.get_pixel(511, 384).0, [0, 0, 0]);
    assert_eq!(out.get_pixel(512, 384).0, [0, 0, 0]);
}

#[test]
fn comparison_without_split_defaults_to_canvas_center() {
    let a = solid(512, 512, [255, 0, 0]);
    let b = solid(512, 512, [0, 0, 255]);
    let p = params_1024x768_fit();

    let defaulted = compose(&a, Some(&b), None, &p);
    let centered = compose(&a, Some(&b), Some(512), &p);
    assert_eq!(defaulted.as_raw(), centered.as_raw());
}

#[test]
fn letterbox_margins_stay_matte_on_both_sides_of_the_split() {
    let a = solid(512, 512, [255, 0, 0]);
    let b = solid(512, 512, [0, 0, 255]);
    let p = params_1024x768_fit();

    let out = compose(&a, Some(&b), Some(512), &p);
    for y in [0, 384, 767] {
        for x in [0, CONTENT_LEFT - 1, CONTENT_RIGHT, 1023] {
            assert_eq!(
                out.get_pixel(x, y).0,
                [0, 0, 0],
                "expected matte at ({x},{y})"
            );
        }
    }
    // And the content band is actually populated.
    assert_eq!(out.get_pixel(CONTENT_LEFT, 384).0, [255, 0, 0]);
    assert_eq!(out.get_pixel(CONTENT_RIGHT - 1, 384).0, [0, 0, 255]);
}

#[test]
fn both_halves_share_zoom_and_pan() {
    let a = solid(512, 512, [255, 0, 0]);
    let b = solid(512, 512, [0, 0, 255]);
    let p = ComposeParams {
        zoom: 0.5,
        pan_x: -40.0,
        pan_y: 10.0,
        ..params_1024x768_fit()
    };

    let out = compose(&a, Some(&b), Some(512), &p);
    let left = compose_single(&a, &p);
    let right = compose_single(&b, &p);
    for y in (0..768).step_by(96) {
        for x in (0..1024u32).step_by(64) {
            if x == 511 || x == 512 {
                continue;
            }
            let expect = if x < 512 {
                left.get_pixel(x, y)
            } else {
                right.get_pixel(x, y)
            };
            assert_eq!(out.get_pixel(x, y), expect, "mismatch at ({x},{y})");
        }
    }
}
