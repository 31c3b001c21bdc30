//! Preview rendering
//!
//! Shows a matting result the way a viewer would: transparent regions over
//! a grey/white checkerboard, optionally next to the original photo.

use crate::{error::Result, types::Bitmap};
use image::{imageops, Rgba, RgbaImage};

/// Edge length of one checkerboard square in pixels
pub const CHECKER_SIZE: u32 = 10;

/// Light checkerboard colour
pub const CHECKER_LIGHT: [u8; 3] = [0xff, 0xff, 0xff];

/// Dark checkerboard colour
pub const CHECKER_DARK: [u8; 3] = [0xcc, 0xcc, 0xcc];

/// Horizontal gap between the two panels of a side-by-side preview
pub const PANEL_GAP: u32 = 16;

/// Checkerboard colour at (`x`, `y`)
#[must_use]
pub fn checker_color(x: u32, y: u32) -> [u8; 3] {
    if ((x / CHECKER_SIZE) + (y / CHECKER_SIZE)) % 2 == 0 {
        CHECKER_LIGHT
    } else {
        CHECKER_DARK
    }
}

/// Opaque checkerboard of the given size
#[must_use]
pub fn checkerboard(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = checker_color(x, y);
        Rgba([r, g, b, u8::MAX])
    })
}

/// Source-over blend of one 8-bit channel, rounded
#[inline]
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    ((u32::from(fg) * a + u32::from(bg) * (255 - a) + 127) / 255) as u8
}

/// Flatten a matting result onto the checkerboard backdrop
///
/// The output is fully opaque.
#[must_use]
pub fn composite_over_checkerboard(result: &Bitmap) -> RgbaImage {
    let (width, height) = result.dimensions();
    let mut out = checkerboard(width, height);

    for (px, bg) in result.as_raw().chunks_exact(4).zip(out.pixels_mut()) {
        let alpha = px[3];
        for c in 0..3 {
            bg.0[c] = blend(px[c], bg.0[c], alpha);
        }
    }

    out
}

/// Original on the left, composited result on the right
///
/// Panels are top-aligned on a white canvas separated by [`PANEL_GAP`].
///
/// # Errors
/// - `MattingError::Processing` if the original cannot back an image buffer
pub fn side_by_side(original: &Bitmap, result: &Bitmap) -> Result<RgbaImage> {
    let left = original.to_rgba_image()?;
    let right = composite_over_checkerboard(result);

    let width = left.width() + PANEL_GAP + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(
        &mut canvas,
        &right,
        i64::from(left.width() + PANEL_GAP),
        0,
    );

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_pattern() {
        assert_eq!(checker_color(0, 0), CHECKER_LIGHT);
        assert_eq!(checker_color(9, 9), CHECKER_LIGHT);
        assert_eq!(checker_color(10, 0), CHECKER_DARK);
        assert_eq!(checker_color(0, 10), CHECKER_DARK);
        assert_eq!(checker_color(10, 10), CHECKER_LIGHT);
    }

    #[test]
    fn test_blend_extremes() {
        assert_eq!(blend(200, 10, 255), 200);
        assert_eq!(blend(200, 10, 0), 10);
        assert_eq!(blend(255, 0, 128), 128);
    }

    #[test]
    fn test_composite_transparent_shows_backdrop() {
        let transparent = Bitmap::filled(20, 20, [50, 60, 70, 0]).unwrap();
        let out = composite_over_checkerboard(&transparent);
        assert_eq!(out, checkerboard(20, 20));
    }

    #[test]
    fn test_composite_opaque_keeps_colour() {
        let opaque = Bitmap::filled(3, 3, [50, 60, 70, 255]).unwrap();
        let out = composite_over_checkerboard(&opaque);
        assert!(out.pixels().all(|p| p.0 == [50, 60, 70, 255]));
    }

    #[test]
    fn test_side_by_side_layout() {
        let original = Bitmap::filled(4, 2, [1, 2, 3, 255]).unwrap();
        let result = Bitmap::filled(4, 2, [1, 2, 3, 255]).unwrap();
        let canvas = side_by_side(&original, &result).unwrap();

        assert_eq!(canvas.dimensions(), (4 + PANEL_GAP + 4, 2));
        assert_eq!(canvas.get_pixel(0, 0).0, [1, 2, 3, 255]);
        assert_eq!(canvas.get_pixel(4, 0).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(4 + PANEL_GAP, 1).0, [1, 2, 3, 255]);
    }
}
