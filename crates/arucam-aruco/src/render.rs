//! Synthetic marker rendering for demos, tests and printing.

use arucam_core::{GrayImage, Quad};
use nalgebra::{Point2, Rotation2, Vector2};

use crate::Dictionary;

/// Where a marker lands in an image.
///
/// `(x, y)` is the centre of the top-left outer pixel of the unrotated marker
/// and `angle` (radians, clockwise on screen) rotates it about its centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerPlacement {
    pub x: f32,
    pub y: f32,
    pub cell_px: f32,
    pub angle: f32,
}

impl MarkerPlacement {
    pub fn axis_aligned(x: f32, y: f32, cell_px: f32) -> Self {
        Self {
            x,
            y,
            cell_px,
            angle: 0.0,
        }
    }

    pub fn rotated(self, angle: f32) -> Self {
        Self { angle, ..self }
    }
}

/// Paint a black-bordered marker with the given inner `code` into `img`.
///
/// Returns the expected corners (top-left, top-right, bottom-right,
/// bottom-left of the painted pattern, at outer pixel centres). Pixels outside
/// the image are clipped.
pub fn draw_marker(
    img: &mut GrayImage,
    code: u64,
    marker_size: usize,
    placement: &MarkerPlacement,
) -> Quad {
    let cells = marker_size + 2;
    let side = cells as f32 * placement.cell_px;
    let half = side * 0.5;
    let center = Point2::new(placement.x - 0.5 + half, placement.y - 0.5 + half);
    let rot = Rotation2::new(placement.angle);
    let inv = rot.inverse();

    let reach = half * std::f32::consts::SQRT_2 + 1.0;
    let x0 = (center.x - reach).floor().max(0.0) as usize;
    let y0 = (center.y - reach).floor().max(0.0) as usize;
    let x1 = ((center.x + reach).ceil().max(0.0) as usize).min(img.width);
    let y1 = ((center.y + reach).ceil().max(0.0) as usize).min(img.height);

    for py in y0..y1 {
        for px in x0..x1 {
            let local = inv * Vector2::new(px as f32 - center.x, py as f32 - center.y);
            let lx = local.x + half;
            let ly = local.y + half;
            if lx < 0.0 || ly < 0.0 || lx >= side || ly >= side {
                continue;
            }
            let cx = ((lx / placement.cell_px) as usize).min(cells - 1);
            let cy = ((ly / placement.cell_px) as usize).min(cells - 1);
            let border = cx == 0 || cy == 0 || cx == cells - 1 || cy == cells - 1;
            let black = border || (code >> ((cy - 1) * marker_size + (cx - 1))) & 1 == 1;
            img.put(px, py, if black { 0 } else { 255 });
        }
    }

    let h = half - 0.5;
    [(-h, -h), (h, -h), (h, h), (-h, h)].map(|(dx, dy)| center + rot * Vector2::new(dx, dy))
}

/// Render marker `id` on a white canvas with a one-cell quiet zone.
///
/// Returns `None` for ids outside the dictionary.
pub fn render_marker(dict: &Dictionary, id: u32, cell_px: usize) -> Option<GrayImage> {
    let code = dict.code(id)?;
    let cell_px = cell_px.max(1);
    let cells = dict.marker_size + 4;
    let mut img = GrayImage::filled(cells * cell_px, cells * cell_px, 255);
    let c = cell_px as f32;
    draw_marker(
        &mut img,
        code,
        dict.marker_size,
        &MarkerPlacement::axis_aligned(c, c, c),
    );
    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_dictionary;

    #[test]
    fn axis_aligned_corners_are_outer_pixel_centres() {
        let mut img = GrayImage::filled(50, 50, 255);
        let q = draw_marker(&mut img, 0, 4, &MarkerPlacement::axis_aligned(5.0, 7.0, 5.0));
        approx::assert_abs_diff_eq!(q[0].x, 5.0, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(q[0].y, 7.0, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(q[2].x, 34.0, epsilon = 1e-4);
        approx::assert_abs_diff_eq!(q[2].y, 36.0, epsilon = 1e-4);

        assert_eq!(img.get(5, 7), 0);
        assert_eq!(img.get(4, 7), 255);
        assert_eq!(img.get(34, 36), 0);
        assert_eq!(img.get(35, 36), 255);
        // Inner cells of an all-zero code stay white.
        assert_eq!(img.get(15, 17), 255);
    }

    #[test]
    fn rendered_bits_follow_code_layout() {
        let dict = builtin_dictionary("GEN_4X4_50").expect("dict");
        let img = render_marker(&dict, 0, 10).expect("render");
        assert_eq!(img.width, 80);
        let code = dict.codes[0];
        for y in 0..4 {
            for x in 0..4 {
                let px = img.get(25 + x * 10, 25 + y * 10);
                let black = (code >> (y * 4 + x)) & 1 == 1;
                assert_eq!(px == 0, black, "cell ({x},{y})");
            }
        }
        assert!(render_marker(&dict, 50, 10).is_none());
    }
}
