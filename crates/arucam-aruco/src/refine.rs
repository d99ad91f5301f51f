//! Gradient-based sub-pixel corner refinement.
//!
//! Each corner is moved to the point `q` that best satisfies
//! `g(p) · (p - q) = 0` over a window of samples `p`, where `g` is the image
//! gradient: at a true corner every gradient is orthogonal to the vector from
//! the corner to the sample. Samples are weighted with a Gaussian centred on
//! the current estimate.

use arucam_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refine one corner. Returns the input unchanged when the system is
/// degenerate or the estimate drifts out of the search window.
pub(crate) fn refine_corner(
    img: &GrayImageView<'_>,
    start: Point2<f32>,
    window: usize,
    max_iterations: usize,
    min_accuracy: f32,
) -> Point2<f32> {
    let win = window as i32;
    let sigma = window.max(1) as f32;
    let eps2 = min_accuracy * min_accuracy;

    let mut q = start;
    for _ in 0..max_iterations {
        let mut a = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();

        for dy in -win..=win {
            for dx in -win..=win {
                let px = q.x + dx as f32;
                let py = q.y + dy as f32;
                let gx = 0.5 * (sample_bilinear(img, px + 1.0, py) - sample_bilinear(img, px - 1.0, py));
                let gy = 0.5 * (sample_bilinear(img, px, py + 1.0) - sample_bilinear(img, px, py - 1.0));
                let w = (-((dx * dx + dy * dy) as f32) / (2.0 * sigma * sigma)).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b[0] += gxx * px + gxy * py;
                b[1] += gxy * px + gyy * py;
            }
        }

        let Some(next) = a.try_inverse().map(|inv| inv * b) else {
            return start;
        };
        if !next.iter().all(|v| v.is_finite()) {
            return start;
        }
        let next = Point2::new(next[0], next[1]);
        let shift = (next - q).norm_squared();
        q = next;
        if shift <= eps2 {
            break;
        }
    }

    if (q - start).norm() > window as f32 * 1.5 {
        start
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucam_core::GrayImage;

    #[test]
    fn refines_towards_true_corner_of_dark_square() {
        // Dark quadrant with its corner between pixels (29,29) and (30,30).
        let mut img = GrayImage::filled(60, 60, 220);
        for y in 30..60 {
            for x in 30..60 {
                img.put(x, y, 30);
            }
        }
        let start = Point2::new(31.2_f32, 30.8);
        let q = refine_corner(&img.view(), start, 5, 30, 0.01);
        assert!((q.x - 29.5).abs() < 0.6, "{q:?}");
        assert!((q.y - 29.5).abs() < 0.6, "{q:?}");
    }

    #[test]
    fn flat_region_keeps_start() {
        let img = GrayImage::filled(40, 40, 128);
        let start = Point2::new(20.0_f32, 20.0);
        assert_eq!(refine_corner(&img.view(), start, 4, 10, 0.1), start);
    }
}
