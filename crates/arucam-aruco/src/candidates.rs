//! Quad candidate extraction from adaptively thresholded images.

use arucam_core::{
    approx_polygon_closed, is_convex, order_clockwise, quad_min_side, GrayImageView, Quad,
};
use imageproc::contours::{find_contours, BorderType};
use nalgebra::Point2;

use crate::threshold::IntegralImage;
use crate::DetectorParameters;

/// Collect convex four-corner candidates over every threshold window.
///
/// Candidates from different windows are concatenated in window order, so
/// the same physical square usually appears more than once; suppression
/// happens later.
pub(crate) fn find_candidates(img: &GrayImageView<'_>, params: &DetectorParameters) -> Vec<Quad> {
    let integral = IntegralImage::new(img);
    let mut out = Vec::new();
    for window in params.threshold_windows() {
        let binary = integral.threshold_inv(img, window, params.adaptive_thresh_constant);
        let before = out.len();
        collect_quads(&binary, img.width, img.height, params, &mut out);
        log::trace!("window {window}: {} candidates", out.len() - before);
    }
    out
}

fn collect_quads(
    binary: &image::GrayImage,
    width: usize,
    height: usize,
    params: &DetectorParameters,
    out: &mut Vec<Quad>,
) {
    let max_dim = width.max(height) as f64;
    let min_len = (params.min_marker_perimeter_rate * max_dim) as usize;
    let max_len = (params.max_marker_perimeter_rate * max_dim) as usize;

    for contour in find_contours::<i32>(binary) {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let n = contour.points.len();
        if n < min_len || n > max_len || n < 4 {
            continue;
        }

        let points: Vec<Point2<f32>> = contour
            .points
            .iter()
            .map(|p| Point2::new(p.x as f32, p.y as f32))
            .collect();
        let eps = n as f32 * params.polygonal_approx_accuracy_rate as f32;
        let poly = approx_polygon_closed(&points, eps);
        if poly.len() != 4 || !is_convex(&poly) {
            continue;
        }

        let quad = order_clockwise([poly[0], poly[1], poly[2], poly[3]]);
        let min_side = n as f32 * params.min_corner_distance_rate as f32;
        if quad_min_side(&quad) < min_side {
            continue;
        }
        if !inside_margin(&quad, width, height, params.min_distance_to_border as f32) {
            continue;
        }
        out.push(quad);
    }
}

fn inside_margin(q: &Quad, width: usize, height: usize, margin: f32) -> bool {
    let max_x = width as f32 - 1.0 - margin;
    let max_y = height as f32 - 1.0 - margin;
    q.iter()
        .all(|p| p.x >= margin && p.y >= margin && p.x <= max_x && p.y <= max_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucam_core::{signed_area, GrayImage};

    fn dark_square(size: usize, x0: usize, y0: usize, side: usize) -> GrayImage {
        let mut img = GrayImage::filled(size, size, 230);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img.put(x, y, 20);
            }
        }
        img
    }

    #[test]
    fn dark_square_yields_clockwise_quad() {
        let img = dark_square(120, 30, 40, 50);
        let quads = find_candidates(&img.view(), &DetectorParameters::default());
        assert!(!quads.is_empty());

        let hit = quads.iter().find(|q| {
            [(30.0, 40.0), (79.0, 40.0), (79.0, 89.0), (30.0, 89.0)]
                .iter()
                .all(|&(x, y)| q.iter().any(|p| (p.x - x).abs() < 1.5 && (p.y - y).abs() < 1.5))
        });
        let q = hit.expect("outer square among candidates");
        assert!(signed_area(q) > 0.0);
    }

    #[test]
    fn squares_touching_the_border_are_dropped() {
        let img = dark_square(100, 1, 1, 40);
        let quads = find_candidates(&img.view(), &DetectorParameters::default());
        assert!(quads.iter().all(|q| q.iter().all(|p| p.x >= 3.0 && p.y >= 3.0)));
    }

    #[test]
    fn blank_image_has_no_candidates() {
        let img = GrayImage::filled(64, 48, 128);
        assert!(find_candidates(&img.view(), &DetectorParameters::default()).is_empty());
    }
}
