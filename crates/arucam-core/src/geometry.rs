//! Polygon helpers for marker candidates.
//!
//! All functions use image coordinates (x right, y down). A quad is called
//! *clockwise* when it turns clockwise on screen, which is the orientation
//! with a positive [`signed_area`].

use nalgebra::Point2;

/// Four image-space corners of a marker or candidate.
pub type Quad = [Point2<f32>; 4];

#[inline]
fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Shoelace area; positive for polygons that run clockwise on screen.
pub fn signed_area(poly: &[Point2<f32>]) -> f32 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f32;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        acc += p.x * q.y - q.x * p.y;
    }
    0.5 * acc
}

pub fn quad_perimeter(q: &Quad) -> f32 {
    (0..4).map(|i| (q[(i + 1) % 4] - q[i]).norm()).sum()
}

pub fn quad_min_side(q: &Quad) -> f32 {
    (0..4)
        .map(|i| (q[(i + 1) % 4] - q[i]).norm())
        .fold(f32::INFINITY, f32::min)
}

/// Strict convexity: every turn has the same, non-zero direction.
pub fn is_convex(poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for i in 0..n {
        let c = cross(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]);
        if c == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// Reorder a convex quad so it runs clockwise on screen, keeping corner 0.
pub fn order_clockwise(mut q: Quad) -> Quad {
    if cross(q[0], q[1], q[2]) < 0.0 {
        q.swap(1, 3);
    }
    q
}

/// Area of the intersection of two convex polygons (Sutherland-Hodgman).
pub fn convex_intersection_area(a: &[Point2<f32>], b: &[Point2<f32>]) -> f32 {
    let mut out = positively_oriented(a);
    let clip = positively_oriented(b);
    let m = clip.len();

    for i in 0..m {
        if out.is_empty() {
            break;
        }
        let c0 = clip[i];
        let c1 = clip[(i + 1) % m];
        let input = std::mem::take(&mut out);
        let k = input.len();
        for j in 0..k {
            let cur = input[j];
            let prev = input[(j + k - 1) % k];
            let s_cur = cross(c0, c1, cur);
            let s_prev = cross(c0, c1, prev);
            if s_cur >= 0.0 {
                if s_prev < 0.0 {
                    out.push(lerp_crossing(prev, cur, s_prev, s_cur));
                }
                out.push(cur);
            } else if s_prev >= 0.0 {
                out.push(lerp_crossing(prev, cur, s_prev, s_cur));
            }
        }
    }

    signed_area(&out).abs()
}

/// Intersection over union of two convex quads.
pub fn quad_iou(a: &Quad, b: &Quad) -> f32 {
    let inter = convex_intersection_area(a, b);
    let union = signed_area(a).abs() + signed_area(b).abs() - inter;
    if union <= f32::EPSILON {
        return 0.0;
    }
    (inter / union).clamp(0.0, 1.0)
}

fn positively_oriented(poly: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut v = poly.to_vec();
    if signed_area(&v) < 0.0 {
        v.reverse();
    }
    v
}

fn lerp_crossing(p: Point2<f32>, q: Point2<f32>, sp: f32, sq: f32) -> Point2<f32> {
    let t = sp / (sp - sq);
    p + (q - p) * t
}

fn segment_distance(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f32::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Douglas-Peucker simplification of a closed curve.
///
/// The curve is split at its first point and the point farthest from it, each
/// half is simplified independently, and finally vertices that lie within
/// `epsilon` of the segment joining their neighbours are dropped (this removes
/// an anchor that happened to fall in the middle of an edge).
pub fn approx_polygon_closed(points: &[Point2<f32>], epsilon: f32) -> Vec<Point2<f32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let (far, far_d) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, (p - points[0]).norm_squared()))
        .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });
    if far_d <= f32::EPSILON {
        return vec![points[0]];
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[far] = true;
    simplify_chain(points, 0, far, epsilon, &mut keep);
    // Second half wraps around: index `n` stands for point 0.
    simplify_chain(points, far, n, epsilon, &mut keep);

    let mut poly: Vec<Point2<f32>> = points
        .iter()
        .zip(keep.iter())
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect();

    while poly.len() > 3 {
        let m = poly.len();
        let (idx, d) = (0..m)
            .map(|i| {
                let d = segment_distance(poly[i], poly[(i + m - 1) % m], poly[(i + 1) % m]);
                (i, d)
            })
            .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
        if d > epsilon {
            break;
        }
        poly.remove(idx);
    }

    poly
}

fn simplify_chain(
    points: &[Point2<f32>],
    start: usize,
    end: usize,
    epsilon: f32,
    keep: &mut [bool],
) {
    let n = points.len();
    let mut stack = vec![(start, end)];
    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }
        let ps = points[s % n];
        let pe = points[e % n];
        let mut best = (s, -1.0f32);
        for i in (s + 1)..e {
            let d = segment_distance(points[i % n], ps, pe);
            if d > best.1 {
                best = (i, d);
            }
        }
        if best.1 > epsilon {
            keep[best.0 % n] = true;
            stack.push((s, best.0));
            stack.push((best.0, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square(x: f32, y: f32, s: f32) -> Quad {
        [
            Point2::new(x, y),
            Point2::new(x + s, y),
            Point2::new(x + s, y + s),
            Point2::new(x, y + s),
        ]
    }

    #[test]
    fn screen_clockwise_square_has_positive_area() {
        let q = square(0.0, 0.0, 10.0);
        assert_abs_diff_eq!(signed_area(&q), 100.0, epsilon = 1e-4);
        assert!(is_convex(&q));
        assert_abs_diff_eq!(quad_perimeter(&q), 40.0, epsilon = 1e-4);
    }

    #[test]
    fn order_clockwise_fixes_reversed_quads() {
        let mut q = square(5.0, 5.0, 4.0);
        q.swap(1, 3);
        assert!(signed_area(&q) < 0.0);
        let fixed = order_clockwise(q);
        assert!(signed_area(&fixed) > 0.0);
        assert_eq!(fixed[0], q[0]);
    }

    #[test]
    fn bow_tie_is_not_convex() {
        let q = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(!is_convex(&q));
    }

    #[test]
    fn iou_of_shifted_squares() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(5.0, 0.0, 10.0);
        assert_abs_diff_eq!(convex_intersection_area(&a, &b), 50.0, epsilon = 1e-3);
        assert_abs_diff_eq!(quad_iou(&a, &b), 50.0 / 150.0, epsilon = 1e-4);

        let far = square(100.0, 100.0, 10.0);
        assert_eq!(quad_iou(&a, &far), 0.0);
        assert_abs_diff_eq!(quad_iou(&a, &a), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn dp_recovers_square_corners_from_dense_outline() {
        // Start the outline mid-edge so the anchor must be pruned.
        let mut outline = Vec::new();
        for x in 5..=20 {
            outline.push(Point2::new(x as f32, 0.0));
        }
        for y in 1..=20 {
            outline.push(Point2::new(20.0, y as f32));
        }
        for x in (0..20).rev() {
            outline.push(Point2::new(x as f32, 20.0));
        }
        for y in (0..20).rev() {
            outline.push(Point2::new(0.0, y as f32));
        }
        for x in 1..5 {
            outline.push(Point2::new(x as f32, 0.0));
        }

        let poly = approx_polygon_closed(&outline, 1.5);
        assert_eq!(poly.len(), 4, "got {poly:?}");
        for corner in [(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)] {
            assert!(poly
                .iter()
                .any(|p| (p.x - corner.0).abs() < 1e-3 && (p.y - corner.1).abs() < 1e-3));
        }
    }
}
