use nalgebra::{Matrix3, Point2, Vector3};

/// Projective map between two image planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new((v[0] / v[2]) as f32, (v[1] / v[2]) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Map the unit square `(0,0) (1,0) (1,1) (0,1)` onto `quad`, corner by
    /// corner. `None` when three or more corners are collinear.
    pub fn unit_square_to(quad: &[Point2<f32>; 4]) -> Option<Self> {
        let [p0, p1, p2, p3] = quad.map(|p| (p.x as f64, p.y as f64));

        let (dx1, dy1) = (p1.0 - p2.0, p1.1 - p2.1);
        let (dx2, dy2) = (p3.0 - p2.0, p3.1 - p2.1);
        let (sx, sy) = (p0.0 - p1.0 + p2.0 - p3.0, p0.1 - p1.1 + p2.1 - p3.1);

        let den = dx1 * dy2 - dx2 * dy1;
        if den.abs() < 1e-12 {
            return None;
        }
        // Zero for parallelograms, where the map is affine.
        let g = (sx * dy2 - dx2 * sy) / den;
        let h = (dx1 * sy - sx * dy1) / den;

        let m = Matrix3::new(
            p1.0 - p0.0 + g * p1.0, p3.0 - p0.0 + h * p3.0, p0.0, //
            p1.1 - p0.1 + g * p1.1, p3.1 - p0.1 + h * p3.1, p0.1, //
            g, h, 1.0,
        );
        let scale = m.abs().max();
        if m.determinant().abs() <= 1e-9 * scale * scale * scale {
            return None;
        }
        Some(Self::new(m))
    }
}

/// Compute H such that `dst[i] ~ H * src[i]` for the four corners.
///
/// Built as `unit→dst ∘ (unit→src)⁻¹`. Returns `None` for degenerate
/// configurations (collinear or repeated corners on either side).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let to_src = Homography::unit_square_to(src)?;
    let to_dst = Homography::unit_square_to(dst)?;
    let h = to_dst.h * to_src.h.try_inverse()?;

    let s = h[(2, 2)];
    if s.abs() < 1e-12 || !h.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(Homography::new(h / s))
}
