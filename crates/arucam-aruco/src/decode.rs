//! Bit extraction from a candidate quad and dictionary identification.

use arucam_core::{homography_from_4pt, sample_bilinear_u8, GrayImageView, Quad};
use nalgebra::Point2;

use crate::threshold::{mean_std, otsu_threshold_from_samples};
use crate::{DetectorParameters, Match, Matcher};

/// Why a candidate did not decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reject {
    Degenerate,
    LowContrast,
    Border,
    NoMatch,
}

/// A decoded candidate with its corners in canonical order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Decoded {
    pub m: Match,
    pub corners: Quad,
    pub inverted: bool,
}

/// Reusable bit reader for one dictionary/parameter set.
pub(crate) struct CellDecoder {
    marker_size: usize,
    border: usize,
    cells: usize,
    cell_px: usize,
    margin: usize,
    max_border_errors: usize,
    min_std_dev: f32,
    detect_inverted: bool,
    canonical: Quad,
    scratch: Vec<u8>,
}

impl CellDecoder {
    pub(crate) fn new(marker_size: usize, params: &DetectorParameters) -> Self {
        let border = params.marker_border_bits;
        let cells = marker_size + 2 * border;
        let cell_px = params.perspective_remove_pixel_per_cell;
        let side = (cells * cell_px) as f32 - 1.0;
        Self {
            marker_size,
            border,
            cells,
            cell_px,
            margin: (params.perspective_remove_ignored_margin_per_cell * cell_px as f64) as usize,
            max_border_errors: ((marker_size * marker_size) as f64
                * params.max_erroneous_bits_in_border_rate) as usize,
            min_std_dev: params.min_otsu_std_dev as f32,
            detect_inverted: params.detect_inverted_marker,
            canonical: [
                Point2::new(0.0, 0.0),
                Point2::new(side, 0.0),
                Point2::new(side, side),
                Point2::new(0.0, side),
            ],
            scratch: Vec::with_capacity(cells * cells * cell_px * cell_px),
        }
    }

    /// Read the marker inside `quad` and look it up.
    pub(crate) fn decode(
        &mut self,
        img: &GrayImageView<'_>,
        quad: &Quad,
        matcher: &Matcher,
    ) -> Result<Decoded, Reject> {
        let blacks = self.read_cells(img, quad)?;

        let mut inverted = false;
        let mut code = self.check_border(&blacks, false);
        if code.is_none() && self.detect_inverted {
            code = self.check_border(&blacks, true);
            inverted = code.is_some();
        }
        let code = code.ok_or(Reject::Border)?;

        let m = matcher.match_code(code).ok_or(Reject::NoMatch)?;
        let r = m.rotation as usize;
        let corners = [
            quad[r % 4],
            quad[(r + 1) % 4],
            quad[(r + 2) % 4],
            quad[(r + 3) % 4],
        ];
        Ok(Decoded {
            m,
            corners,
            inverted,
        })
    }

    /// Warp the quad onto the canonical grid and classify every cell.
    ///
    /// Returns one flag per cell (row-major), `true` for black.
    fn read_cells(&mut self, img: &GrayImageView<'_>, quad: &Quad) -> Result<Vec<bool>, Reject> {
        let h = homography_from_4pt(&self.canonical, quad).ok_or(Reject::Degenerate)?;
        let side = self.cells * self.cell_px;

        self.scratch.clear();
        for v in 0..side {
            for u in 0..side {
                let p = h.apply(Point2::new(u as f32, v as f32));
                self.scratch.push(sample_bilinear_u8(img, p.x, p.y));
            }
        }

        // Contrast is judged on the inner region only; the border is always dark.
        let half = self.cell_px / 2;
        let inner: Vec<u8> = (half..side - half)
            .flat_map(|v| (half..side - half).map(move |u| (u, v)))
            .map(|(u, v)| self.scratch[v * side + u])
            .collect();
        let (_, std_dev) = mean_std(&inner);
        if std_dev < self.min_std_dev {
            return Err(Reject::LowContrast);
        }

        let thr = otsu_threshold_from_samples(&self.scratch);
        let lo = self.margin;
        let hi = self.cell_px - self.margin;
        let per_cell = (hi - lo) * (hi - lo);

        let mut blacks = Vec::with_capacity(self.cells * self.cells);
        for cy in 0..self.cells {
            for cx in 0..self.cells {
                let mut white = 0usize;
                for y in lo..hi {
                    let row = (cy * self.cell_px + y) * side + cx * self.cell_px;
                    white += self.scratch[row + lo..row + hi]
                        .iter()
                        .filter(|&&v| v > thr)
                        .count();
                }
                blacks.push(white * 2 <= per_cell);
            }
        }
        Ok(blacks)
    }

    /// Validate the border and pack the inner bits (black = 1).
    fn check_border(&self, blacks: &[bool], invert: bool) -> Option<u64> {
        let n = self.cells;
        let b = self.border;
        let is_black = |cx: usize, cy: usize| blacks[cy * n + cx] != invert;

        let mut errors = 0usize;
        for cy in 0..n {
            for cx in 0..n {
                let on_border = cx < b || cy < b || cx >= n - b || cy >= n - b;
                if on_border && !is_black(cx, cy) {
                    errors += 1;
                }
            }
        }
        if errors > self.max_border_errors {
            return None;
        }

        let mut code = 0u64;
        for y in 0..self.marker_size {
            for x in 0..self.marker_size {
                if is_black(x + b, y + b) {
                    code |= 1u64 << (y * self.marker_size + x);
                }
            }
        }
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{draw_marker, MarkerPlacement};
    use crate::{builtin_dictionary, rotate_code_u64};
    use arucam_core::GrayImage;

    fn setup() -> (Matcher, DetectorParameters) {
        let dict = builtin_dictionary("GEN_4X4_50").expect("dict");
        let params = DetectorParameters::default();
        let max = (dict.max_correction_bits as f64 * params.error_correction_rate) as u8;
        (Matcher::new(dict, max), params)
    }

    #[test]
    fn decodes_rendered_marker_in_each_rotation() {
        let (matcher, params) = setup();
        let code = matcher.dictionary().codes[7];

        for rot in 0..4u8 {
            let mut img = GrayImage::filled(100, 100, 255);
            let screen = draw_marker(
                &mut img,
                rotate_code_u64(code, 4, rot),
                4,
                &MarkerPlacement::axis_aligned(20.0, 20.0, 10.0),
            );

            let mut decoder = CellDecoder::new(4, &params);
            let d = decoder
                .decode(&img.view(), &screen, &matcher)
                .expect("decoded");
            assert_eq!(d.m.id, 7);
            assert_eq!(d.m.rotation, rot);
            assert_eq!(d.corners[0], screen[rot as usize]);
            assert!(!d.inverted);
        }
    }

    #[test]
    fn uniform_patch_is_low_contrast() {
        let (matcher, params) = setup();
        let img = GrayImage::filled(60, 60, 90);
        let quad = [
            Point2::new(10.0, 10.0),
            Point2::new(40.0, 10.0),
            Point2::new(40.0, 40.0),
            Point2::new(10.0, 40.0),
        ];
        let mut decoder = CellDecoder::new(4, &params);
        let err = decoder.decode(&img.view(), &quad, &matcher).unwrap_err();
        assert_eq!(err, Reject::LowContrast);
    }

    #[test]
    fn inverted_marker_needs_opt_in() {
        let (matcher, params) = setup();
        let code = matcher.dictionary().codes[2];
        let mut img = GrayImage::filled(100, 100, 255);
        let quad = draw_marker(
            &mut img,
            code,
            4,
            &MarkerPlacement::axis_aligned(20.0, 20.0, 10.0),
        );
        for v in img.data.iter_mut() {
            *v = 255 - *v;
        }

        let mut plain = CellDecoder::new(4, &params);
        assert!(plain.decode(&img.view(), &quad, &matcher).is_err());

        let params = DetectorParameters {
            detect_inverted_marker: true,
            ..params
        };
        let mut decoder = CellDecoder::new(4, &params);
        let d = decoder.decode(&img.view(), &quad, &matcher).expect("decoded");
        assert_eq!(d.m.id, 2);
        assert!(d.inverted);
    }
}
