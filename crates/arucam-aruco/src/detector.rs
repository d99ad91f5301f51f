//! Square marker detector over grayscale images.

use arucam_core::{FrameShapeError, GrayImageView, Quad};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::candidates::find_candidates;
use crate::decode::{CellDecoder, Reject};
use crate::nms::non_max_suppression;
use crate::refine::refine_corner;
use crate::{CornerRefinement, DetectorParameters, Dictionary, Matcher, ParamsError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Detection failure for a single image.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] FrameShapeError),
}

/// One identified marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: u32,
    /// Clockwise on screen, starting at the marker's own top-left corner.
    pub corners: Quad,
    /// Quarter turns between the dictionary pattern and the observation.
    pub rotation: u8,
    /// Corrected bit errors.
    pub hamming: u8,
    /// Decoded as white-on-black; only with `detect_inverted_marker`.
    #[serde(default)]
    pub inverted: bool,
}

impl DetectedMarker {
    pub fn center(&self) -> Point2<f32> {
        let sum = self
            .corners
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / 4.0)
    }
}

/// Result of one detection pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Sorted by id, then by the position of corner 0 (top to bottom, left to right).
    pub markers: Vec<DetectedMarker>,
    /// Square candidates that did not decode.
    pub rejected: Vec<Quad>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.markers.iter().map(|m| m.id).collect()
    }
}

/// Detects dictionary markers in grayscale images.
///
/// Parameters are validated once at construction; the detector holds no
/// per-image state and can be reused for any number of frames.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: DetectorParameters,
    matcher: Matcher,
}

impl MarkerDetector {
    pub fn new(dict: Dictionary, params: DetectorParameters) -> Result<Self, ParamsError> {
        params.validate()?;
        let max_hamming =
            (dict.max_correction_bits as f64 * params.error_correction_rate).floor() as u8;
        log::debug!(
            "marker detector: dictionary {} ({} ids, {}x{} bits), max hamming {}",
            dict.name,
            dict.len(),
            dict.marker_size,
            dict.marker_size,
            max_hamming
        );
        Ok(Self {
            params,
            matcher: Matcher::new(dict, max_hamming),
        })
    }

    pub fn params(&self) -> &DetectorParameters {
        &self.params
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Result<DetectionResult, DetectError> {
        img.check_shape()?;

        let candidates = find_candidates(img, &self.params);
        let survivors = non_max_suppression(&candidates, self.params.max_candidate_overlap);

        let mut decoder = CellDecoder::new(self.dictionary().marker_size, &self.params);
        let mut result = DetectionResult::default();
        let mut reject_counts = [0usize; 4];

        for idx in survivors {
            let quad = &candidates[idx];
            match decoder.decode(img, quad, &self.matcher) {
                Ok(d) => result.markers.push(DetectedMarker {
                    id: d.m.id,
                    corners: d.corners,
                    rotation: d.m.rotation,
                    hamming: d.m.hamming,
                    inverted: d.inverted,
                }),
                Err(reason) => {
                    reject_counts[reason_slot(reason)] += 1;
                    result.rejected.push(*quad);
                }
            }
        }

        if let CornerRefinement::Subpixel {
            window,
            max_iterations,
            min_accuracy,
        } = self.params.corner_refinement
        {
            for m in &mut result.markers {
                for c in &mut m.corners {
                    *c = refine_corner(img, *c, window, max_iterations, min_accuracy);
                }
            }
        }

        result.markers.sort_by(|a, b| {
            a.id.cmp(&b.id)
                .then(a.corners[0].y.total_cmp(&b.corners[0].y))
                .then(a.corners[0].x.total_cmp(&b.corners[0].x))
        });

        log::debug!(
            "{} candidates, {} markers, rejected: {} degenerate, {} low contrast, {} border, {} unmatched",
            candidates.len(),
            result.markers.len(),
            reject_counts[0],
            reject_counts[1],
            reject_counts[2],
            reject_counts[3]
        );
        Ok(result)
    }
}

fn reason_slot(r: Reject) -> usize {
    match r {
        Reject::Degenerate => 0,
        Reject::LowContrast => 1,
        Reject::Border => 2,
        Reject::NoMatch => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin_dictionary;
    use arucam_core::GrayImage;

    fn detector() -> MarkerDetector {
        let dict = builtin_dictionary("GEN_6X6_250").expect("dict");
        MarkerDetector::new(dict, DetectorParameters::default()).expect("detector")
    }

    #[test]
    fn blank_frame_has_no_markers() {
        let img = GrayImage::filled(160, 120, 200);
        let res = detector().detect(&img.view()).expect("detect");
        assert!(res.markers.is_empty());
        assert!(res.rejected.is_empty());
    }

    #[test]
    fn malformed_view_is_invalid_frame() {
        let data = vec![0u8; 10];
        let view = GrayImageView {
            width: 4,
            height: 4,
            data: &data,
        };
        let err = detector().detect(&view).unwrap_err();
        assert!(matches!(err, DetectError::InvalidFrame(_)));
    }

    #[test]
    fn invalid_parameters_are_refused() {
        let dict = builtin_dictionary("GEN_4X4_50").expect("dict");
        let params = DetectorParameters {
            adaptive_thresh_win_size_step: 0,
            ..Default::default()
        };
        assert!(MarkerDetector::new(dict, params).is_err());
    }
}
