//! Detector parameters.

use serde::{Deserialize, Serialize};

/// Invalid detector parameters.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParamsError {
    #[error("adaptive threshold window range invalid: min={min} max={max} step={step}")]
    ThresholdWindows { min: usize, max: usize, step: usize },
    #[error("{name} must be within {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("marker_border_bits must be >= 1")]
    BorderBits,
    #[error("perspective_remove_pixel_per_cell must be >= 2, got {0}")]
    PixelsPerCell(usize),
}

/// Sub-pixel corner refinement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CornerRefinement {
    #[default]
    None,
    /// Gradient-based refinement in a `(2*window+1)²` neighbourhood.
    Subpixel {
        window: usize,
        max_iterations: usize,
        min_accuracy: f32,
    },
}

impl CornerRefinement {
    /// Subpixel refinement with the usual window/iteration settings.
    pub fn subpixel() -> Self {
        Self::Subpixel {
            window: 5,
            max_iterations: 30,
            min_accuracy: 0.1,
        }
    }
}

/// Parameters of [`crate::MarkerDetector`].
///
/// Defaults follow the classic ArUco detector values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParameters {
    pub adaptive_thresh_win_size_min: usize,
    pub adaptive_thresh_win_size_max: usize,
    pub adaptive_thresh_win_size_step: usize,
    /// Subtracted from the local mean before comparing.
    pub adaptive_thresh_constant: f64,

    /// Contour length bounds relative to the larger image side.
    pub min_marker_perimeter_rate: f64,
    pub max_marker_perimeter_rate: f64,
    /// Douglas-Peucker epsilon relative to the contour length.
    pub polygonal_approx_accuracy_rate: f64,
    /// Shortest allowed side relative to the contour length.
    pub min_corner_distance_rate: f64,
    /// Corners closer than this (pixels) to the image edge are rejected.
    pub min_distance_to_border: usize,

    /// Width of the black border in cells.
    pub marker_border_bits: usize,
    /// Pixels per cell of the canonical (warped) marker image.
    pub perspective_remove_pixel_per_cell: usize,
    /// Fraction of each cell ignored on every side when averaging.
    pub perspective_remove_ignored_margin_per_cell: f64,
    /// Fraction of border cells allowed to be white.
    pub max_erroneous_bits_in_border_rate: f64,
    /// Candidates whose intensity spread is below this are rejected.
    pub min_otsu_std_dev: f64,
    /// Fraction of the dictionary's correction capability that is used.
    pub error_correction_rate: f64,
    /// Also try white-on-black markers.
    pub detect_inverted_marker: bool,

    /// Candidates overlapping more than this (intersection over union) are
    /// suppressed in favour of the larger one.
    pub max_candidate_overlap: f32,

    pub corner_refinement: CornerRefinement,
}

impl Default for DetectorParameters {
    fn default() -> Self {
        Self {
            adaptive_thresh_win_size_min: 3,
            adaptive_thresh_win_size_max: 23,
            adaptive_thresh_win_size_step: 10,
            adaptive_thresh_constant: 7.0,
            min_marker_perimeter_rate: 0.03,
            max_marker_perimeter_rate: 4.0,
            polygonal_approx_accuracy_rate: 0.03,
            min_corner_distance_rate: 0.05,
            min_distance_to_border: 3,
            marker_border_bits: 1,
            perspective_remove_pixel_per_cell: 4,
            perspective_remove_ignored_margin_per_cell: 0.13,
            max_erroneous_bits_in_border_rate: 0.35,
            min_otsu_std_dev: 5.0,
            error_correction_rate: 0.6,
            detect_inverted_marker: false,
            max_candidate_overlap: 0.5,
            corner_refinement: CornerRefinement::None,
        }
    }
}

impl DetectorParameters {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let (min, max, step) = (
            self.adaptive_thresh_win_size_min,
            self.adaptive_thresh_win_size_max,
            self.adaptive_thresh_win_size_step,
        );
        if min < 3 || max < min || step == 0 {
            return Err(ParamsError::ThresholdWindows { min, max, step });
        }
        if self.marker_border_bits == 0 {
            return Err(ParamsError::BorderBits);
        }
        if self.perspective_remove_pixel_per_cell < 2 {
            return Err(ParamsError::PixelsPerCell(
                self.perspective_remove_pixel_per_cell,
            ));
        }

        check_range(
            "min_marker_perimeter_rate",
            self.min_marker_perimeter_rate,
            "(0, max_marker_perimeter_rate]",
            self.min_marker_perimeter_rate > 0.0
                && self.min_marker_perimeter_rate <= self.max_marker_perimeter_rate,
        )?;
        check_range(
            "polygonal_approx_accuracy_rate",
            self.polygonal_approx_accuracy_rate,
            "(0, 1)",
            self.polygonal_approx_accuracy_rate > 0.0 && self.polygonal_approx_accuracy_rate < 1.0,
        )?;
        check_range(
            "min_corner_distance_rate",
            self.min_corner_distance_rate,
            "[0, 1)",
            (0.0..1.0).contains(&self.min_corner_distance_rate),
        )?;
        check_range(
            "perspective_remove_ignored_margin_per_cell",
            self.perspective_remove_ignored_margin_per_cell,
            "[0, 0.5)",
            (0.0..0.5).contains(&self.perspective_remove_ignored_margin_per_cell),
        )?;
        check_range(
            "max_erroneous_bits_in_border_rate",
            self.max_erroneous_bits_in_border_rate,
            "[0, 1]",
            (0.0..=1.0).contains(&self.max_erroneous_bits_in_border_rate),
        )?;
        check_range(
            "min_otsu_std_dev",
            self.min_otsu_std_dev,
            ">= 0",
            self.min_otsu_std_dev >= 0.0,
        )?;
        check_range(
            "error_correction_rate",
            self.error_correction_rate,
            "[0, 1]",
            (0.0..=1.0).contains(&self.error_correction_rate),
        )?;
        check_range(
            "max_candidate_overlap",
            self.max_candidate_overlap as f64,
            "[0, 1]",
            (0.0..=1.0).contains(&self.max_candidate_overlap),
        )?;

        if let CornerRefinement::Subpixel {
            window,
            max_iterations,
            min_accuracy,
        } = self.corner_refinement
        {
            check_range("corner_refinement.window", window as f64, ">= 1", window >= 1)?;
            check_range(
                "corner_refinement.max_iterations",
                max_iterations as f64,
                ">= 1",
                max_iterations >= 1,
            )?;
            check_range(
                "corner_refinement.min_accuracy",
                min_accuracy as f64,
                "> 0",
                min_accuracy > 0.0,
            )?;
        }
        Ok(())
    }

    /// Odd window sizes visited by the adaptive threshold, in order.
    ///
    /// Even sizes are bumped to the next odd value.
    pub fn threshold_windows(&self) -> Vec<usize> {
        let step = self.adaptive_thresh_win_size_step.max(1);
        (self.adaptive_thresh_win_size_min..=self.adaptive_thresh_win_size_max)
            .step_by(step)
            .map(|w| if w % 2 == 0 { w + 1 } else { w })
            .collect()
    }
}

fn check_range(
    name: &'static str,
    value: f64,
    range: &'static str,
    ok: bool,
) -> Result<(), ParamsError> {
    if ok && value.is_finite() {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange { name, range, value })
    }
}
