//! One-shot detection on a still image, with a JSON report.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arucam_aruco::{DetectError, DetectedMarker, DetectionResult, MarkerDetector};
use arucam_core::ColorFrame;
use serde::{Deserialize, Serialize};

use crate::convert::color_frame_from_rgb;
use crate::preprocess::{to_grayscale, FrameError};

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timings {
    pub preprocess_ms: f64,
    pub detect_ms: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionReport {
    pub image: PathBuf,
    pub width: usize,
    pub height: usize,
    pub dictionary: String,
    pub timings: Timings,
    pub markers: Vec<DetectedMarker>,
    pub rejected: usize,
}

impl DetectionReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load `path`, detect markers and return the report with the loaded frame.
pub fn detect_file(
    path: impl AsRef<Path>,
    detector: &MarkerDetector,
) -> Result<(DetectionReport, ColorFrame, DetectionResult), ReportError> {
    let path = path.as_ref();
    let img = image::open(path)
        .map_err(|source| ReportError::Load {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let frame = color_frame_from_rgb(0, img);

    let t0 = Instant::now();
    let gray = to_grayscale(&frame)?;
    let t1 = Instant::now();
    let result = detector.detect(&gray.view())?;
    let t2 = Instant::now();

    log::info!(
        "{}: {} markers {:?}",
        path.display(),
        result.markers.len(),
        result.ids()
    );

    let report = DetectionReport {
        image: path.to_path_buf(),
        width: frame.width,
        height: frame.height,
        dictionary: detector.dictionary().name.clone(),
        timings: Timings {
            preprocess_ms: (t1 - t0).as_secs_f64() * 1e3,
            detect_ms: (t2 - t1).as_secs_f64() * 1e3,
        },
        markers: result.markers.clone(),
        rejected: result.rejected.len(),
    };
    Ok((report, frame, result))
}
