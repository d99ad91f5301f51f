//! ArUco-style square marker detection.
//!
//! This crate contains:
//! - dictionaries (embedded OpenCV 4x4 tables, generated families and
//!   JSON-loaded tables),
//! - matching observed codes against a dictionary in all four rotations,
//! - the full detection pipeline: adaptive thresholding, contour-based quad
//!   candidates, non-maximum suppression, bit extraction and optional
//!   sub-pixel corner refinement ([`MarkerDetector`]),
//! - synthetic marker rendering for tests, demos and printing.
//!
//! ```no_run
//! use arucam_aruco::{builtin_dictionary, DetectorParameters, MarkerDetector};
//! use arucam_core::GrayImage;
//!
//! let dict = builtin_dictionary("GEN_6X6_250").unwrap();
//! let detector = MarkerDetector::new(dict, DetectorParameters::default()).unwrap();
//! let img = GrayImage::filled(640, 480, 255);
//! let result = detector.detect(&img.view()).unwrap();
//! println!("{} markers", result.markers.len());
//! ```

pub mod builtins;
mod candidates;
mod decode;
mod detector;
mod dictionary;
mod matcher;
mod nms;
mod params;
mod refine;
mod render;
mod threshold;

pub use builtins::{builtin_dictionary, BUILTIN_NAMES, DEFAULT_DICTIONARY};
pub use detector::{DetectError, DetectedMarker, DetectionResult, MarkerDetector};
pub use dictionary::{Dictionary, DictionaryError, DictionaryFile, MAX_MARKER_SIZE};
pub use matcher::{min_rotation_distance, rotate_code_u64, self_rotation_distance, Match, Matcher};
pub use nms::non_max_suppression;
pub use params::{CornerRefinement, DetectorParameters, ParamsError};
pub use render::{draw_marker, render_marker, MarkerPlacement};
