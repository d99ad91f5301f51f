//! Core types and utilities for live fiducial marker detection.
//!
//! This crate is intentionally small and purely geometric. It owns the
//! lightweight image containers shared by the detector and the live loop,
//! a 4-point homography, quadrilateral helpers, and the logger. It does *not*
//! depend on any concrete image decoding or windowing library.

mod geometry;
mod homography;
mod image;
mod logger;

pub use geometry::{
    approx_polygon_closed, convex_intersection_area, is_convex, order_clockwise, quad_iou,
    quad_min_side, quad_perimeter, signed_area, Quad,
};
pub use homography::{homography_from_4pt, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_u8, ColorFrame, FrameShapeError, GrayImage, GrayImageView,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, init_with_spec, LogSpec};
