//! Conversions between `image` buffers and the crate's frame types.

use arucam_core::{ColorFrame, GrayImage};

/// Wrap a decoded RGB image as frame `index`.
pub fn color_frame_from_rgb(index: u64, img: image::RgbImage) -> ColorFrame {
    let (w, h) = img.dimensions();
    ColorFrame {
        index,
        width: w as usize,
        height: h as usize,
        data: img.into_raw(),
    }
}

/// `None` when the frame buffer does not match its dimensions.
pub fn rgb_from_color_frame(frame: &ColorFrame) -> Option<image::RgbImage> {
    frame.check_shape().ok()?;
    image::RgbImage::from_raw(frame.width as u32, frame.height as u32, frame.data.clone())
}

pub fn gray_from_luma(img: &image::GrayImage) -> GrayImage {
    GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

/// `None` when the buffer does not match its dimensions.
pub fn luma_from_gray(img: &GrayImage) -> Option<image::GrayImage> {
    image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
}
