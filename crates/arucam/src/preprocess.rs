use arucam_core::{ColorFrame, FrameShapeError, GrayImage};

/// Frame that cannot be processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame {index}: {shape}")]
    InvalidFrame { index: u64, shape: FrameShapeError },
}

// BT.601 luma in Q14 fixed point: 0.299, 0.587, 0.114.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;
const ROUND: u32 = 1 << (SHIFT - 1);

/// Convert an RGB frame to single-channel luma.
pub fn to_grayscale(frame: &ColorFrame) -> Result<GrayImage, FrameError> {
    frame
        .check_shape()
        .map_err(|shape| FrameError::InvalidFrame {
            index: frame.index,
            shape,
        })?;

    let data = frame
        .data
        .chunks_exact(ColorFrame::CHANNELS)
        .map(|px| {
            let y = R_WEIGHT * px[0] as u32 + G_WEIGHT * px[1] as u32 + B_WEIGHT * px[2] as u32;
            ((y + ROUND) >> SHIFT) as u8
        })
        .collect();

    Ok(GrayImage {
        width: frame.width,
        height: frame.height,
        data,
    })
}
