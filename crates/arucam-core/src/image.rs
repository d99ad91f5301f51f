/// Borrowed single-channel image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    /// Check that the buffer matches the declared dimensions.
    pub fn check_shape(&self) -> Result<(), FrameShapeError> {
        check_len(self.width, self.height, 1, self.data.len())
    }
}

/// Owned single-channel image, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Uniform image filled with `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, v: u8) {
        let w = self.width;
        self.data[y * w + x] = v;
    }
}

/// Three-channel RGB8 frame as delivered by a frame source.
///
/// `index` is assigned by the source and increases by one per delivered frame.
/// The buffer is not validated on construction so that malformed frames can
/// travel through the pipeline and be rejected where they are consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorFrame {
    pub index: u64,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // row-major RGB, len = 3*w*h
}

impl ColorFrame {
    pub const CHANNELS: usize = 3;

    /// Uniform frame filled with one RGB color.
    pub fn filled(index: u64, width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * Self::CHANNELS);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            index,
            width,
            height,
            data,
        }
    }

    /// Replicate a grayscale image into all three channels.
    pub fn from_gray(index: u64, gray: &GrayImageView<'_>) -> Self {
        let mut data = Vec::with_capacity(gray.data.len() * Self::CHANNELS);
        for &v in gray.data {
            data.extend_from_slice(&[v, v, v]);
        }
        Self {
            index,
            width: gray.width,
            height: gray.height,
            data,
        }
    }

    pub fn check_shape(&self) -> Result<(), FrameShapeError> {
        check_len(self.width, self.height, Self::CHANNELS, self.data.len())
    }

    /// RGB value at `(x, y)`; `None` outside the frame or for malformed buffers.
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * Self::CHANNELS;
        let px = self.data.get(i..i + Self::CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }
}

/// A buffer whose length does not match its declared dimensions.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("{width}x{height} image needs {expected} bytes, buffer has {got}")]
pub struct FrameShapeError {
    pub width: usize,
    pub height: usize,
    pub expected: usize,
    pub got: usize,
}

fn check_len(
    width: usize,
    height: usize,
    channels: usize,
    got: usize,
) -> Result<(), FrameShapeError> {
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .unwrap_or(usize::MAX);
    if width == 0 || height == 0 || expected != got {
        return Err(FrameShapeError {
            width,
            height,
            expected,
            got,
        });
    }
    Ok(())
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample with a constant black border outside the image.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_check_rejects_short_buffers() {
        let frame = ColorFrame {
            index: 0,
            width: 4,
            height: 2,
            data: vec![0; 20],
        };
        let err = frame.check_shape().unwrap_err();
        assert_eq!(err.expected, 24);
        assert_eq!(err.got, 20);
        assert_eq!(err.to_string(), "4x2 image needs 24 bytes, buffer has 20");

        let empty = GrayImageView {
            width: 0,
            height: 5,
            data: &[],
        };
        assert!(empty.check_shape().is_err());
    }

    #[test]
    fn gray_replication_keeps_layout() {
        let mut gray = GrayImage::filled(3, 2, 10);
        gray.put(2, 1, 200);
        let frame = ColorFrame::from_gray(7, &gray.view());
        assert!(frame.check_shape().is_ok());
        assert_eq!(frame.index, 7);
        assert_eq!(frame.pixel(2, 1), Some([200, 200, 200]));
        assert_eq!(frame.pixel(0, 0), Some([10, 10, 10]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let img = GrayImage {
            width: 2,
            height: 1,
            data: vec![0, 100],
        };
        let v = sample_bilinear(&img.view(), 0.25, 0.0);
        approx::assert_abs_diff_eq!(v, 25.0, epsilon = 1e-4);
    }
}
