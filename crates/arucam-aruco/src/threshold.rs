//! Thresholding utilities: local-mean adaptive thresholding for candidate
//! search and Otsu thresholding for bit extraction.

use arucam_core::GrayImageView;
use image::{GrayImage as ImageGray, Luma};

/// Summed-area table with a zero first row and column.
pub(crate) struct IntegralImage {
    width: usize,
    height: usize,
    sums: Vec<u64>, // (w+1)*(h+1)
}

impl IntegralImage {
    pub(crate) fn new(img: &GrayImageView<'_>) -> Self {
        let w = img.width;
        let h = img.height;
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0u64;
            for x in 0..w {
                row += img.data[y * w + x] as u64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self {
            width: w,
            height: h,
            sums,
        }
    }

    /// Sum over the half-open box `[x0, x1) × [y0, y1)`.
    #[inline]
    fn box_sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let s = self.width + 1;
        self.sums[y1 * s + x1] + self.sums[y0 * s + x0]
            - self.sums[y0 * s + x1]
            - self.sums[y1 * s + x0]
    }

    /// Inverted binary threshold against the local mean.
    ///
    /// A pixel becomes foreground (255) when it is at least `constant` darker
    /// than the mean of the `window × window` box around it (the box is
    /// clipped at the image border). `window` must be odd.
    pub(crate) fn threshold_inv(
        &self,
        img: &GrayImageView<'_>,
        window: usize,
        constant: f64,
    ) -> ImageGray {
        let (w, h) = (self.width, self.height);
        let r = window / 2;
        let mut out = ImageGray::new(w as u32, h as u32);
        for y in 0..h {
            let y0 = y.saturating_sub(r);
            let y1 = (y + r + 1).min(h);
            for x in 0..w {
                let x0 = x.saturating_sub(r);
                let x1 = (x + r + 1).min(w);
                let area = ((x1 - x0) * (y1 - y0)) as f64;
                let mean = self.box_sum(x0, y0, x1, y1) as f64 / area;
                let v = img.data[y * w + x] as f64;
                if v <= mean - constant {
                    out.put_pixel(x as u32, y as u32, Luma([255u8]));
                }
            }
        }
        out
    }
}

/// Mean and standard deviation of a sample set.
pub(crate) fn mean_std(samples: &[u8]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}

/// Compute Otsu threshold from a set of sample intensities.
///
/// Values `<= threshold` form the dark class.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let (min_v, max_v) = samples
        .iter()
        .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucam_core::GrayImage;

    #[test]
    fn otsu_splits_bimodal_samples() {
        let mut samples = vec![20u8; 40];
        samples.extend(std::iter::repeat(30u8).take(10));
        samples.extend(std::iter::repeat(220u8).take(50));
        let t = otsu_threshold_from_samples(&samples);
        assert!((30..220).contains(&t), "threshold {t}");
    }

    #[test]
    fn two_level_samples_split_in_the_middle() {
        assert_eq!(otsu_threshold_from_samples(&[0, 255, 0, 255]), 127);
        assert_eq!(otsu_threshold_from_samples(&[9, 9, 9]), 9);
    }

    #[test]
    fn mean_std_of_constant_is_zero() {
        let (m, s) = mean_std(&[42; 16]);
        assert_eq!(m, 42.0);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn dark_square_edges_become_foreground() {
        let mut img = GrayImage::filled(20, 20, 255);
        for y in 5..15 {
            for x in 5..15 {
                img.put(x, y, 0);
            }
        }
        let integral = IntegralImage::new(&img.view());
        let bin = integral.threshold_inv(&img.view(), 5, 7.0);

        // Dark pixel next to the bright background is well below the local mean.
        assert_eq!(bin.get_pixel(5, 5)[0], 255);
        // Uniform areas never pass `v <= mean - C`.
        assert_eq!(bin.get_pixel(0, 0)[0], 0);
        assert_eq!(bin.get_pixel(10, 10)[0], 0);
    }
}
