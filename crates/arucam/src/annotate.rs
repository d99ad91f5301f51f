//! Detection overlays drawn in place on color frames.

use arucam_aruco::DetectionResult;
use arucam_core::{ColorFrame, Quad};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

type Canvas<'a> = ImageBuffer<Rgb<u8>, &'a mut [u8]>;

/// Colors and sizes of the overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    pub outline: [u8; 3],
    pub first_corner: [u8; 3],
    pub text: [u8; 3],
    pub rejected: [u8; 3],
    /// Outline width in pixels.
    pub thickness: u32,
    /// Side of the square marking corner 0.
    pub corner_size: u32,
    /// Pixel size of one font dot.
    pub text_scale: u32,
    pub draw_rejected: bool,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            outline: [0, 255, 0],
            first_corner: [255, 0, 0],
            text: [0, 0, 255],
            rejected: [255, 0, 255],
            thickness: 2,
            corner_size: 6,
            text_scale: 2,
            draw_rejected: false,
        }
    }
}

/// Draws marker outlines, the first corner and `id=N` labels.
#[derive(Clone, Debug, Default)]
pub struct Annotator {
    style: AnnotationStyle,
}

impl Annotator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Whether `draw` would change anything for this result.
    pub fn has_work(&self, result: &DetectionResult) -> bool {
        !result.markers.is_empty() || (self.style.draw_rejected && !result.rejected.is_empty())
    }

    /// Draw the overlay into `frame`. Returns `false` (frame untouched) when
    /// there is nothing to draw or the frame buffer is malformed.
    pub fn draw(&self, frame: &mut ColorFrame, result: &DetectionResult) -> bool {
        if !self.has_work(result) {
            return false;
        }
        if let Err(err) = frame.check_shape() {
            log::warn!("not annotating frame {}: {err}", frame.index);
            return false;
        }
        let (w, h) = (frame.width as u32, frame.height as u32);
        let Some(mut canvas) = Canvas::from_raw(w, h, frame.data.as_mut_slice()) else {
            return false;
        };

        let s = &self.style;
        if s.draw_rejected {
            for quad in &result.rejected {
                draw_quad(&mut canvas, quad, Rgb(s.rejected), 1);
            }
        }
        for m in &result.markers {
            draw_quad(&mut canvas, &m.corners, Rgb(s.outline), s.thickness);

            let c0 = m.corners[0];
            let half = (s.corner_size / 2) as i32;
            let size = s.corner_size.max(1);
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(c0.x.round() as i32 - half, c0.y.round() as i32 - half).of_size(size, size),
                Rgb(s.first_corner),
            );

            let label = format!("id={}", m.id);
            let x = c0.x.round() as i32 + half + 2;
            let y = c0.y.round() as i32 - (GLYPH_H as i32 * s.text_scale as i32) - half - 2;
            draw_text(&mut canvas, &label, x, y, s.text_scale.max(1), Rgb(s.text));
        }
        true
    }
}

fn draw_quad(canvas: &mut Canvas<'_>, q: &Quad, color: Rgb<u8>, thickness: u32) {
    let t = thickness.max(1) as i32;
    let lo = -(t - 1) / 2;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        for oy in lo..lo + t {
            for ox in lo..lo + t {
                draw_line_segment_mut(
                    canvas,
                    (a.x + ox as f32, a.y + oy as f32),
                    (b.x + ox as f32, b.y + oy as f32),
                    color,
                );
            }
        }
    }
}

const GLYPH_W: usize = 5;
const GLYPH_H: usize = 7;

/// 5x7 dot patterns, one row per byte, bit 4 is the leftmost column.
fn glyph(c: char) -> Option<[u8; GLYPH_H]> {
    let rows = match c {
        '0' => [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
        '1' => [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
        '2' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
        '3' => [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
        '4' => [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
        '5' => [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
        '6' => [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
        '7' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
        '9' => [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
        'i' => [0x04, 0x00, 0x0c, 0x04, 0x04, 0x04, 0x0e],
        'd' => [0x01, 0x01, 0x0d, 0x13, 0x11, 0x11, 0x0f],
        '=' => [0x00, 0x00, 0x1f, 0x00, 0x1f, 0x00, 0x00],
        _ => return None,
    };
    Some(rows)
}

fn draw_text(canvas: &mut Canvas<'_>, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let advance = (GLYPH_W as i32 + 1) * scale as i32;
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        let gx = x + i as i32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) != 0 {
                    draw_filled_rect_mut(
                        canvas,
                        Rect::at(
                            gx + (col as u32 * scale) as i32,
                            y + (row as u32 * scale) as i32,
                        )
                        .of_size(scale, scale),
                        color,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arucam_aruco::DetectedMarker;
    use nalgebra::Point2;

    fn square(x: f32, y: f32, s: f32) -> Quad {
        [
            Point2::new(x, y),
            Point2::new(x + s, y),
            Point2::new(x + s, y + s),
            Point2::new(x, y + s),
        ]
    }

    fn one_marker() -> DetectionResult {
        DetectionResult {
            markers: vec![DetectedMarker {
                id: 12,
                corners: square(40.0, 40.0, 30.0),
                rotation: 0,
                hamming: 0,
                inverted: false,
            }],
            rejected: vec![square(5.0, 5.0, 10.0)],
        }
    }

    #[test]
    fn empty_result_leaves_frame_untouched() {
        let mut frame = ColorFrame::filled(0, 64, 48, [200, 200, 200]);
        let before = frame.clone();
        assert!(!Annotator::default().draw(&mut frame, &DetectionResult::default()));
        assert_eq!(frame, before);
    }

    #[test]
    fn draws_outline_corner_and_label() {
        let mut frame = ColorFrame::filled(0, 120, 100, [255, 255, 255]);
        let style = AnnotationStyle::default();
        assert!(Annotator::new(style.clone()).draw(&mut frame, &one_marker()));

        // Middle of the top edge.
        assert_eq!(frame.pixel(55, 40), Some(style.outline));
        // Corner 0 square overrides the outline.
        assert_eq!(frame.pixel(40, 40), Some(style.first_corner));
        // Label sits above and right of corner 0.
        let label_pixels = (44..100)
            .flat_map(|x| (20..40).map(move |y| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y) == Some(style.text))
            .count();
        assert!(label_pixels > 20, "label pixels {label_pixels}");
        // Interior and rejected quad untouched by default.
        assert_eq!(frame.pixel(55, 55), Some([255, 255, 255]));
        assert_eq!(frame.pixel(10, 5), Some([255, 255, 255]));
    }

    #[test]
    fn rejected_outlines_are_opt_in() {
        let mut frame = ColorFrame::filled(0, 120, 100, [255, 255, 255]);
        let style = AnnotationStyle {
            draw_rejected: true,
            ..Default::default()
        };
        let only_rejected = DetectionResult {
            markers: Vec::new(),
            rejected: one_marker().rejected,
        };
        assert!(Annotator::new(style.clone()).draw(&mut frame, &only_rejected));
        assert_eq!(frame.pixel(10, 5), Some(style.rejected));
    }

    #[test]
    fn drawing_is_clipped_and_malformed_frames_skipped() {
        let mut frame = ColorFrame::filled(0, 50, 50, [0, 0, 0]);
        let off_edge = DetectionResult {
            markers: vec![DetectedMarker {
                id: 3,
                corners: square(30.0, -10.0, 40.0),
                rotation: 0,
                hamming: 0,
                inverted: false,
            }],
            rejected: Vec::new(),
        };
        assert!(Annotator::default().draw(&mut frame, &off_edge));
        assert!(frame.check_shape().is_ok());

        let mut broken = ColorFrame {
            index: 1,
            width: 10,
            height: 10,
            data: vec![0; 7],
        };
        assert!(!Annotator::default().draw(&mut broken, &off_edge));
        assert_eq!(broken.data, vec![0; 7]);
    }
}
