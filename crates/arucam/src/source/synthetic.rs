use std::thread;
use std::time::Duration;

use arucam_aruco::{draw_marker, Dictionary, MarkerPlacement};
use arucam_core::{ColorFrame, GrayImage};
use serde::{Deserialize, Serialize};

use super::{FrameSource, SourceError};

/// Layout of the rendered scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticOptions {
    pub width: usize,
    pub height: usize,
    /// Marker ids to draw, left to right.
    pub ids: Vec<u32>,
    pub cell_px: f32,
    /// Horizontal drift per frame in pixels; markers wrap around.
    pub drift_px: f32,
    /// Stop after this many frames (`None` runs forever).
    pub frames: Option<u64>,
    #[serde(with = "crate::config::millis_opt")]
    pub frame_interval: Option<Duration>,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            ids: vec![0, 1, 2],
            cell_px: 12.0,
            drift_px: 3.0,
            frames: None,
            frame_interval: Some(Duration::from_millis(33)),
        }
    }
}

/// Renders dictionary markers onto a white canvas, drifting a little each
/// frame.
pub struct SyntheticSource {
    dict: Dictionary,
    opts: SyntheticOptions,
    next_index: u64,
    released: bool,
}

impl SyntheticSource {
    pub fn new(dict: Dictionary, opts: SyntheticOptions) -> Result<Self, SourceError> {
        let open_err = |reason: String| SourceError::Open {
            uri: "synthetic".to_string(),
            reason,
        };
        if opts.width == 0 || opts.height == 0 {
            return Err(open_err(format!(
                "canvas {}x{} is empty",
                opts.width, opts.height
            )));
        }
        if let Some(&bad) = opts.ids.iter().find(|&&id| id as usize >= dict.len()) {
            return Err(open_err(format!(
                "marker id {bad} not in dictionary {} ({} ids)",
                dict.name,
                dict.len()
            )));
        }
        if opts.cell_px.is_nan() || opts.cell_px < 1.0 {
            return Err(open_err(format!("cell_px {} must be >= 1", opts.cell_px)));
        }
        Ok(Self {
            dict,
            opts,
            next_index: 0,
            released: false,
        })
    }

    /// Render frame `index` without advancing the source.
    pub fn render(&self, index: u64) -> ColorFrame {
        let o = &self.opts;
        let mut canvas = GrayImage::filled(o.width, o.height, 255);
        let side = (self.dict.marker_size + 2) as f32 * o.cell_px;
        let pitch = side * 1.5;
        let span = (pitch * o.ids.len() as f32).max(o.width as f32);
        let y = ((o.height as f32 - side) * 0.5).max(0.0).round();
        let shift = (index as f32 * o.drift_px).rem_euclid(span);

        for (slot, &id) in o.ids.iter().enumerate() {
            let x = (side * 0.25 + slot as f32 * pitch + shift).rem_euclid(span).round();
            if let Some(code) = self.dict.code(id) {
                draw_marker(
                    &mut canvas,
                    code,
                    self.dict.marker_size,
                    &MarkerPlacement::axis_aligned(x, y, o.cell_px),
                );
            }
        }
        ColorFrame::from_gray(index, &canvas.view())
    }
}

impl FrameSource for SyntheticSource {
    fn acquire(&mut self) -> Result<ColorFrame, SourceError> {
        if self.released {
            return Err(SourceError::Device("source already released".to_string()));
        }
        if self.opts.frames.is_some_and(|n| self.next_index >= n) {
            return Err(SourceError::EndOfStream);
        }
        if let Some(interval) = self.opts.frame_interval {
            if self.next_index > 0 {
                thread::sleep(interval);
            }
        }
        let frame = self.render(self.next_index);
        self.next_index += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn describe(&self) -> String {
        format!(
            "synthetic:{}x{} {} ids={:?}",
            self.opts.width, self.opts.height, self.dict.name, self.opts.ids
        )
    }
}
