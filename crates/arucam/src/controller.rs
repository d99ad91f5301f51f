//! The acquire → detect → annotate → display cycle and its termination.

use std::time::{Duration, Instant};

use arucam_aruco::{DetectionResult, MarkerDetector};
use serde::Serialize;

use crate::annotate::Annotator;
use crate::display::{Display, DisplayError};
use crate::preprocess::to_grayscale;
use crate::source::{FrameSource, SourceError};
use crate::stop::StopSignal;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Loop lifecycle. Transitions only go forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop signal fired.
    UserRequested,
    /// The source reported end of stream.
    SourceExhausted,
    /// The source failed to open or deliver.
    SourceFailed,
    /// `max_cycles` was reached.
    CycleLimit,
    /// The display failed; the run ends with an error.
    DisplayFailed,
}

#[derive(thiserror::Error, Debug)]
pub enum LoopError {
    #[error("display failed on cycle {cycle}: {source}")]
    Display {
        cycle: u64,
        #[source]
        source: DisplayError,
    },
}

#[derive(Clone, Debug)]
pub struct LoopSettings {
    pub window_name: String,
    /// How long the stop signal is polled after each displayed frame.
    pub refresh_interval: Duration,
    pub max_cycles: Option<u64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            window_name: "Live Camera Feed".to_string(),
            refresh_interval: Duration::from_millis(1),
            max_cycles: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoopSummary {
    /// Frames acquired and displayed.
    pub cycles: u64,
    pub frames_with_markers: u64,
    pub markers: u64,
    pub invalid_frames: u64,
    pub stop_reason: Option<StopReason>,
    pub final_state: LoopState,
    /// Mean detector time per valid frame, milliseconds.
    pub mean_detect_ms: f64,
}

/// Source and display, released together exactly once (also on drop).
struct Resources<S: FrameSource, D: Display> {
    source: S,
    display: D,
    released: bool,
}

impl<S: FrameSource, D: Display> Resources<S, D> {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.release();
        self.display.close();
        log::debug!("released {}", self.source.describe());
    }
}

impl<S: FrameSource, D: Display> Drop for Resources<S, D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Drives the per-frame cycle until the stop signal fires or the source runs
/// dry.
///
/// Invalid frames are logged and shown unannotated; the loop keeps going.
/// A failing display is fatal: resources are released and the error returned.
pub struct LoopController<S: FrameSource, D: Display, T: StopSignal> {
    res: Resources<S, D>,
    stop: T,
    detector: MarkerDetector,
    annotator: Annotator,
    settings: LoopSettings,
    state: LoopState,
    opened: bool,
    summary: LoopSummary,
    detect_time: Duration,
    detected_frames: u64,
}

impl<S: FrameSource, D: Display, T: StopSignal> LoopController<S, D, T> {
    pub fn new(
        source: S,
        display: D,
        stop: T,
        detector: MarkerDetector,
        annotator: Annotator,
        settings: LoopSettings,
    ) -> Self {
        Self {
            res: Resources {
                source,
                display,
                released: false,
            },
            stop,
            detector,
            annotator,
            settings,
            state: LoopState::Running,
            opened: false,
            summary: LoopSummary {
                cycles: 0,
                frames_with_markers: 0,
                markers: 0,
                invalid_frames: 0,
                stop_reason: None,
                final_state: LoopState::Running,
                mean_detect_ms: 0.0,
            },
            detect_time: Duration::ZERO,
            detected_frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> LoopSummary {
        let mut s = self.summary.clone();
        s.final_state = self.state;
        if self.detected_frames > 0 {
            s.mean_detect_ms = self.detect_time.as_secs_f64() * 1e3 / self.detected_frames as f64;
        }
        s
    }

    /// Run one cycle. Returns the state after the cycle.
    pub fn step(&mut self) -> Result<LoopState, LoopError> {
        match self.state {
            LoopState::Running => {}
            LoopState::Stopping => {
                self.finish();
                return Ok(self.state);
            }
            LoopState::Stopped => return Ok(self.state),
        }

        if !self.opened {
            self.opened = true;
            if let Err(source) = self.res.display.open(&self.settings.window_name) {
                return Err(self.fail(source));
            }
        }

        let mut frame = match self.res.source.acquire() {
            Ok(frame) => frame,
            Err(err) => {
                let reason = match err {
                    SourceError::EndOfStream => {
                        log::info!("source exhausted after {} frames", self.summary.cycles);
                        StopReason::SourceExhausted
                    }
                    other => {
                        log::warn!("source unavailable: {other}");
                        StopReason::SourceFailed
                    }
                };
                self.request_stop(reason);
                self.finish();
                return Ok(self.state);
            }
        };

        if let Some(result) = self.detect(&frame) {
            if self.annotator.has_work(&result) {
                self.annotator.draw(&mut frame, &result);
            }
        }

        if let Err(source) = self.res.display.show(&frame) {
            return Err(self.fail(source));
        }
        self.summary.cycles += 1;

        if self.stop.poll(self.settings.refresh_interval) {
            log::info!("stop requested");
            self.request_stop(StopReason::UserRequested);
        } else if self
            .settings
            .max_cycles
            .is_some_and(|max| self.summary.cycles >= max)
        {
            self.request_stop(StopReason::CycleLimit);
        }

        if self.state == LoopState::Stopping {
            self.finish();
        }
        Ok(self.state)
    }

    /// Run until stopped; resources are released before returning.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn run(mut self) -> Result<LoopSummary, LoopError> {
        log::info!(
            "loop started: {} -> {:?}",
            self.res.source.describe(),
            self.settings.window_name
        );
        while self.step()? != LoopState::Stopped {}
        let summary = self.summary();
        log::info!(
            "loop stopped ({:?}): {} cycles, {} markers, {} invalid frames",
            summary.stop_reason,
            summary.cycles,
            summary.markers,
            summary.invalid_frames
        );
        Ok(summary)
    }

    /// Preprocess and detect. `None` for invalid frames.
    fn detect(&mut self, frame: &arucam_core::ColorFrame) -> Option<DetectionResult> {
        let gray = match to_grayscale(frame) {
            Ok(gray) => gray,
            Err(err) => {
                log::warn!("{err}; showing frame unannotated");
                self.summary.invalid_frames += 1;
                return None;
            }
        };

        let t0 = Instant::now();
        let result = match self.detector.detect(&gray.view()) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("frame {}: {err}; showing frame unannotated", frame.index);
                self.summary.invalid_frames += 1;
                return None;
            }
        };
        self.detect_time += t0.elapsed();
        self.detected_frames += 1;

        if !result.markers.is_empty() {
            self.summary.frames_with_markers += 1;
            self.summary.markers += result.markers.len() as u64;
            log::debug!("frame {}: ids {:?}", frame.index, result.ids());
        }
        Some(result)
    }

    fn request_stop(&mut self, reason: StopReason) {
        if self.state == LoopState::Running {
            self.state = LoopState::Stopping;
            self.summary.stop_reason = Some(reason);
        }
    }

    fn finish(&mut self) {
        self.res.release();
        self.state = LoopState::Stopped;
    }

    fn fail(&mut self, source: DisplayError) -> LoopError {
        log::error!("display failed: {source}");
        self.request_stop(StopReason::DisplayFailed);
        self.finish();
        LoopError::Display {
            cycle: self.summary.cycles,
            source,
        }
    }
}
