use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arucam::aruco::{builtin_dictionary, DetectorParameters, MarkerDetector};
use arucam::config::LiveConfig;
use arucam::core::ColorFrame;
use arucam::source::{SyntheticOptions, SyntheticSource};
use arucam::{
    AnnotationStyle, Annotator, Display, DisplayError, FrameSource, LoopController, LoopError,
    LoopSettings, LoopState, NeverStop, SourceError, StopReason, StopSignal,
};

/// Counters shared between a test and the mocks it hands to the loop.
#[derive(Clone, Default)]
struct Probe {
    released: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    shown: Arc<Mutex<Vec<ColorFrame>>>,
}

impl Probe {
    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn shown(&self) -> Vec<ColorFrame> {
        self.shown.lock().expect("lock").clone()
    }
}

/// Plays back a fixed list of frames, then reports the device as gone.
struct ScriptedSource {
    frames: std::vec::IntoIter<ColorFrame>,
    probe: Probe,
}

impl ScriptedSource {
    fn new(frames: Vec<ColorFrame>, probe: &Probe) -> Self {
        Self {
            frames: frames.into_iter(),
            probe: probe.clone(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn acquire(&mut self) -> Result<ColorFrame, SourceError> {
        self.frames
            .next()
            .ok_or_else(|| SourceError::Device("camera unplugged".into()))
    }

    fn release(&mut self) {
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

struct RecordingDisplay {
    probe: Probe,
    fail_on: Option<usize>,
}

impl RecordingDisplay {
    fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            fail_on: None,
        }
    }
}

impl Display for RecordingDisplay {
    fn open(&mut self, _window: &str) -> Result<(), DisplayError> {
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<(), DisplayError> {
        let mut shown = self.probe.shown.lock().expect("lock");
        if self.fail_on == Some(shown.len()) {
            return Err(DisplayError::NotOpen);
        }
        shown.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Requests a stop on the given poll (1-based).
struct StopOnPoll {
    polls: usize,
    stop_at: usize,
}

impl StopSignal for StopOnPoll {
    fn poll(&mut self, _wait: Duration) -> bool {
        self.polls += 1;
        self.polls >= self.stop_at
    }
}

fn detector() -> MarkerDetector {
    let dict = builtin_dictionary("GEN_6X6_250").expect("dict");
    MarkerDetector::new(dict, DetectorParameters::default()).expect("detector")
}

/// Frame `index` of a synthetic scene with three markers.
fn marker_frame(index: u64) -> ColorFrame {
    let dict = builtin_dictionary("GEN_6X6_250").expect("dict");
    let src = SyntheticSource::new(
        dict,
        SyntheticOptions {
            frame_interval: None,
            ..Default::default()
        },
    )
    .expect("synthetic");
    src.render(index)
}

fn blank_frame(index: u64) -> ColorFrame {
    ColorFrame::filled(index, 64, 48, [255, 255, 255])
}

fn contains_color(frame: &ColorFrame, rgb: [u8; 3]) -> bool {
    frame.data.chunks_exact(3).any(|px| px == rgb)
}

#[test]
fn source_unavailable_after_three_frames_stops_cleanly() {
    let probe = Probe::default();
    let frames = (0..3).map(blank_frame).collect();
    let ctl = LoopController::new(
        ScriptedSource::new(frames, &probe),
        RecordingDisplay::new(&probe),
        NeverStop,
        detector(),
        Annotator::default(),
        LoopSettings::default(),
    );

    let summary = ctl.run().expect("clean stop");
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.final_state, LoopState::Stopped);
    assert_eq!(summary.stop_reason, Some(StopReason::SourceFailed));
    assert_eq!(probe.shown().len(), 3);
    assert_eq!(probe.released(), 1);
    assert_eq!(probe.closed(), 1);
    assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
}

#[test]
fn invalid_frame_is_shown_unannotated_and_the_loop_continues() {
    let probe = Probe::default();
    let broken = ColorFrame {
        index: 1,
        width: 640,
        height: 480,
        data: vec![0; 100],
    };
    let frames = vec![marker_frame(0), broken.clone(), marker_frame(2)];
    let style = AnnotationStyle::default();
    let ctl = LoopController::new(
        ScriptedSource::new(frames, &probe),
        RecordingDisplay::new(&probe),
        NeverStop,
        detector(),
        Annotator::new(style.clone()),
        LoopSettings::default(),
    );

    let summary = ctl.run().expect("run");
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.invalid_frames, 1);
    assert_eq!(summary.frames_with_markers, 2);

    let shown = probe.shown();
    assert_eq!(shown.len(), 3);
    assert_eq!(shown[1], broken);
    assert!(contains_color(&shown[0], style.outline));
    assert!(contains_color(&shown[2], style.outline));
}

#[test]
fn stop_on_second_cycle_releases_everything_once() {
    let probe = Probe::default();
    let frames = (0..10).map(blank_frame).collect();
    let ctl = LoopController::new(
        ScriptedSource::new(frames, &probe),
        RecordingDisplay::new(&probe),
        StopOnPoll {
            polls: 0,
            stop_at: 2,
        },
        detector(),
        Annotator::default(),
        LoopSettings::default(),
    );

    let summary = ctl.run().expect("run");
    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.stop_reason, Some(StopReason::UserRequested));
    assert_eq!(probe.released(), 1);
    assert_eq!(probe.closed(), 1);
}

#[test]
fn frames_without_markers_are_shown_untouched() {
    let probe = Probe::default();
    let frames = vec![blank_frame(0), blank_frame(1)];
    let ctl = LoopController::new(
        ScriptedSource::new(frames.clone(), &probe),
        RecordingDisplay::new(&probe),
        NeverStop,
        detector(),
        Annotator::default(),
        LoopSettings::default(),
    );
    let summary = ctl.run().expect("run");
    assert_eq!(summary.markers, 0);
    assert_eq!(probe.shown(), frames);
}

#[test]
fn display_failure_is_an_error_after_release() {
    let probe = Probe::default();
    let frames = (0..5).map(blank_frame).collect();
    let display = RecordingDisplay {
        probe: probe.clone(),
        fail_on: Some(1),
    };
    let ctl = LoopController::new(
        ScriptedSource::new(frames, &probe),
        display,
        NeverStop,
        detector(),
        Annotator::default(),
        LoopSettings::default(),
    );

    let err = ctl.run().expect_err("display failure");
    assert!(matches!(err, LoopError::Display { cycle: 1, .. }));
    assert_eq!(probe.released(), 1);
    assert_eq!(probe.closed(), 1);
}

#[test]
fn dropping_an_unfinished_loop_releases_resources() {
    let probe = Probe::default();
    let frames = (0..5).map(blank_frame).collect();
    let mut ctl = LoopController::new(
        ScriptedSource::new(frames, &probe),
        RecordingDisplay::new(&probe),
        NeverStop,
        detector(),
        Annotator::default(),
        LoopSettings::default(),
    );
    assert_eq!(ctl.step().expect("step"), LoopState::Running);
    assert_eq!(probe.released(), 0);
    drop(ctl);
    assert_eq!(probe.released(), 1);
    assert_eq!(probe.closed(), 1);
}

#[test]
fn synthetic_config_detects_every_marker() {
    let cfg = LiveConfig {
        max_cycles: Some(4),
        synthetic: SyntheticOptions {
            frame_interval: None,
            ..Default::default()
        },
        ..Default::default()
    };
    let summary = cfg.build_loop(NeverStop).expect("build").run().expect("run");
    assert_eq!(summary.cycles, 4);
    assert_eq!(summary.frames_with_markers, 4);
    assert_eq!(summary.markers, 12);
    assert_eq!(summary.invalid_frames, 0);
    assert!(matches!(
        summary.stop_reason,
        Some(StopReason::CycleLimit) | Some(StopReason::SourceExhausted)
    ));
}
