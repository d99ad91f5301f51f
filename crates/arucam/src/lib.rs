//! Live fiducial marker detection.
//!
//! This crate wires the marker detector in [`aruco`] into a continuous
//! acquire → detect → annotate → display loop:
//!
//! - [`source`]: frame sources (image sequences, a synthetic scene; capture
//!   devices report that no backend is available),
//! - [`preprocess`]: RGB to luma conversion with frame validation,
//! - [`annotate`]: marker outlines, first-corner squares and `id=N` labels,
//! - [`display`]: headless and PNG frame-dump sinks,
//! - [`stop`]: keyboard stop signal fed by a reader thread,
//! - [`controller`]: the loop state machine, guaranteeing source and display
//!   are released exactly once,
//! - [`config`]: JSON configuration and the builders that assemble a loop.
//!
//! ## Quickstart
//!
//! ```no_run
//! use arucam::config::LiveConfig;
//! use arucam::stop::KeyListener;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = LiveConfig {
//!     max_cycles: Some(100),
//!     ..Default::default()
//! };
//! let summary = cfg.build_loop(KeyListener::stdin(cfg.quit_key))?.run()?;
//! println!("{} markers in {} frames", summary.markers, summary.cycles);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `arucam::core`: image containers, geometry, homography, logger.
//! - `arucam::aruco`: dictionaries, matching and the marker detector.

pub use arucam_aruco as aruco;
pub use arucam_core as core;

pub mod annotate;
pub mod config;
pub mod controller;
pub mod convert;
pub mod display;
pub mod preprocess;
pub mod report;
pub mod source;
pub mod stop;

pub use annotate::{AnnotationStyle, Annotator};
pub use config::{ConfigError, LiveConfig};
pub use controller::{LoopController, LoopError, LoopSettings, LoopState, LoopSummary, StopReason};
pub use display::{Display, DisplayError, FrameDumpDisplay, HeadlessDisplay};
pub use source::{FrameSource, SourceError};
pub use stop::{KeyListener, NeverStop, StopSignal};
