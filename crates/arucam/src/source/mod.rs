//! Frame sources.

mod sequence;
mod synthetic;

use std::path::PathBuf;

use arucam_core::ColorFrame;

pub use sequence::{ImageSequenceSource, SequenceOptions};
pub use synthetic::{SyntheticOptions, SyntheticSource};

/// Failure to deliver a frame.
///
/// Every variant means the source is unavailable for the rest of the run;
/// callers do not retry.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("cannot open video source {uri:?}: {reason}")]
    Open { uri: String, reason: String },
    #[error("video device failure: {0}")]
    Device(String),
    #[error("end of stream")]
    EndOfStream,
}

impl SourceError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SourceError::EndOfStream)
    }
}

/// A producer of color frames.
pub trait FrameSource {
    /// Next frame. Frame indices increase by one per successful call.
    fn acquire(&mut self) -> Result<ColorFrame, SourceError>;

    /// Release the underlying device or files. Called once by the loop.
    fn release(&mut self);

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self) -> Result<ColorFrame, SourceError> {
        (**self).acquire()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// What `--source` refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    /// Capture device, by index (`0` is `/dev/video0`).
    Device(u32),
    /// Rendered markers from the active dictionary.
    Synthetic,
    /// Image file or directory of images.
    Path(PathBuf),
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("synthetic") {
            return SourceSpec::Synthetic;
        }
        if let Some(index) = parse_device_index(raw) {
            return SourceSpec::Device(index);
        }
        SourceSpec::Path(PathBuf::from(raw))
    }
}

/// Parse `N` or `/dev/videoN`.
pub(crate) fn parse_device_index(uri: &str) -> Option<u32> {
    if let Ok(index) = uri.parse::<u32>() {
        return Some(index);
    }
    let digits = uri.strip_prefix("/dev/video")?;
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.parse().ok();
    }
    None
}

/// Capture devices need a platform backend, which this build does not ship.
pub fn open_device(index: u32) -> Result<Box<dyn FrameSource>, SourceError> {
    Err(SourceError::Open {
        uri: format!("/dev/video{index}"),
        reason: "no capture backend available in this build; use an image directory or `synthetic`"
            .to_string(),
    })
}
