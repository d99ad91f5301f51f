//! Display sinks.

use std::path::{Path, PathBuf};

use arucam_core::ColorFrame;

use crate::convert::rgb_from_color_frame;

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error("display not open")]
    NotOpen,
    #[error("cannot prepare output directory {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Where annotated frames go.
pub trait Display {
    fn open(&mut self, window: &str) -> Result<(), DisplayError>;
    fn show(&mut self, frame: &ColorFrame) -> Result<(), DisplayError>;
    /// Close the window. Called once by the loop; must tolerate repeats.
    fn close(&mut self);
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn open(&mut self, window: &str) -> Result<(), DisplayError> {
        (**self).open(window)
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<(), DisplayError> {
        (**self).show(frame)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Accepts frames without rendering them.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    open: bool,
    shown: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl Display for HeadlessDisplay {
    fn open(&mut self, window: &str) -> Result<(), DisplayError> {
        log::debug!("headless display {window:?}");
        self.open = true;
        Ok(())
    }

    fn show(&mut self, _frame: &ColorFrame) -> Result<(), DisplayError> {
        if !self.open {
            return Err(DisplayError::NotOpen);
        }
        self.shown += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Writes each shown frame as `<dir>/<window>_<index:06>.png`.
///
/// Malformed frames are skipped with a warning; `every_nth` thins the output.
#[derive(Debug)]
pub struct FrameDumpDisplay {
    dir: PathBuf,
    every_nth: u64,
    prefix: Option<String>,
    shown: u64,
    written: u64,
}

impl FrameDumpDisplay {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            every_nth: 1,
            prefix: None,
            shown: 0,
            written: 0,
        }
    }

    pub fn every_nth(mut self, n: u64) -> Self {
        self.every_nth = n.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl Display for FrameDumpDisplay {
    fn open(&mut self, window: &str) -> Result<(), DisplayError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| DisplayError::Output {
            path: self.dir.clone(),
            source,
        })?;
        self.prefix = Some(sanitize_window_name(window));
        log::info!("writing frames to {}", self.dir.display());
        Ok(())
    }

    fn show(&mut self, frame: &ColorFrame) -> Result<(), DisplayError> {
        let prefix = self.prefix.as_deref().ok_or(DisplayError::NotOpen)?;
        let nth = self.shown;
        self.shown += 1;
        if nth % self.every_nth != 0 {
            return Ok(());
        }

        let Some(img) = rgb_from_color_frame(frame) else {
            log::warn!("frame {} is malformed, not written", frame.index);
            return Ok(());
        };

        let path = self.dir.join(format!("{prefix}_{:06}.png", frame.index));
        img.save(&path)
            .map_err(|source| DisplayError::Write { path, source })?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.prefix.take().is_some() {
            log::info!("{} frames written to {}", self.written, self.dir.display());
        }
    }
}

/// Keep `[A-Za-z0-9_-]`, map everything else to `_`.
pub fn sanitize_window_name(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.is_empty() {
        "frame".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_names_are_file_safe() {
        assert_eq!(sanitize_window_name("Live Camera Feed"), "Live_Camera_Feed");
        assert_eq!(sanitize_window_name("a/b"), "a_b");
        assert_eq!(sanitize_window_name(""), "frame");
    }

    #[test]
    fn dump_writes_numbered_pngs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut display = FrameDumpDisplay::new(dir.path().join("out")).every_nth(2);
        display.open("Live Camera Feed").expect("open");
        for i in 0..3 {
            display
                .show(&ColorFrame::filled(i, 4, 3, [1, 2, 3]))
                .expect("show");
        }
        display.close();

        assert_eq!(display.frames_written(), 2);
        let first = dir.path().join("out/Live_Camera_Feed_000000.png");
        let img = image::open(&first).expect("png").to_rgb8();
        assert_eq!(img.get_pixel(3, 2).0, [1, 2, 3]);
        assert!(dir.path().join("out/Live_Camera_Feed_000002.png").exists());
        assert!(!dir.path().join("out/Live_Camera_Feed_000001.png").exists());
    }

    #[test]
    fn show_requires_open() {
        let mut headless = HeadlessDisplay::new();
        assert!(matches!(
            headless.show(&ColorFrame::filled(0, 1, 1, [0; 3])),
            Err(DisplayError::NotOpen)
        ));
        headless.open("w").expect("open");
        headless.show(&ColorFrame::filled(0, 1, 1, [0; 3])).expect("show");
        assert_eq!(headless.frames_shown(), 1);
    }
}
