use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use arucam_core::ColorFrame;
use image::ImageReader;

use super::{FrameSource, SourceError};
use crate::convert::color_frame_from_rgb;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "pgm", "ppm", "pnm"];

#[derive(Clone, Debug, Default)]
pub struct SequenceOptions {
    /// Restart from the first file after the last one.
    pub loop_playback: bool,
    /// Minimum time between delivered frames.
    pub frame_interval: Option<Duration>,
}

/// Plays back a directory of images (sorted by file name) or a single image.
///
/// Files that fail to decode are skipped with a warning.
pub struct ImageSequenceSource {
    root: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    next_index: u64,
    opts: SequenceOptions,
    last_delivery: Option<Instant>,
    released: bool,
}

impl ImageSequenceSource {
    pub fn open(path: impl AsRef<Path>, opts: SequenceOptions) -> Result<Self, SourceError> {
        let root = path.as_ref().to_path_buf();
        let open_err = |reason: String| SourceError::Open {
            uri: root.display().to_string(),
            reason,
        };

        let files = if root.is_dir() {
            let entries = std::fs::read_dir(&root).map_err(|e| open_err(e.to_string()))?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect();
            files.sort();
            files
        } else if root.is_file() {
            vec![root.clone()]
        } else {
            return Err(open_err("no such file or directory".to_string()));
        };

        if files.is_empty() {
            return Err(open_err("directory contains no images".to_string()));
        }

        log::info!("image sequence {} ({} files)", root.display(), files.len());
        Ok(Self {
            root,
            files,
            cursor: 0,
            next_index: 0,
            opts,
            last_delivery: None,
            released: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.opts.frame_interval, self.last_delivery) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_delivery = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn acquire(&mut self) -> Result<ColorFrame, SourceError> {
        if self.released {
            return Err(SourceError::Device("source already released".to_string()));
        }

        // One full pass without a decodable file ends the stream even when looping.
        let mut misses = 0usize;
        loop {
            if self.cursor >= self.files.len() {
                if !self.opts.loop_playback {
                    return Err(SourceError::EndOfStream);
                }
                self.cursor = 0;
            }
            if misses >= self.files.len() {
                return Err(SourceError::EndOfStream);
            }

            let path = &self.files[self.cursor];
            self.cursor += 1;
            match load_rgb(path) {
                Ok(img) => {
                    self.pace();
                    let frame = color_frame_from_rgb(self.next_index, img);
                    self.next_index += 1;
                    return Ok(frame);
                }
                Err(err) => {
                    log::warn!("skipping {}: {err}", path.display());
                    misses += 1;
                }
            }
        }
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn describe(&self) -> String {
        format!("images:{}", self.root.display())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

fn load_rgb(path: &Path) -> Result<image::RgbImage, image::ImageError> {
    Ok(ImageReader::open(path)?.decode()?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, value: u8) {
        let img = image::RgbImage::from_pixel(8, 6, image::Rgb([value, value, value]));
        img.save(dir.join(name)).expect("save png");
    }

    #[test]
    fn plays_sorted_files_then_ends() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_png(dir.path(), "b.png", 20);
        write_png(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let mut src = ImageSequenceSource::open(dir.path(), SequenceOptions::default())
            .expect("open");
        assert_eq!(src.len(), 2);

        let f0 = src.acquire().expect("frame 0");
        assert_eq!((f0.index, f0.width, f0.height), (0, 8, 6));
        assert_eq!(f0.pixel(0, 0), Some([10, 10, 10]));
        let f1 = src.acquire().expect("frame 1");
        assert_eq!(f1.index, 1);
        assert_eq!(f1.pixel(0, 0), Some([20, 20, 20]));
        assert!(src.acquire().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn looping_restarts_and_skips_broken_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_png(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("b.png"), b"not a png").expect("write");

        let opts = SequenceOptions {
            loop_playback: true,
            frame_interval: None,
        };
        let mut src = ImageSequenceSource::open(dir.path(), opts).expect("open");
        for expected in 0..3u64 {
            let f = src.acquire().expect("frame");
            assert_eq!(f.index, expected);
        }
    }

    #[test]
    fn missing_or_empty_paths_fail_to_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), SequenceOptions::default()),
            Err(SourceError::Open { .. })
        ));
        assert!(matches!(
            ImageSequenceSource::open(dir.path().join("nope"), SequenceOptions::default()),
            Err(SourceError::Open { .. })
        ));
    }
}
