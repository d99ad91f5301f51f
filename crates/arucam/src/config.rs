//! JSON configuration for the live loop and the builders that turn it into
//! running components.

use std::path::{Path, PathBuf};
use std::time::Duration;

use arucam_aruco::{
    builtin_dictionary, DetectorParameters, Dictionary, DictionaryError, MarkerDetector,
    ParamsError, DEFAULT_DICTIONARY,
};
use serde::{Deserialize, Serialize};

use crate::annotate::{AnnotationStyle, Annotator};
use crate::controller::{LoopController, LoopSettings};
use crate::display::{Display, FrameDumpDisplay, HeadlessDisplay};
use crate::source::{
    open_device, FrameSource, ImageSequenceSource, SequenceOptions, SourceError, SourceSpec,
    SyntheticOptions, SyntheticSource,
};
use crate::stop::StopSignal;

/// Anything that prevents the loop from starting.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error("invalid detector parameters: {0}")]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayBackend {
    #[default]
    Headless,
    FrameDump,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub backend: DisplayBackend,
    pub window_name: String,
    /// Required by `frame_dump`.
    pub output_dir: Option<PathBuf>,
    pub every_nth: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: DisplayBackend::Headless,
            window_name: "Live Camera Feed".to_string(),
            output_dir: None,
            every_nth: 1,
        }
    }
}

/// Full live-loop configuration. Every field has a default, so `{}` is a
/// valid config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// `synthetic`, a device index (`0`, `/dev/video0`), an image or a directory.
    pub source: String,
    /// Built-in dictionary name; ignored when `dictionary_file` is set.
    pub dictionary: String,
    pub dictionary_file: Option<PathBuf>,
    pub detector: DetectorParameters,
    pub annotation: AnnotationStyle,
    pub display: DisplayConfig,
    pub quit_key: char,
    #[serde(with = "millis")]
    pub refresh_interval: Duration,
    pub max_cycles: Option<u64>,
    /// Image sequences only.
    pub loop_playback: bool,
    /// Image sequences only: pace playback to this rate.
    pub fps: Option<f64>,
    pub synthetic: SyntheticOptions,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            source: "synthetic".to_string(),
            dictionary: DEFAULT_DICTIONARY.to_string(),
            dictionary_file: None,
            detector: DetectorParameters::default(),
            annotation: AnnotationStyle::default(),
            display: DisplayConfig::default(),
            quit_key: 'q',
            refresh_interval: Duration::from_millis(1),
            max_cycles: None,
            loop_playback: false,
            fps: None,
            synthetic: SyntheticOptions::default(),
        }
    }
}

impl LiveConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks that do not touch the filesystem or devices.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        if self.quit_key.is_whitespace() {
            return Err(ConfigError::Invalid("quit_key must be visible".into()));
        }
        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ConfigError::Invalid(format!("fps must be > 0, got {fps}")));
            }
        }
        if self.display.backend == DisplayBackend::FrameDump && self.display.output_dir.is_none()
        {
            return Err(ConfigError::Invalid(
                "display backend frame_dump needs display.output_dir".into(),
            ));
        }
        Ok(())
    }

    pub fn resolve_dictionary(&self) -> Result<Dictionary, ConfigError> {
        match &self.dictionary_file {
            Some(path) => Ok(Dictionary::load_json(path)?),
            None => builtin_dictionary(&self.dictionary).ok_or_else(|| {
                DictionaryError::UnknownBuiltin {
                    name: self.dictionary.clone(),
                }
                .into()
            }),
        }
    }

    pub fn build_detector(&self, dict: Dictionary) -> Result<MarkerDetector, ConfigError> {
        Ok(MarkerDetector::new(dict, self.detector.clone())?)
    }

    /// Open the configured source. Failures here are configuration errors.
    pub fn open_source(&self, dict: &Dictionary) -> Result<Box<dyn FrameSource>, ConfigError> {
        let source: Box<dyn FrameSource> = match SourceSpec::parse(&self.source) {
            SourceSpec::Device(index) => open_device(index)?,
            SourceSpec::Synthetic => Box::new(SyntheticSource::new(
                dict.clone(),
                SyntheticOptions {
                    frames: self.synthetic.frames.or(self.max_cycles),
                    ..self.synthetic.clone()
                },
            )?),
            SourceSpec::Path(path) => Box::new(ImageSequenceSource::open(
                path,
                SequenceOptions {
                    loop_playback: self.loop_playback,
                    frame_interval: self.fps.map(|fps| Duration::from_secs_f64(1.0 / fps)),
                },
            )?),
        };
        Ok(source)
    }

    pub fn build_display(&self) -> Box<dyn Display> {
        match (self.display.backend, &self.display.output_dir) {
            (DisplayBackend::FrameDump, Some(dir)) => {
                Box::new(FrameDumpDisplay::new(dir).every_nth(self.display.every_nth))
            }
            _ => Box::new(HeadlessDisplay::new()),
        }
    }

    /// Validate and wire up every component. Nothing is opened on the display
    /// until the loop runs.
    pub fn build_loop<T: StopSignal>(
        &self,
        stop: T,
    ) -> Result<LoopController<Box<dyn FrameSource>, Box<dyn Display>, T>, ConfigError> {
        self.validate()?;
        let dict = self.resolve_dictionary()?;
        let detector = self.build_detector(dict.clone())?;
        let source = self.open_source(&dict)?;
        Ok(LoopController::new(
            source,
            self.build_display(),
            stop,
            detector,
            Annotator::new(self.annotation.clone()),
            self.loop_settings(),
        ))
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            window_name: self.display.window_name.clone(),
            refresh_interval: self.refresh_interval,
            max_cycles: self.max_cycles,
        }
    }
}

/// `Duration` as integer milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// `Option<Duration>` as optional integer milliseconds.
pub(crate) mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_default() {
        let cfg: LiveConfig = serde_json::from_str("{}").expect("json");
        assert_eq!(cfg, LiveConfig::default());
        cfg.validate().expect("valid");
    }

    #[test]
    fn json_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("live.json");
        let cfg = LiveConfig {
            source: "frames".into(),
            max_cycles: Some(5),
            refresh_interval: Duration::from_millis(30),
            ..Default::default()
        };
        cfg.write_json(&path).expect("write");
        assert_eq!(LiveConfig::load_json(&path).expect("load"), cfg);
    }

    #[test]
    fn unknown_dictionary_is_a_config_error() {
        let cfg = LiveConfig {
            dictionary: "DICT_ARUCO_ORIGINAL".into(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.resolve_dictionary(),
            Err(ConfigError::Dictionary(DictionaryError::UnknownBuiltin { .. }))
        ));
    }

    #[test]
    fn frame_dump_requires_output_dir() {
        let cfg = LiveConfig {
            display: DisplayConfig {
                backend: DisplayBackend::FrameDump,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn device_sources_fail_before_the_loop() {
        let cfg = LiveConfig {
            source: "0".into(),
            ..Default::default()
        };
        let dict = cfg.resolve_dictionary().expect("dict");
        assert!(matches!(
            cfg.open_source(&dict),
            Err(ConfigError::Source(SourceError::Open { .. }))
        ));
    }
}
