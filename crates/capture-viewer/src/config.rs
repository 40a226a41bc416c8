use core::time::Duration;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::Local;
use frame_capture::{CaptureSettings, CaptureTarget, DEFAULT_SUBMISSION_TIMEOUT, FarPlane};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directories::{config_dir, default_capture_dir};

const FILE_NAME: &str = "capture-viewer.toml";

/// The depth convention the renderer clears to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthConvention {
    #[default]
    Standard,
    Reversed,
}

impl From<DepthConvention> for FarPlane {
    fn from(value: DepthConvention) -> Self {
        match value {
            DepthConvention::Standard => Self::Standard,
            DepthConvention::Reversed => Self::Reversed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Key that captures the presented colour image.
    pub color_key: String,

    /// Key that captures the depth buffer.
    pub depth_key: String,

    /// Where captures are written.
    pub output_directory: PathBuf,

    pub submission_timeout_ms: u64,

    pub far_plane: DepthConvention,

    /// Poll the frame event from the host before each capture, needs the `event-polling` feature.
    pub poll_frame_event: bool,

    /// Exit after this many frames.
    pub frames: Option<u64>,
}

impl Config {
    /// Loads the config, `None` if there is no config file yet.
    pub fn try_load_config() -> Result<Option<Self>, ConfigError> {
        Self::try_load_from(&Self::file_path())
    }

    pub fn try_load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(ConfigError::Io(error)),
        };

        let config: Self = toml::from_str(&contents)?;

        Ok(Some(config))
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string.as_bytes())?;

        Ok(())
    }

    pub fn file_path() -> PathBuf {
        config_dir().join(FILE_NAME)
    }

    /// The capture settings described by this config.
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            submission_timeout: Duration::from_millis(self.submission_timeout_ms),
            far_plane: self.far_plane.into(),
            poll_frame_event: self.poll_frame_event,
        }
    }

    /// The target bound to `key`, if any. Keys are compared case insensitively.
    pub fn target_for_key(&self, key: &str) -> Option<CaptureTarget> {
        if key.eq_ignore_ascii_case(&self.color_key) {
            Some(CaptureTarget::Color)
        } else if key.eq_ignore_ascii_case(&self.depth_key) {
            Some(CaptureTarget::Depth)
        } else {
            None
        }
    }

    /// A timestamped destination for a new capture of `target`.
    pub fn capture_path(&self, target: CaptureTarget) -> PathBuf {
        let prefix = match target {
            CaptureTarget::Color => "Capture",
            CaptureTarget::Depth => "Depth",
        };

        let name = format!("{prefix} {}.png", Local::now().format("%F %H-%M-%S%.3f"));
        self.output_directory.join(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_key: String::from("s"),
            depth_key: String::from("d"),
            output_directory: default_capture_dir(),
            submission_timeout_ms: DEFAULT_SUBMISSION_TIMEOUT.as_millis() as u64,
            far_plane: DepthConvention::Standard,
            poll_frame_event: false,
            frames: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not access the config file:\n{0}")]
    Io(#[from] io::Error),

    #[error("The config file is invalid:\n{0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("The config could not be serialized:\n{0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::{fs, path::PathBuf};

    use frame_capture::{CaptureTarget, FarPlane};

    use super::{Config, DepthConvention};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("capture-viewer-{}-{name}", std::process::id()))
    }

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.target_for_key("s"), Some(CaptureTarget::Color));
        assert_eq!(config.target_for_key("D"), Some(CaptureTarget::Depth));
        assert_eq!(config.target_for_key("x"), None);

        let settings = config.capture_settings();
        assert_eq!(settings.submission_timeout, Duration::from_secs(100));
        assert_eq!(settings.far_plane, FarPlane::Standard);
        assert!(!settings.poll_frame_event);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            depth_key = "z"
            far_plane = "reversed"
            frames = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.color_key, "s");
        assert_eq!(config.depth_key, "z");
        assert_eq!(config.far_plane, DepthConvention::Reversed);
        assert_eq!(config.frames, Some(120));
        assert_eq!(config.capture_settings().far_plane, FarPlane::Reversed);
    }

    #[test]
    fn save_and_load() {
        let path = temp_path("config.toml");

        let config = Config {
            output_directory: PathBuf::from("/tmp/captures"),
            submission_timeout_ms: 2500,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::try_load_from(&path).unwrap().unwrap();
        assert_eq!(loaded, config);

        fs::remove_file(&path).unwrap();
        assert!(Config::try_load_from(&path).unwrap().is_none());
    }

    #[test]
    fn invalid_file_is_an_error() {
        assert!(toml::from_str::<Config>("far_plane = \"sideways\"").is_err());
    }

    #[test]
    fn capture_paths_are_named_by_target() {
        let config = Config {
            output_directory: PathBuf::from("captures"),
            ..Default::default()
        };

        let colour = config.capture_path(CaptureTarget::Color);
        let depth = config.capture_path(CaptureTarget::Depth);

        assert!(colour.starts_with("captures"));
        let colour_name = colour.file_name().unwrap().to_string_lossy();
        let depth_name = depth.file_name().unwrap().to_string_lossy();
        assert!(colour_name.starts_with("Capture "));
        assert!(depth_name.starts_with("Depth "));
        assert!(depth_name.ends_with(".png"));
    }
}
