//! Configuration file handling for prompt-motion.
//!
//! Loads configuration from `~/.config/prompt-motion/config.toml` or a custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::replicate::VideoTunables;

/// Configuration file structure for prompt-motion.
/// Loaded from ~/.config/prompt-motion/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Deserialize)]
pub struct GenerationConfig {
    /// Default first-frame width in pixels.
    #[serde(default = "default_dimension")]
    pub width: u32,
    /// Default first-frame height in pixels.
    #[serde(default = "default_dimension")]
    pub height: u32,
    /// Override for the image model identifier.
    #[serde(default)]
    pub image_model: Option<String>,
    /// Override for the video model identifier.
    #[serde(default)]
    pub video_model: Option<String>,
    /// Overall per-stage generation timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            width: default_dimension(),
            height: default_dimension(),
            image_model: None,
            video_model: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoConfig {
    /// Let the provider rewrite the prompt for the video model.
    #[serde(default = "default_true")]
    pub prompt_optimizer: bool,
    /// Opaque frame count passed to the video model when set.
    #[serde(default)]
    pub num_frames: Option<u32>,
    /// Opaque frame rate passed to the video model when set.
    #[serde(default)]
    pub fps: Option<u32>,
    /// Opaque interpolation flag passed to the video model when set.
    #[serde(default)]
    pub interpolation: Option<bool>,
    /// Probe returned video URLs with a HEAD request before accepting them.
    #[serde(default = "default_true")]
    pub verify_links: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            prompt_optimizer: default_true(),
            num_frames: None,
            fps: None,
            interpolation: None,
            verify_links: default_true(),
        }
    }
}

impl VideoConfig {
    /// Collect the pass-through parameters for the video model.
    pub fn tunables(&self) -> VideoTunables {
        VideoTunables {
            prompt_optimizer: Some(self.prompt_optimizer),
            num_frames: self.num_frames,
            fps: self.fps,
            interpolation: self.interpolation,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_dimension() -> u32 {
    768
}

fn default_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Default config file location: ~/.config/prompt-motion/config.toml
fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("prompt-motion")
        .join("config.toml")
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
