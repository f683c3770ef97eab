//! Runtime configuration.
//!
//! Values come from an optional JSON file; command-line flags and
//! `PIXELCRYPT_*` environment variables are layered on top by the binary.

use crate::error::{PixelCryptError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database holding the quarantine registry
    pub registry_path: PathBuf,

    /// `ffmpeg` executable used for video carriers
    pub ffmpeg: PathBuf,

    /// `ffprobe` executable used for video carriers
    pub ffprobe: PathBuf,

    /// Parent for per-operation scratch directories; system temp dir if unset
    pub work_dir: Option<PathBuf>,

    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("security_registry.db"),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            work_dir: None,
            log_level: "info".into(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry_path.as_os_str().is_empty() {
            return Err(PixelCryptError::InvalidConfig(
                "registry_path must not be empty".into(),
            ));
        }
        if self.ffmpeg.as_os_str().is_empty() || self.ffprobe.as_os_str().is_empty() {
            return Err(PixelCryptError::InvalidConfig(
                "ffmpeg and ffprobe paths must not be empty".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(PixelCryptError::InvalidConfig(format!(
                "unknown log level {:?}, expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}
